// Fake actuators shared by domain and use-case tests.

use crate::domain::actuator::{Actuator, ActuatorId, ActuatorSet, Direction};

// Call log entry captured by the fake actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Turn(ActuatorId, Direction),
    ToggleBoost(ActuatorId),
}

pub(crate) struct RecordingActuator {
    id: ActuatorId,
    calls: Vec<Call>,
}

impl Actuator for RecordingActuator {
    fn turn(&mut self, direction: Direction) {
        self.calls.push(Call::Turn(self.id, direction));
    }

    fn toggle_boost(&mut self) {
        self.calls.push(Call::ToggleBoost(self.id));
    }
}

// Actuator set that only knows a single id and records every call made to it.
pub(crate) struct RecordingActuators {
    inner: RecordingActuator,
}

impl RecordingActuators {
    pub(crate) fn new(id: ActuatorId) -> Self {
        Self {
            inner: RecordingActuator {
                id,
                calls: Vec::new(),
            },
        }
    }

    pub(crate) fn calls(&self) -> &[Call] {
        &self.inner.calls
    }

    pub(crate) fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.inner.calls)
    }
}

impl ActuatorSet for RecordingActuators {
    fn actuator_mut(&mut self, id: ActuatorId) -> Option<&mut dyn Actuator> {
        if id == self.inner.id {
            Some(&mut self.inner)
        } else {
            None
        }
    }
}
