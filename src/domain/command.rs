// Discrete control actions bound to a target actuator.

use super::actuator::{ActuatorId, ActuatorSet, Direction};
use std::fmt;

/// One discrete control action, bound to the actuator it drives.
///
/// The variant set is closed; adding an action means adding a variant here and
/// handling it in [`Command::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TurnLeft { target: ActuatorId },
    TurnRight { target: ActuatorId },
    ToggleBoost { target: ActuatorId },
}

impl Command {
    /// Actuator this command is bound to.
    pub fn target(&self) -> ActuatorId {
        match *self {
            Command::TurnLeft { target }
            | Command::TurnRight { target }
            | Command::ToggleBoost { target } => target,
        }
    }

    /// Stable action name used in logs and on the wire.
    pub fn action_name(&self) -> &'static str {
        match self {
            Command::TurnLeft { .. } => "turn_left",
            Command::TurnRight { .. } => "turn_right",
            Command::ToggleBoost { .. } => "toggle_boost",
        }
    }

    /// Applies the command to its bound actuator.
    ///
    /// # Panics
    ///
    /// Panics if the bound actuator is not present in `actuators`.
    pub fn apply<A>(&self, actuators: &mut A)
    where
        A: ActuatorSet + ?Sized,
    {
        let target = self.target();
        let Some(actuator) = actuators.actuator_mut(target) else {
            panic!("{self} is bound to actuator {target}, which is not registered");
        };

        match self {
            Command::TurnLeft { .. } => actuator.turn(Direction::Left),
            Command::TurnRight { .. } => actuator.turn(Direction::Right),
            Command::ToggleBoost { .. } => actuator.toggle_boost(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(#{})", self.action_name(), self.target())
    }
}
