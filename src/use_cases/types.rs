// Use-case level inputs/outputs for the sandbox loop.

use super::events::{EventKind, ListenerId, RaceEvent};
use super::input::InputTrigger;
use super::recorder::SessionState;
use crate::domain::{ActuatorId, BikeSnapshot, ControlError};
use tokio::sync::{mpsc, oneshot};

/// Controls exposed to the outside (the buttons of the control panel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControl {
    StartRecording,
    StopRecording,
    StartReplay,
    StopReplay,
    /// Start the countdown again after the race was stopped.
    StartCountdown,
    StopRace,
    /// Point live input at another bike in the garage.
    BindBike(ActuatorId),
}

pub type ControlReply = oneshot::Sender<Result<SessionSnapshot, ControlError>>;
pub type Subscription = (ListenerId, mpsc::UnboundedReceiver<RaceEvent>);

#[derive(Debug)]
pub enum SandboxEvent {
    /// A trigger from any input device.
    Trigger(InputTrigger),
    /// A key release; unbound keys are ignored.
    Key(char),
    Control {
        control: SessionControl,
        reply: ControlReply,
    },
    Status {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Subscribe {
        kinds: Vec<EventKind>,
        reply: oneshot::Sender<Subscription>,
    },
    Unsubscribe {
        listener_id: ListenerId,
    },
    /// Stop delivering one kind of notice to a listener.
    UnsubscribeKind {
        listener_id: ListenerId,
        kind: EventKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxPhase {
    /// Bikes are held at the line; live inputs are ignored.
    Countdown { seconds_left: u32 },
    Running,
    /// Race stopped; live inputs are held until the countdown is restarted.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub timeline_len: usize,
    pub phase: SandboxPhase,
    /// Bike live input is bound to.
    pub bike_id: ActuatorId,
}

#[derive(Debug, Clone)]
pub struct SandboxUpdate {
    pub tick: u64,
    pub session: SessionSnapshot,
    pub bikes: Vec<BikeSnapshot>,
}
