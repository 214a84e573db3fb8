// Domain-level errors for session and race control.

use super::actuator::ActuatorId;
use thiserror::Error;

/// Reasons a session transition was refused. None of these are fatal: the
/// recorder stays in the state it was in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no commands recorded; nothing to replay")]
    EmptyTimeline,
    #[error("cannot replay while recording")]
    RecordingActive,
    #[error("a replay is already running")]
    ReplayActive,
}

/// Reasons a race lifecycle transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RaceError {
    #[error("the countdown is already running")]
    CountdownActive,
    #[error("the race is already running; stop it first")]
    RaceActive,
    #[error("the race is not running")]
    NotRunning,
}

/// Any refused control-panel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Race(#[from] RaceError),
    #[error("no bike with id {0}")]
    UnknownBike(ActuatorId),
}
