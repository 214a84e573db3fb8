// Wire protocol DTOs and conversions for the sandbox's public messages.

use crate::domain::BikeSnapshot;
use crate::domain::ActuatorId;
use crate::use_cases::{
    EventKind, InputTrigger, RaceEvent, SandboxPhase, SandboxUpdate, SessionSnapshot, SessionState,
};
use serde::{Deserialize, Serialize};

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Session state at connect time.
    Session(SessionDto),
    // Snapshot of the sandbox for a given tick.
    Update(SandboxUpdateDto),
    // Race and session notices from the event bus.
    Notice(NoticeDto),
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    // A device-independent control trigger.
    Input(InputDto),
    // A raw key release, mapped through the sandbox key bindings.
    Key(KeyDto),
    // Stop receiving one kind of notice on this connection.
    Unsubscribe(UnsubscribeDto),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionDto {
    TurnLeft,
    TurnRight,
    ToggleBoost,
}

impl From<ActionDto> for InputTrigger {
    fn from(action: ActionDto) -> Self {
        match action {
            ActionDto::TurnLeft => InputTrigger::TurnLeft,
            ActionDto::TurnRight => InputTrigger::TurnRight,
            ActionDto::ToggleBoost => InputTrigger::ToggleBoost,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputDto {
    pub action: ActionDto,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyDto {
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnsubscribeDto {
    pub event: NoticeKindDto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKindDto {
    Countdown,
    Start,
    Stop,
    RecordingStarted,
    RecordingStopped,
    ReplayStarted,
    ReplayFinished,
    ReplayStopped,
}

impl From<NoticeKindDto> for EventKind {
    fn from(kind: NoticeKindDto) -> Self {
        match kind {
            NoticeKindDto::Countdown => EventKind::Countdown,
            NoticeKindDto::Start => EventKind::Start,
            NoticeKindDto::Stop => EventKind::Stop,
            NoticeKindDto::RecordingStarted => EventKind::RecordingStarted,
            NoticeKindDto::RecordingStopped => EventKind::RecordingStopped,
            NoticeKindDto::ReplayStarted => EventKind::ReplayStarted,
            NoticeKindDto::ReplayFinished => EventKind::ReplayFinished,
            NoticeKindDto::ReplayStopped => EventKind::ReplayStopped,
        }
    }
}

/// Body of `PUT /session/bike`.
#[derive(Debug, Clone, Deserialize)]
pub struct BindBikeRequest {
    pub bike_id: ActuatorId,
}

/// Body of `POST /inputs`: either an action or a key.
#[derive(Debug, Clone, Deserialize)]
pub struct InputRequest {
    #[serde(default)]
    pub action: Option<ActionDto>,
    #[serde(default)]
    pub key: Option<String>,
}

/// Parses a key name into the single character the bindings use.
pub fn parse_key(key: &str) -> Option<char> {
    let mut chars = key.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphanumeric() => Some(c),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStateDto {
    Idle,
    Recording,
    Replaying,
}

impl From<SessionState> for SessionStateDto {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Idle => SessionStateDto::Idle,
            SessionState::Recording => SessionStateDto::Recording,
            SessionState::Replaying => SessionStateDto::Replaying,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseDto {
    Countdown { seconds_left: u32 },
    Running,
    Stopped,
}

impl From<SandboxPhase> for PhaseDto {
    fn from(phase: SandboxPhase) -> Self {
        match phase {
            SandboxPhase::Countdown { seconds_left } => PhaseDto::Countdown { seconds_left },
            SandboxPhase::Running => PhaseDto::Running,
            SandboxPhase::Stopped => PhaseDto::Stopped,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDto {
    pub state: SessionStateDto,
    pub timeline_len: usize,
    pub phase: PhaseDto,
    pub bike_id: String,
}

impl From<SessionSnapshot> for SessionDto {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            state: snapshot.state.into(),
            timeline_len: snapshot.timeline_len,
            phase: snapshot.phase.into(),
            bike_id: snapshot.bike_id.to_string(),
        }
    }
}

/// Flattened bike state for wire transmission.
#[derive(Debug, Clone, Serialize)]
pub struct BikeStateDto {
    pub id: String,
    pub lane_offset: f32,
    pub boost: bool,
}

impl From<&BikeSnapshot> for BikeStateDto {
    fn from(bike: &BikeSnapshot) -> Self {
        Self {
            id: bike.id.to_string(),
            lane_offset: bike.lane_offset,
            boost: bike.boost,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SandboxUpdateDto {
    pub tick: u64,
    pub session: SessionDto,
    pub bikes: Vec<BikeStateDto>,
}

impl From<SandboxUpdate> for SandboxUpdateDto {
    fn from(update: SandboxUpdate) -> Self {
        Self {
            tick: update.tick,
            session: update.session.into(),
            bikes: update.bikes.iter().map(BikeStateDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NoticeDto {
    Countdown { seconds: u32 },
    Start,
    Stop,
    RecordingStarted,
    RecordingStopped { commands: usize },
    ReplayStarted { commands: usize },
    ReplayFinished,
    ReplayStopped { remaining: usize },
}

impl From<RaceEvent> for NoticeDto {
    fn from(event: RaceEvent) -> Self {
        match event {
            RaceEvent::Countdown { seconds } => NoticeDto::Countdown { seconds },
            RaceEvent::Start => NoticeDto::Start,
            RaceEvent::Stop => NoticeDto::Stop,
            RaceEvent::RecordingStarted => NoticeDto::RecordingStarted,
            RaceEvent::RecordingStopped { commands } => NoticeDto::RecordingStopped { commands },
            RaceEvent::ReplayStarted { commands } => NoticeDto::ReplayStarted { commands },
            RaceEvent::ReplayFinished => NoticeDto::ReplayFinished,
            RaceEvent::ReplayStopped { remaining } => NoticeDto::ReplayStopped { remaining },
        }
    }
}
