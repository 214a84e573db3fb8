// Use cases layer: recording, replay and the sandbox loop that hosts them.

pub mod countdown;
pub mod events;
pub mod input;
pub mod recorder;
pub mod sandbox;
pub mod types;

pub use events::{EventKind, ListenerId, RaceEvent, RaceEventBus};
pub use input::{InputCapture, InputTrigger};
pub use recorder::{Recorder, SessionState, TickReport};
pub use sandbox::{Sandbox, SandboxSettings, sandbox_task};
pub use types::{
    ControlReply, SandboxEvent, SandboxPhase, SandboxUpdate, SessionControl, SessionSnapshot,
    Subscription,
};
