use crate::use_cases::{SandboxEvent, SandboxUpdate};
use axum::extract::ws::Utf8Bytes;
use tokio::sync::{broadcast, mpsc, watch};

#[derive(Clone)]
pub struct AppState {
    // Inputs and session controls flowing into the sandbox loop.
    pub event_tx: mpsc::Sender<SandboxEvent>,
    // Updates produced by the sandbox loop (domain structs).
    pub update_tx: broadcast::Sender<SandboxUpdate>,
    // Serialized updates, shared across all connections.
    pub update_bytes_tx: broadcast::Sender<Utf8Bytes>,
    // Latest serialized update for lag recovery.
    pub update_latest_tx: watch::Sender<Utf8Bytes>,
}
