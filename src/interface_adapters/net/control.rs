// HTTP routes for the session control panel and scripted input capture.

use crate::interface_adapters::http::error_response;
use crate::interface_adapters::protocol::{BindBikeRequest, InputRequest, SessionDto, parse_key};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{SandboxEvent, SessionControl};

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tokio::sync::{mpsc::error::TrySendError, oneshot};
use tracing::{info, warn};

const SANDBOX_UNAVAILABLE: &str = "sandbox unavailable";

pub async fn session_status_handler(State(state): State<Arc<AppState>>) -> Response {
    let (reply, reply_rx) = oneshot::channel();
    if state
        .event_tx
        .send(SandboxEvent::Status { reply })
        .await
        .is_err()
    {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, SANDBOX_UNAVAILABLE);
    }

    match reply_rx.await {
        Ok(snapshot) => Json(SessionDto::from(snapshot)).into_response(),
        Err(_) => error_response(StatusCode::SERVICE_UNAVAILABLE, SANDBOX_UNAVAILABLE),
    }
}

pub async fn start_recording_handler(State(state): State<Arc<AppState>>) -> Response {
    send_control(&state, SessionControl::StartRecording).await
}

pub async fn stop_recording_handler(State(state): State<Arc<AppState>>) -> Response {
    send_control(&state, SessionControl::StopRecording).await
}

pub async fn start_replay_handler(State(state): State<Arc<AppState>>) -> Response {
    send_control(&state, SessionControl::StartReplay).await
}

pub async fn stop_replay_handler(State(state): State<Arc<AppState>>) -> Response {
    send_control(&state, SessionControl::StopReplay).await
}

pub async fn start_countdown_handler(State(state): State<Arc<AppState>>) -> Response {
    send_control(&state, SessionControl::StartCountdown).await
}

pub async fn stop_race_handler(State(state): State<Arc<AppState>>) -> Response {
    send_control(&state, SessionControl::StopRace).await
}

pub async fn bind_bike_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BindBikeRequest>,
) -> Response {
    send_control(&state, SessionControl::BindBike(payload.bike_id)).await
}

async fn send_control(state: &AppState, control: SessionControl) -> Response {
    let (reply, reply_rx) = oneshot::channel();
    if state
        .event_tx
        .send(SandboxEvent::Control { control, reply })
        .await
        .is_err()
    {
        warn!(?control, "sandbox event channel closed");
        return error_response(StatusCode::SERVICE_UNAVAILABLE, SANDBOX_UNAVAILABLE);
    }

    match reply_rx.await {
        Ok(Ok(snapshot)) => {
            info!(?control, state = ?snapshot.state, "session control applied");
            Json(SessionDto::from(snapshot)).into_response()
        }
        Ok(Err(err)) => err.into_response(),
        Err(_) => error_response(StatusCode::SERVICE_UNAVAILABLE, SANDBOX_UNAVAILABLE),
    }
}

pub async fn input_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<InputRequest>,
) -> Response {
    // Exactly one of `action` or `key` must be present.
    let event = match (payload.action, payload.key.as_deref()) {
        (Some(action), None) => SandboxEvent::Trigger(action.into()),
        (None, Some(key)) => match parse_key(key) {
            Some(key) => SandboxEvent::Key(key),
            None => {
                return error_response(StatusCode::BAD_REQUEST, "key must be a single character");
            }
        },
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "provide exactly one of action or key",
            );
        }
    };

    match state.event_tx.try_send(event) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(TrySendError::Full(_)) => {
            warn!("sandbox event channel full; dropping input");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "input queue full")
        }
        Err(TrySendError::Closed(_)) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, SANDBOX_UNAVAILABLE)
        }
    }
}
