// Framework bootstrap for the sandbox server runtime.

use crate::domain::tuning::bike::BikeTuning;
use crate::frameworks::config;
use crate::interface_adapters::net::{
    bind_bike_handler, input_handler, session_status_handler, spawn_update_serializer,
    start_countdown_handler, start_recording_handler, start_replay_handler, stop_race_handler,
    stop_recording_handler, stop_replay_handler, ws_handler,
};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{SandboxEvent, SandboxSettings, SandboxUpdate, sandbox_task};

use axum::{
    Router,
    extract::ws::Utf8Bytes,
    routing::{get, post, put},
};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tokio::sync::{broadcast, mpsc, watch};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Sandbox settings built from the environment and runtime constants.
pub fn settings_from_config() -> SandboxSettings {
    SandboxSettings {
        bike_count: config::bike_count(),
        tuning: BikeTuning::default(),
        countdown: config::countdown(),
        tick_interval: config::TICK_INTERVAL,
    }
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    run_with_settings(listener, settings_from_config()).await
}

pub async fn run_with_settings(
    listener: tokio::net::TcpListener,
    settings: SandboxSettings,
) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state(settings);

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/session", get(session_status_handler))
        .route(
            "/session/recording",
            post(start_recording_handler).delete(stop_recording_handler),
        )
        .route(
            "/session/replay",
            post(start_replay_handler).delete(stop_replay_handler),
        )
        .route("/session/bike", put(bind_bike_handler))
        .route("/race", post(start_countdown_handler).delete(stop_race_handler))
        .route("/inputs", post(input_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state(settings: SandboxSettings) -> Arc<AppState> {
    tracing::debug!(
        bike_count = settings.bike_count,
        countdown_secs = settings.countdown.as_secs(),
        tick_ms = settings.tick_interval.as_millis(),
        "sandbox configured"
    );

    // Channel wiring for the sandbox loop.
    let (event_tx, event_rx) = mpsc::channel::<SandboxEvent>(config::EVENT_CHANNEL_CAPACITY);
    let (update_tx, _update_rx) =
        broadcast::channel::<SandboxUpdate>(config::UPDATE_BROADCAST_CAPACITY);
    let (update_bytes_tx, _update_bytes_rx) =
        broadcast::channel::<Utf8Bytes>(config::UPDATE_BROADCAST_CAPACITY);
    let (update_latest_tx, _update_latest_rx) = watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));

    let state = Arc::new(AppState {
        event_tx,
        update_tx,
        update_bytes_tx,
        update_latest_tx,
    });

    // The serializer subscribes before the loop starts so the first update is kept.
    spawn_update_serializer(&state);
    tokio::spawn(sandbox_task(event_rx, state.update_tx.clone(), settings));

    state
}
