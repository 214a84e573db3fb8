use crate::interface_adapters::protocol::{
    ClientMessage, NoticeDto, SandboxUpdateDto, ServerMessage, SessionDto, parse_key,
};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{EventKind, ListenerId, RaceEvent, SandboxEvent, SandboxUpdate};

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    EventsClosed,
    UpdatesClosed,
    NoticesClosed,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;

enum LoopControl {
    Continue,
    Disconnect,
}

// Process-unique id used to correlate the logs of one connection.
fn next_conn_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

pub async fn update_serializer(
    mut update_rx: broadcast::Receiver<SandboxUpdate>,
    update_bytes_tx: broadcast::Sender<Utf8Bytes>,
    update_latest_tx: watch::Sender<Utf8Bytes>,
) {
    // Serialize each update once and broadcast the shared bytes.
    loop {
        match update_rx.recv().await {
            Ok(update) => {
                let msg = ServerMessage::Update(SandboxUpdateDto::from(update));
                let txt = match serde_json::to_string(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize sandbox update");
                        continue;
                    }
                };

                let bytes = Utf8Bytes::from(txt);
                // Store the latest bytes for lag recovery.
                update_latest_tx.send_replace(bytes.clone());
                let _ = update_bytes_tx.send(bytes);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(missed = n, "update serializer lagged; skipping to latest update");
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("sandbox updates channel closed; serializer exiting");
                break;
            }
        }
    }
}

pub fn spawn_update_serializer(state: &AppState) {
    tokio::spawn(update_serializer(
        state.update_tx.subscribe(),
        state.update_bytes_tx.clone(),
        state.update_latest_tx.clone(),
    ));
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let conn_id = next_conn_id();
        let span = info_span!("conn", conn_id, listener_id = tracing::field::Empty);
        handle_socket(socket, state).instrument(span)
    })
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut ctx = match bootstrap_connection(&mut socket, &state).await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::ERROR,
                    reason: "bootstrap failed".into(),
                })))
                .await;
            let _ = socket.close().await;
            return;
        }
    };

    Span::current().record("listener_id", ctx.listener_id);
    info!("client connected");

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

struct ConnCtx {
    pub listener_id: ListenerId,
    pub event_tx: mpsc::Sender<SandboxEvent>,
    pub update_bytes_rx: broadcast::Receiver<Utf8Bytes>,
    pub update_latest_rx: watch::Receiver<Utf8Bytes>,
    pub notice_rx: mpsc::UnboundedReceiver<RaceEvent>,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub invalid_json: u32,
    pub lag_recovery_count: u64,

    pub last_input_full_log: Instant,
    pub last_update_lag_log: Instant,
    pub last_invalid_input_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    state: &AppState,
) -> Result<ConnCtx, NetError> {
    // Subscribe to updates before any await so nothing is missed.
    let update_bytes_rx = state.update_bytes_tx.subscribe();
    let update_latest_rx = state.update_latest_tx.subscribe();

    // Register with the sandbox's event bus; the sandbox owns the registration.
    let (reply, reply_rx) = oneshot::channel();
    state
        .event_tx
        .send(SandboxEvent::Subscribe {
            kinds: EventKind::ALL.to_vec(),
            reply,
        })
        .await
        .map_err(|_| NetError::EventsClosed)?;
    let (listener_id, notice_rx) = reply_rx.await.map_err(|_| NetError::EventsClosed)?;

    // From here on a failure must hand the registration back.
    let unsubscribe = |event_tx: mpsc::Sender<SandboxEvent>| async move {
        let _ = event_tx.send(SandboxEvent::Unsubscribe { listener_id }).await;
    };

    let (status_reply, status_rx) = oneshot::channel();
    if state
        .event_tx
        .send(SandboxEvent::Status {
            reply: status_reply,
        })
        .await
        .is_err()
    {
        return Err(NetError::EventsClosed);
    }
    let snapshot = match status_rx.await {
        Ok(snapshot) => snapshot,
        Err(_) => {
            unsubscribe(state.event_tx.clone()).await;
            return Err(NetError::EventsClosed);
        }
    };

    if let Err(e) = send_message(socket, &ServerMessage::Session(SessionDto::from(snapshot))).await
    {
        unsubscribe(state.event_tx.clone()).await;
        return Err(e);
    }

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        listener_id,
        event_tx: state.event_tx.clone(),
        update_bytes_rx,
        update_latest_rx,
        notice_rx,

        msgs_in: 0,
        msgs_out: 1,
        invalid_json: 0,
        lag_recovery_count: 0,

        last_input_full_log: now,
        last_update_lag_log: now,
        last_invalid_input_log: now,

        close_frame: None,
    })
}

fn forward_event(
    event_tx: &mpsc::Sender<SandboxEvent>,
    event: SandboxEvent,
    last_input_full_log: &mut Instant,
) -> Result<LoopControl, NetError> {
    match event_tx.try_send(event) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(mpsc::error::TrySendError::Full(_evt)) => {
            if should_log(last_input_full_log) {
                warn!("sandbox event channel full; dropping input");
            }
            Ok(LoopControl::Continue)
        }
        Err(mpsc::error::TrySendError::Closed(_evt)) => Err(NetError::EventsClosed),
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;

    loop {
        let disconnect: bool = tokio::select! {
            // Incoming Message from Client
            incoming = socket.recv() => {
                match handle_incoming_ws(incoming, ctx) {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Outgoing Sandbox Update
            update = ctx.update_bytes_rx.recv() => {
                match update {
                    Ok(bytes) => matches!(
                        forward_bytes(bytes, socket, &mut ctx.msgs_out).await,
                        LoopControl::Disconnect
                    ),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(&mut ctx.last_update_lag_log) {
                            warn!(missed = n, "updates lagged; sending latest snapshot");
                        }
                        // Resync strategy: send the latest update only.
                        let latest = ctx.update_latest_rx.borrow().clone();
                        if latest.is_empty() {
                            false
                        } else {
                            ctx.lag_recovery_count += 1;
                            matches!(
                                forward_bytes(latest, socket, &mut ctx.msgs_out).await,
                                LoopControl::Disconnect
                            )
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::UpdatesClosed);
                        true
                    }
                }
            }

            // Outgoing Notice
            notice = ctx.notice_rx.recv() => {
                match notice {
                    Some(event) => {
                        let msg = ServerMessage::Notice(NoticeDto::from(event));
                        match send_message(socket, &msg).await {
                            Ok(_) => {
                                ctx.msgs_out += 1;
                                false
                            }
                            Err(err) => {
                                warn!(error = ?err, "failed to send notice");
                                true
                            }
                        }
                    }
                    None => {
                        fatal = Some(NetError::NoticesClosed);
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    // Hand the bus registration back; the sandbox may already be gone.
    let _ = ctx
        .event_tx
        .send(SandboxEvent::Unsubscribe {
            listener_id: ctx.listener_id,
        })
        .await;

    debug!(
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        invalid_json = ctx.invalid_json,
        lag_recovery_count = ctx.lag_recovery_count,
        "connection stats"
    );
    info!("client disconnected");

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(Message::Text(text))) => {
            ctx.msgs_in += 1;

            let event = match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Input(input)) => SandboxEvent::Trigger(input.action.into()),
                Ok(ClientMessage::Unsubscribe(unsubscribe)) => SandboxEvent::UnsubscribeKind {
                    listener_id: ctx.listener_id,
                    kind: unsubscribe.event.into(),
                },
                Ok(ClientMessage::Key(key)) => match parse_key(&key.key) {
                    Some(key) => SandboxEvent::Key(key),
                    None => {
                        if should_log(&mut ctx.last_invalid_input_log) {
                            warn!(key = %key.key, "invalid key; dropping");
                        }
                        return Ok(LoopControl::Continue);
                    }
                },
                Err(parse_err) => {
                    ctx.invalid_json += 1;
                    if should_log(&mut ctx.last_invalid_input_log) {
                        warn!(
                            bytes = text.len(),
                            error = %parse_err,
                            "failed to parse client message"
                        );
                    }

                    if ctx.invalid_json > MAX_INVALID_JSON {
                        ctx.close_frame = Some(CloseFrame {
                            code: close_code::POLICY,
                            reason: "too many invalid messages".into(),
                        });
                        return Ok(LoopControl::Disconnect);
                    }
                    return Ok(LoopControl::Continue);
                }
            };

            forward_event(&ctx.event_tx, event, &mut ctx.last_input_full_log)
        }
        Some(Ok(Message::Binary(_))) => {
            ctx.close_frame = Some(CloseFrame {
                code: close_code::UNSUPPORTED,
                reason: "binary messages not supported".into(),
            });
            Ok(LoopControl::Disconnect)
        }
        Some(Ok(Message::Ping(_) | Message::Pong(_))) => Ok(LoopControl::Continue),
        Some(Ok(Message::Close(_))) => Ok(LoopControl::Disconnect),
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!("websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward_bytes(bytes: Utf8Bytes, socket: &mut WebSocket, msgs_out: &mut u64) -> LoopControl {
    match socket
        .send(Message::Text(bytes))
        .await
        .map_err(NetError::Ws)
    {
        Ok(()) => {
            *msgs_out += 1;
            LoopControl::Continue
        }
        Err(err) => {
            // Disconnect follows immediately.
            warn!(error = ?err, "failed to send sandbox update");
            LoopControl::Disconnect
        }
    }
}
