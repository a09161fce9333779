//! Realtime synchronizer: bridges WebSocket connections to the seat state
//! machine. Client intents are validated and applied through the single
//! store-backed mutation path; after a commit the whole room receives a fresh
//! authoritative snapshot, while failures go back privately to the requester.

pub mod protocol;
pub mod rooms;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::realtime::protocol::{ClientMessage, ServerMessage};
use crate::realtime::rooms::Session;
use crate::services::snapshot::SnapshotError;
use crate::services::state_machine::SeatError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(ws_handler))
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    /// Verified holder identity, attached by the upstream auth layer.
    holder: Uuid,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.holder))
}

/// Rebuilds the showtime's snapshot from committed state and broadcasts it to
/// the room. Returns how many connections received it. Called after every
/// successful mutation, including the reaper's.
pub async fn publish_snapshot(
    state: &AppState,
    showtime_id: Uuid,
) -> Result<usize, SnapshotError> {
    let snapshot = state.snapshots.rebuild(showtime_id).await?;
    Ok(state.rooms.broadcast(
        showtime_id,
        ServerMessage::SeatStatusUpdated {
            showtime_id,
            seats: snapshot.seats,
        },
    ))
}

struct Connection {
    conn_id: Uuid,
    holder_id: Uuid,
    room: Option<Uuid>,
    /// Task forwarding room broadcasts into this connection's write channel.
    forward: Option<JoinHandle<()>>,
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, holder_id: Uuid) {
    let conn_id = Uuid::new_v4();
    info!(%conn_id, %holder_id, "seat map client connected");

    let (ws_tx, mut ws_rx) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<ServerMessage>();
    let writer = tokio::spawn(write_loop(ws_tx, rx));

    let mut conn = Connection {
        conn_id,
        holder_id,
        room: None,
        forward: None,
    };

    while let Some(Ok(message)) = ws_rx.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(msg) => handle_message(&state, &mut conn, &tx, msg).await,
                Err(e) => {
                    let _ = tx.send(ServerMessage::Error {
                        code: "bad_request".to_string(),
                        seat_id: None,
                        message: format!("unrecognized message: {e}"),
                    });
                }
            },
            Message::Close(_) => break,
            // Ping/pong handled by the transport; binary frames ignored.
            _ => {}
        }
    }

    if let Some(forward) = conn.forward.take() {
        forward.abort();
    }
    // The disconnect may be ungraceful; any holds this session left behind
    // are released as a compensating action.
    if let Some(session) = state.rooms.leave(conn_id) {
        release_session_holds(&state, session).await;
    }
    writer.abort();
    info!(%conn_id, "seat map client disconnected");
}

async fn write_loop(
    mut ws_tx: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
) {
    while let Some(msg) = rx.recv().await {
        let Ok(json) = serde_json::to_string(&msg) else {
            continue;
        };
        if ws_tx.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
}

fn spawn_forwarder(
    mut room_rx: tokio::sync::broadcast::Receiver<ServerMessage>,
    tx: mpsc::UnboundedSender<ServerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match room_rx.recv().await {
                Ok(msg) => {
                    if tx.send(msg).is_err() {
                        break;
                    }
                }
                // A slow client skipped some snapshots; the next broadcast
                // carries the full list, so it self-heals.
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("seat map client lagged, skipped {skipped} broadcasts");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn handle_message(
    state: &Arc<AppState>,
    conn: &mut Connection,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::JoinRoom { showtime_id } => {
            // Snapshot first: joining a nonexistent showtime fails before the
            // registry is touched.
            match state.snapshots.snapshot(showtime_id).await {
                Ok(snapshot) => {
                    if let Some(forward) = conn.forward.take() {
                        forward.abort();
                    }
                    let room_rx = state.rooms.join(showtime_id, conn.conn_id, conn.holder_id);
                    conn.room = Some(showtime_id);
                    conn.forward = Some(spawn_forwarder(room_rx, tx.clone()));
                    let _ = tx.send(ServerMessage::RoomJoined { showtime_id });
                    let _ = tx.send(ServerMessage::SeatsInitialized {
                        showtime_id,
                        seats: snapshot.seats,
                    });
                }
                Err(SnapshotError::NotFound) => {
                    let _ = tx.send(ServerMessage::Error {
                        code: "not_found".to_string(),
                        seat_id: None,
                        message: "showtime not found".to_string(),
                    });
                }
                Err(e) => {
                    error!(%showtime_id, "failed to build join snapshot: {e}");
                    let _ = tx.send(ServerMessage::Error {
                        code: "internal".to_string(),
                        seat_id: None,
                        message: "failed to load seats".to_string(),
                    });
                }
            }
        }
        ClientMessage::HoldSeat { seat_id } => {
            let Some(showtime_id) = conn.room else {
                send_not_joined(tx);
                return;
            };
            match state.seats.hold(showtime_id, seat_id, conn.holder_id).await {
                Ok(_) => broadcast_after_mutation(state, showtime_id).await,
                Err(e) => send_seat_error(tx, Some(seat_id), &e),
            }
        }
        ClientMessage::ReleaseSeat { seat_id } => {
            let Some(showtime_id) = conn.room else {
                send_not_joined(tx);
                return;
            };
            match state
                .seats
                .release(showtime_id, seat_id, conn.holder_id)
                .await
            {
                Ok(_) => broadcast_after_mutation(state, showtime_id).await,
                Err(e) => send_seat_error(tx, Some(seat_id), &e),
            }
        }
        ClientMessage::ConfirmSeat { seat_id } => {
            let Some(showtime_id) = conn.room else {
                send_not_joined(tx);
                return;
            };
            match state
                .seats
                .confirm(showtime_id, seat_id, conn.holder_id)
                .await
            {
                Ok(_) => broadcast_after_mutation(state, showtime_id).await,
                Err(e) => send_seat_error(tx, Some(seat_id), &e),
            }
        }
        ClientMessage::ReleaseAllSeats => {
            let Some(showtime_id) = conn.room else {
                send_not_joined(tx);
                return;
            };
            match state
                .seats
                .release_all_for_holder(showtime_id, conn.holder_id)
                .await
            {
                Ok(released) if !released.is_empty() => {
                    broadcast_after_mutation(state, showtime_id).await
                }
                Ok(_) => {}
                Err(e) => send_seat_error(tx, None, &e),
            }
        }
        ClientMessage::GetSeats => {
            let Some(showtime_id) = conn.room else {
                send_not_joined(tx);
                return;
            };
            match state.snapshots.snapshot(showtime_id).await {
                Ok(snapshot) => {
                    let _ = tx.send(ServerMessage::SeatsInitialized {
                        showtime_id,
                        seats: snapshot.seats,
                    });
                }
                Err(e) => {
                    error!(%showtime_id, "failed to build snapshot: {e}");
                    let _ = tx.send(ServerMessage::Error {
                        code: "internal".to_string(),
                        seat_id: None,
                        message: "failed to load seats".to_string(),
                    });
                }
            }
        }
    }
}

async fn broadcast_after_mutation(state: &Arc<AppState>, showtime_id: Uuid) {
    if let Err(e) = publish_snapshot(state, showtime_id).await {
        warn!(%showtime_id, "failed to broadcast snapshot after mutation: {e}");
    }
}

fn send_seat_error(tx: &mpsc::UnboundedSender<ServerMessage>, seat_id: Option<Uuid>, e: &SeatError) {
    let _ = tx.send(ServerMessage::Error {
        code: e.code().to_string(),
        seat_id,
        message: e.to_string(),
    });
}

fn send_not_joined(tx: &mpsc::UnboundedSender<ServerMessage>) {
    let _ = tx.send(ServerMessage::Error {
        code: "not_joined".to_string(),
        seat_id: None,
        message: "join a showtime room first".to_string(),
    });
}

async fn release_session_holds(state: &AppState, session: Session) {
    match state
        .seats
        .release_all_for_holder(session.showtime_id, session.holder_id)
        .await
    {
        Ok(released) if !released.is_empty() => {
            info!(
                holder_id = %session.holder_id,
                showtime_id = %session.showtime_id,
                "released {} holds on disconnect",
                released.len()
            );
            if let Err(e) = publish_snapshot(state, session.showtime_id).await {
                warn!(showtime_id = %session.showtime_id, "failed to broadcast after disconnect cleanup: {e}");
            }
        }
        Ok(_) => {}
        Err(e) => {
            error!(holder_id = %session.holder_id, "disconnect cleanup failed: {e}");
        }
    }
}
