//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::ArenaHandle;
use crate::ws::protocol::{ClientMsg, JoinRequest, RoomDescriptor, ServerMsg};

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// Direct (non-broadcast) messages queued for one client
const DIRECT_CAPACITY: usize = 16;

/// Join payload problems that end the connection
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum JoinRejection {
    #[error("nickname is empty")]
    EmptyNickname,

    #[error("room is missing")]
    MissingRoom,

    #[error("room id is empty")]
    EmptyRoomId,

    #[error("malformed join payload: {0}")]
    Malformed(String),
}

/// Validate a join payload into a nickname and target room.
/// Clipping the nickname is left to the room.
pub fn accept_join(req: JoinRequest) -> Result<(String, RoomDescriptor), JoinRejection> {
    if req.nickname.is_empty() {
        return Err(JoinRejection::EmptyNickname);
    }
    let room = req.room.ok_or(JoinRejection::MissingRoom)?;
    if room.id.is_empty() {
        return Err(JoinRejection::EmptyRoomId);
    }
    Ok((req.nickname, room))
}

/// What an unjoined session does with one text frame
#[derive(Debug, PartialEq)]
pub enum PreJoin {
    Join(String, RoomDescriptor),
    /// Bad join payload, the connection ends
    Reject(JoinRejection),
    Pong,
    /// Anything else, including frames that do not parse
    Ignore,
}

/// Classify a text frame received before a successful join.
/// Only a `join` event can end the connection.
pub fn pre_join(text: &str) -> PreJoin {
    match ClientMsg::parse(text) {
        Ok(ClientMsg::Join(req)) => match accept_join(req) {
            Ok((nickname, room)) => PreJoin::Join(nickname, room),
            Err(rejection) => PreJoin::Reject(rejection),
        },
        Ok(ClientMsg::Ping {}) => PreJoin::Pong,
        Ok(_) => PreJoin::Ignore,
        Err(e) if ClientMsg::event_name(text).as_deref() == Some("join") => {
            PreJoin::Reject(JoinRejection::Malformed(e.to_string()))
        }
        Err(_) => PreJoin::Ignore,
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.arena))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, arena: ArenaHandle) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();

    let Some((nickname, room)) = await_join(conn_id, &mut ws_sink, &mut ws_stream).await else {
        info!(conn_id = %conn_id, "WebSocket closed before joining");
        return;
    };
    let room_id = room.id.clone();

    let ticket = match arena.join(conn_id, nickname, room).await {
        Ok(ticket) => ticket,
        Err(e) => {
            error!(conn_id = %conn_id, error = %e, "Join failed");
            return;
        }
    };

    if let Err(e) = send_msg(&mut ws_sink, &ticket.snapshot).await {
        debug!(conn_id = %conn_id, error = %e, "Failed to send join snapshot");
        let _ = arena.leave(conn_id, room_id).await;
        return;
    }

    run_session(conn_id, room_id.clone(), &arena, ws_sink, ws_stream, ticket.events).await;

    // Release the slot and tell the room
    if let Err(e) = arena.leave(conn_id, room_id).await {
        error!(conn_id = %conn_id, error = %e, "Failed to release occupant");
    }

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Read frames until a valid join arrives.
///
/// Returns `None` when the connection should end: the client went away
/// or sent an unusable join.
async fn await_join(
    conn_id: Uuid,
    ws_sink: &mut WsSink,
    ws_stream: &mut WsStream,
) -> Option<(String, RoomDescriptor)> {
    while let Some(result) = ws_stream.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "WebSocket error before join");
                return None;
            }
        };

        match pre_join(&text) {
            PreJoin::Join(nickname, room) => return Some((nickname, room)),
            PreJoin::Reject(rejection) => {
                warn!(conn_id = %conn_id, reason = %rejection, "Rejected join");
                let _ = ws_sink.close().await;
                return None;
            }
            PreJoin::Pong => {
                if send_msg(ws_sink, &ServerMsg::Pong {}).await.is_err() {
                    return None;
                }
            }
            PreJoin::Ignore => {
                debug!(conn_id = %conn_id, "Ignoring message before join");
            }
        }
    }
    None
}

/// Run the joined session with split read/write
async fn run_session(
    conn_id: Uuid,
    room_id: String,
    arena: &ArenaHandle,
    mut ws_sink: WsSink,
    mut ws_stream: WsStream,
    mut room_rx: broadcast::Receiver<ServerMsg>,
) {
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerMsg>(DIRECT_CAPACITY);

    // Spawn writer task: room broadcasts and direct replies -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                direct = direct_rx.recv() => match direct {
                    Some(msg) => msg,
                    None => break,
                },
                event = room_rx.recv() => match event {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(conn_id = %conn_id, lagged_count = n, "Client lagged, skipping {} messages", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(conn_id = %conn_id, "Room channel closed");
                        break;
                    }
                },
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> arena
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let msg = match ClientMsg::parse(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                let forwarded = match msg {
                    ClientMsg::Move { angle } => arena.steer(conn_id, room_id.clone(), angle).await,
                    ClientMsg::Kick {} => arena.kick(conn_id, room_id.clone()).await,
                    ClientMsg::Chat(content) => arena.chat(conn_id, room_id.clone(), content).await,
                    ClientMsg::Ping {} => {
                        let _ = direct_tx.send(ServerMsg::Pong {}).await;
                        Ok(())
                    }
                    ClientMsg::Join(_) => {
                        debug!(conn_id = %conn_id, "Ignoring repeated join");
                        Ok(())
                    }
                };

                if forwarded.is_err() {
                    error!(conn_id = %conn_id, "Arena unavailable, dropping session");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                debug!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }

        if writer_handle.is_finished() {
            break;
        }
    }

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut WsSink, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
