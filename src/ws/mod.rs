pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::protocol::{ClientMessage, RoomView, ServerMessage};
use crate::state::{AppError, AppState};
use handlers::Connection;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room: String,
    pub token: String,
}

/// WebSocket upgrade handler. The session token and room are checked before upgrading.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(user) = state.authenticate(&params.token).await else {
        return AppError::Unauthorized.into_response();
    };

    let room = match state.join_room(&params.room, &user).await {
        Ok(room) => room,
        Err(e) => {
            tracing::info!("{} could not join room {}: {}", user.id, params.room, e);
            return e.into_response();
        }
    };

    tracing::info!("WebSocket connection request: room={}, user={}", room.id, user.id);
    let conn = Connection {
        room_id: room.id.clone(),
        user,
    };
    ws.on_upgrade(move |socket| handle_socket(socket, conn, room, state))
}

async fn send(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            true
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, conn: Connection, room: RoomView, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut broadcast_rx = state.broadcast.subscribe();

    let welcome = ServerMessage::Welcome {
        protocol: "1.0".to_string(),
        user_id: conn.user.id.clone(),
        room,
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if !send(&mut sender, &welcome).await {
        tracing::error!("Failed to send welcome message");
        leave(&state, &conn).await;
        return;
    }

    let mut left = false;
    loop {
        tokio::select! {
            broadcast_msg = broadcast_rx.recv() => {
                match broadcast_msg {
                    Ok(msg) if msg.room_id == conn.room_id => {
                        if !send(&mut sender, &msg.message).await {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("{} missed {} room updates", conn.user.id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handlers::handle_message(client_msg, &conn, &state).await
                                {
                                    left = matches!(response, ServerMessage::Left { .. });
                                    if !send(&mut sender, &response).await {
                                        tracing::error!("Failed to send response");
                                        break;
                                    }
                                    if left {
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::error(
                                    "PARSE_ERROR",
                                    format!("Invalid message format: {}", e),
                                );
                                let _ = send(&mut sender, &error).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    if !left {
        leave(&state, &conn).await;
    }
    tracing::info!("WebSocket connection closed for {} in room {}", conn.user.id, conn.room_id);
}

/// A dropped connection counts as leaving the room
async fn leave(state: &AppState, conn: &Connection) {
    match state.leave_room(&conn.room_id, &conn.user.id).await {
        Ok(_) | Err(AppError::RoomNotFound(_)) => {}
        Err(e) => tracing::warn!("Leave on disconnect failed: {}", e),
    }
}
