//! WebSocket message dispatch
//!
//! Every message acts on the room the connection joined. Failures come back
//! to the sender as `error` messages; room-wide changes go out through the
//! room broadcast instead of the return value.

use crate::debate::rating::RatingOutcome;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppError, AppState};
use crate::types::*;
use std::sync::Arc;

/// Who is on the other end of a socket
#[derive(Debug, Clone)]
pub struct Connection {
    pub room_id: RoomId,
    pub user: User,
}

fn error_message(e: AppError) -> ServerMessage {
    ServerMessage::error(e.code(), e.to_string())
}

fn media_state((audio_enabled, video_enabled): (bool, bool)) -> ServerMessage {
    ServerMessage::MediaState {
        audio_enabled,
        video_enabled,
    }
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    conn: &Connection,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    let room_id = conn.room_id.as_str();
    let user_id = conn.user.id.as_str();

    let result = match msg {
        ClientMessage::StartDebate => state.start_debate(room_id, user_id).await.map(|started| {
            if !started {
                tracing::debug!("{} asked to start room {} again", user_id, room_id);
            }
            None
        }),

        ClientMessage::UpdateNotes { text } => state
            .update_notes(room_id, user_id, text)
            .await
            .map(|()| Some(ServerMessage::NotesSaved)),

        ClientMessage::SubmitRating {
            ratee_id,
            score,
            feedback,
        } => state
            .submit_rating(room_id, user_id, &ratee_id, score, feedback)
            .await
            .map(|outcome| {
                Some(ServerMessage::RatingAck {
                    ratee_id,
                    recorded: !matches!(outcome, RatingOutcome::Ignored(_)),
                })
            }),

        ClientMessage::ToggleMic => state
            .toggle_mic(room_id, user_id)
            .await
            .map(|s| Some(media_state(s))),

        ClientMessage::ToggleVideo => state
            .toggle_video(room_id, user_id)
            .await
            .map(|s| Some(media_state(s))),

        ClientMessage::Leave => state.leave_room(room_id, user_id).await.map(|_| {
            Some(ServerMessage::Left {
                room_id: room_id.to_string(),
            })
        }),

        ClientMessage::AcknowledgeResults => state
            .acknowledge_results(room_id, user_id)
            .await
            .map(|left| {
                left.then(|| ServerMessage::Left {
                    room_id: room_id.to_string(),
                })
            }),
    };

    result.unwrap_or_else(|e| {
        tracing::debug!("{} in room {}: {}", user_id, room_id, e);
        Some(error_message(e))
    })
}
