use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    StartDebate,
    /// Replace this participant's private notes
    UpdateNotes {
        text: String,
    },
    SubmitRating {
        ratee_id: ParticipantId,
        score: u8,
        #[serde(default)]
        feedback: String,
    },
    ToggleMic,
    ToggleVideo,
    Leave,
    AcknowledgeResults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        user_id: UserId,
        room: RoomView,
        server_now: String,
    },
    RoomState {
        room: RoomView,
    },
    Feedback {
        room_id: RoomId,
        text: String,
    },
    Results {
        room_id: RoomId,
        results: Vec<RankedResult>,
    },
    RatingAck {
        ratee_id: ParticipantId,
        recorded: bool,
    },
    NotesSaved,
    MediaState {
        audio_enabled: bool,
        video_enabled: bool,
    },
    Left {
        room_id: RoomId,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn error(code: &str, msg: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            msg: msg.into(),
        }
    }
}

/// A participant as the room UI renders it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantView {
    pub id: ParticipantId,
    pub name: String,
    pub avatar: String,
    pub kind: ParticipantKind,
    pub is_speaking: bool,
    pub video_attached: bool,
    pub ratings_received: usize,
}

impl From<&Participant> for ParticipantView {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            avatar: p.avatar.clone(),
            kind: p.kind,
            is_speaking: p.is_speaking,
            video_attached: p.video_attached,
            ratings_received: p.ratings.len(),
        }
    }
}

/// Read-only room snapshot sent to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomView {
    pub id: RoomId,
    pub host_id: UserId,
    pub topic: String,
    pub phase: DebatePhase,
    pub phase_title: String,
    pub phase_description: String,
    pub current_speaker: Option<ParticipantId>,
    pub total_remaining: u32,
    pub phase_remaining: u32,
    /// mm:ss
    pub total_clock: String,
    /// mm:ss
    pub phase_clock: String,
    pub participants: Vec<ParticipantView>,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub media_warning: Option<String>,
    pub feedback: Option<String>,
    pub results: Vec<RankedResult>,
}

/// Format seconds as mm:ss
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
