pub mod leaderboard;
pub mod profile;
pub mod room;
pub mod voting;

pub use room::DebateRoom;

use crate::broadcast::RoomBroadcast;
use crate::content::{ContentProvider, TemplateContentProvider};
use crate::media::{CaptureDevice, LoopbackCaptureDevice};
use crate::protocol::ServerMessage;
use crate::store::{ProfileStore, StoreError};
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Errors surfaced to HTTP and WebSocket clients
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Room {0} not found")]
    RoomNotFound(RoomId),

    #[error("You are not a participant of this room")]
    NotParticipant,

    #[error("Please select at least one category")]
    NoCategories,

    #[error("The debate has already started")]
    AlreadyStarted,

    #[error("Only the room creator controls the camera and microphone")]
    NotMediaOwner,

    #[error("No camera or microphone is connected in this room")]
    NoCapture,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    /// Stable code for WebSocket error messages
    pub fn code(&self) -> &'static str {
        match self {
            AppError::RoomNotFound(_) => "ROOM_NOT_FOUND",
            AppError::NotParticipant => "NOT_PARTICIPANT",
            AppError::NoCategories => "NO_CATEGORIES",
            AppError::AlreadyStarted => "ALREADY_STARTED",
            AppError::NotMediaOwner => "NOT_MEDIA_OWNER",
            AppError::NoCapture => "NO_CAPTURE",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::InvalidEmail => "INVALID_EMAIL",
            AppError::Store(_) => "STORE_ERROR",
        }
    }
}

/// Shared application state, passed explicitly to every handler and to the tick driver
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<RoomId, DebateRoom>>>,
    /// Login sessions: token -> user id
    pub sessions: Arc<RwLock<HashMap<SessionToken, UserId>>>,
    pub profiles: Arc<ProfileStore>,
    pub content: Arc<dyn ContentProvider>,
    pub capture: Arc<dyn CaptureDevice>,
    pub config: DebateConfig,
    /// Room updates for every connected WebSocket (filtered by room id on the receiving end)
    pub broadcast: broadcast::Sender<RoomBroadcast>,
}

impl AppState {
    /// In-memory state with template content, a loopback capture device and the mock users
    pub fn new() -> Self {
        Self::with_components(
            DebateConfig::default(),
            ProfileStore::with_profiles(profile::mock_users()),
            Arc::new(TemplateContentProvider),
            Arc::new(LoopbackCaptureDevice::new()),
        )
    }

    pub fn with_components(
        config: DebateConfig,
        profiles: ProfileStore,
        content: Arc<dyn ContentProvider>,
        capture: Arc<dyn CaptureDevice>,
    ) -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            profiles: Arc::new(profiles),
            content,
            capture,
            config,
            broadcast: tx,
        }
    }

    /// Send a message to every connection watching `room_id`
    pub fn broadcast_to_room(&self, room_id: &str, message: ServerMessage) {
        // No receivers connected is fine
        let _ = self.broadcast.send(RoomBroadcast {
            room_id: room_id.to_string(),
            message,
        });
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
