//! HTTP API endpoints.
//!
//! Login, room creation, the leaderboard and the profile page. Live room
//! traffic goes over `/ws`.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::auth::{self, AuthUser};
use crate::protocol::RoomView;
use crate::state::leaderboard::{LeaderboardEntry, LeaderboardSort};
use crate::state::profile::ProfileView;
use crate::state::{AppError, AppState};
use crate::types::*;
use crate::ws;

/// Listener and static file settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3210,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl ServerConfig {
    /// Load from PORT and STATIC_DIR
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!("Invalid PORT {:?}, using {}", raw, defaults.port);
                defaults.port
            }),
            Err(_) => defaults.port,
        };
        let static_dir = std::env::var("STATIC_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.static_dir);
        Self { port, static_dir }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotParticipant | AppError::NotMediaOwner => StatusCode::FORBIDDEN,
            AppError::NoCategories | AppError::InvalidEmail => StatusCode::BAD_REQUEST,
            AppError::AlreadyStarted | AppError::NoCapture => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Store(e) => {
                tracing::error!("Profile store failure: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            code: self.code(),
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    /// Accepted for form compatibility, never checked
    #[serde(default)]
    pub password: String,
    /// Display name for a new account
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: SessionToken,
    pub user: User,
}

/// POST /api/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let (token, user) = state.login(&req.email, req.name.as_deref()).await?;
    Ok(Json(LoginResponse { token, user }))
}

/// POST /api/logout
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = auth::bearer_token(&headers) {
        state.logout(token).await;
    }
    StatusCode::NO_CONTENT
}

/// GET /api/categories
pub async fn list_categories() -> Json<Vec<Category>> {
    Json(categories())
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub categories: Vec<CategoryId>,
}

/// POST /api/rooms
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomView>), AppError> {
    let room = state.create_room(&user, &req.categories).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// GET /api/rooms/{id}
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<RoomId>,
) -> Result<Json<RoomView>, AppError> {
    state
        .get_room(&room_id)
        .await
        .map(Json)
        .ok_or(AppError::RoomNotFound(room_id))
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub sort: LeaderboardSort,
}

/// GET /api/leaderboard?sort=totalPoints|debatesWon|averageRating
pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Json<Vec<LeaderboardEntry>> {
    Json(state.leaderboard(query.sort).await)
}

/// GET /api/profile
pub async fn profile(Extension(AuthUser(user)): Extension<AuthUser>) -> Json<ProfileView> {
    Json(ProfileView::from(user))
}

/// Every route, with the session check on the ones that need a login
pub fn build_router(state: Arc<AppState>, static_dir: impl Into<PathBuf>) -> Router {
    let protected = Router::new()
        .route("/api/rooms", post(create_room))
        .route("/api/profile", get(profile))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    let public = Router::new()
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/categories", get(list_categories))
        .route("/api/rooms/{id}", get(get_room))
        .route("/api/leaderboard", get(leaderboard))
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .merge(protected)
        .merge(public)
        .fallback_service(ServeDir::new(static_dir.into()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
