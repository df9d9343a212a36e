//! Email login with bearer session tokens.
//!
//! Passwords are accepted but not checked; a login either finds the profile
//! with that email or creates a fresh one.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, Response},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;

use crate::state::{AppError, AppState};
use crate::types::*;

/// The logged-in user, inserted into request extensions by [`require_session`]
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

fn display_name(email: &str, name: Option<&str>) -> String {
    if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    match email.split('@').next().map(str::trim) {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => petname::petname(2, " ").unwrap_or_else(|| "Debater".to_string()),
    }
}

impl AppState {
    /// Log in with `email`, signing up when no profile has it yet
    pub async fn login(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<(SessionToken, User), AppError> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(AppError::InvalidEmail);
        }

        let user = match self.profiles.find_by_email(email).await {
            Some(user) => user,
            None => {
                let user = User {
                    id: format!("user-{}", ulid::Ulid::new().to_string().to_lowercase()),
                    name: display_name(email, name),
                    email: email.to_string(),
                    avatar: DEFAULT_AVATAR.to_string(),
                    stats: UserStats::default(),
                    debate_history: Vec::new(),
                };
                self.profiles.put(user.clone()).await?;
                tracing::info!("Signed up {} as {}", user.email, user.id);
                user
            }
        };

        let token = ulid::Ulid::new().to_string();
        self.sessions
            .write()
            .await
            .insert(token.clone(), user.id.clone());
        tracing::info!("{} logged in", user.id);
        Ok((token, user))
    }

    /// End a session. Returns false for unknown tokens.
    pub async fn logout(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// The user behind a session token
    pub async fn authenticate(&self, token: &str) -> Option<User> {
        let user_id = self.sessions.read().await.get(token).cloned()?;
        self.profiles.get(&user_id).await
    }
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware rejecting requests without a valid session
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let user = match bearer_token(request.headers()) {
        Some(token) => state.authenticate(token).await,
        None => None,
    };

    match user {
        Some(user) => {
            request.extensions_mut().insert(AuthUser(user));
            next.run(request).await
        }
        None => AppError::Unauthorized.into_response(),
    }
}
