// Public API for integration tests and potential library usage

pub mod api;
pub mod auth;
pub mod content;
pub mod debate;
pub mod llm;
pub mod media;
pub mod protocol;
pub mod state;
pub mod store;
pub mod types;
pub mod ws;

// Re-export broadcast for testing
pub mod broadcast;
