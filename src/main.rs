use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use debatedash::{
    api, broadcast, content, llm, media::LoopbackCaptureDevice, state::profile,
    state::AppState, store::ProfileStore, types::DebateConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debatedash=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DebateDash...");

    let server_config = api::ServerConfig::from_env();
    let debate_config = DebateConfig::from_env();
    let llm_config = llm::LlmConfig::from_env();

    let profiles = ProfileStore::from_env().await?;
    // Demo accounts back the leaderboard and the bot opponents
    profiles.seed(profile::mock_users()).await?;
    tracing::info!("{} profiles available", profiles.len().await);

    let state = Arc::new(AppState::with_components(
        debate_config,
        profiles,
        content::build_provider(&llm_config),
        Arc::new(LoopbackCaptureDevice::from_env()),
    ));

    broadcast::spawn_tick_driver(state.clone());

    let app = api::build_router(state, server_config.static_dir.clone());

    let addr = server_config.addr();
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
