use crate::protocol::ServerMessage;
use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;

/// A server message addressed to every connection in one room
#[derive(Debug, Clone)]
pub struct RoomBroadcast {
    pub room_id: String,
    pub message: ServerMessage,
}

/// Spawn the background task that advances every running debate once per second
pub fn spawn_tick_driver(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // A slow tick must not be followed by a burst of catch-up ticks
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let ticked = state.tick_rooms().await;
            if ticked > 0 {
                tracing::trace!("Ticked {} running rooms", ticked);
            }
        }
    })
}
