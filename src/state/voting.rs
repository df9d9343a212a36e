use super::{AppError, AppState};
use crate::debate::rating::RatingOutcome;
use crate::debate::DebateSession;
use crate::protocol::ServerMessage;
use crate::types::*;
use rand::seq::IndexedRandom;
use rand::Rng;

const BOT_COMMENTS: &[&str] = &[
    "Clear structure and confident delivery.",
    "Good points, but more evidence would have helped.",
    "Strong rebuttals during the counter questions.",
    "Persuasive conclusion.",
];

/// Bots rate everyone they have not rated yet, 6 to 10 each.
/// Returns the ranking if that completed the voting.
pub fn rate_as_bots(session: &mut DebateSession) -> Option<Vec<RankedResult>> {
    let mut rng = rand::rng();
    let bots: Vec<ParticipantId> = session
        .participants
        .iter()
        .filter(|p| p.kind == ParticipantKind::Bot)
        .map(|p| p.id.clone())
        .collect();

    let mut completed = None;
    for bot in &bots {
        for ratee in session.pending_ratees(bot) {
            let score = rng.random_range(6..=10);
            let comment = BOT_COMMENTS.choose(&mut rng).copied().unwrap_or_default();
            if let RatingOutcome::Completed(results) =
                session.submit_rating(bot, &ratee, score, comment.to_string())
            {
                completed = Some(results);
            }
        }
    }

    // Covers sessions with nobody to rate at all
    completed.or_else(|| session.complete_if_rated())
}

impl AppState {
    /// First step of a room's voting phase: bots hand in their ratings
    pub async fn cast_bot_ratings(&self, room_id: &str) {
        let (completed, view) = {
            let mut rooms = self.rooms.write().await;
            let Some(room) = rooms.get_mut(room_id) else {
                return;
            };
            (rate_as_bots(&mut room.session), room.view())
        };

        self.broadcast_to_room(room_id, ServerMessage::RoomState { room: view });
        if let Some(results) = completed {
            self.finish_room(room_id, results).await;
        }
    }

    /// Write AI feedback from everyone's notes and publish it to the room
    pub async fn write_feedback(&self, room_id: &str) {
        let Some((topic, notes)) = self
            .rooms
            .read()
            .await
            .get(room_id)
            .map(|room| (room.session.topic.clone(), room.combined_notes()))
        else {
            return;
        };

        let text = self.content.generate_feedback(&topic, &notes).await;

        {
            let mut rooms = self.rooms.write().await;
            let Some(room) = rooms.get_mut(room_id) else {
                tracing::debug!("Room {} closed before feedback was ready", room_id);
                return;
            };
            room.session.feedback = Some(text.clone());
        }

        self.broadcast_to_room(
            room_id,
            ServerMessage::Feedback {
                room_id: room_id.to_string(),
                text,
            },
        );
    }

    /// Record a participant's rating of another participant
    pub async fn submit_rating(
        &self,
        room_id: &str,
        rater_id: &str,
        ratee_id: &str,
        score: u8,
        feedback: String,
    ) -> Result<RatingOutcome, AppError> {
        let (outcome, view) = {
            let mut rooms = self.rooms.write().await;
            let room = rooms
                .get_mut(room_id)
                .ok_or_else(|| AppError::RoomNotFound(room_id.to_string()))?;
            if !room.is_participant(rater_id) {
                return Err(AppError::NotParticipant);
            }
            let outcome = room.session.submit_rating(rater_id, ratee_id, score, feedback);
            (outcome, room.view())
        };

        match &outcome {
            RatingOutcome::Recorded => {
                self.broadcast_to_room(room_id, ServerMessage::RoomState { room: view });
            }
            RatingOutcome::Completed(results) => {
                self.broadcast_to_room(room_id, ServerMessage::RoomState { room: view });
                self.finish_room(room_id, results.clone()).await;
            }
            RatingOutcome::Ignored(reason) => {
                tracing::debug!(
                    "Rating {} -> {} in room {} ignored: {:?}",
                    rater_id,
                    ratee_id,
                    room_id,
                    reason
                );
            }
        }
        Ok(outcome)
    }

    /// Publish the ranking and write it into every human participant's profile
    async fn finish_room(&self, room_id: &str, results: Vec<RankedResult>) {
        let Some((topic, humans)) = self.rooms.read().await.get(room_id).map(|room| {
            let humans: Vec<ParticipantId> = room
                .session
                .participants
                .iter()
                .filter(|p| p.kind == ParticipantKind::Human)
                .map(|p| p.id.clone())
                .collect();
            (room.session.topic.clone(), humans)
        }) else {
            return;
        };

        tracing::info!(
            "Room {} finished, winner {}",
            room_id,
            results.first().map(|r| r.name.as_str()).unwrap_or("-")
        );

        let date = chrono::Utc::now().format("%Y-%m-%d").to_string();
        for result in results.iter().filter(|r| humans.contains(&r.id)) {
            let entry = DebateResult {
                id: room_id.to_string(),
                topic: topic.clone(),
                date: date.clone(),
                score: result.average_score,
                position: result.rank,
                participants: results.len() as u32,
            };
            if let Err(e) = self.record_debate_result(&result.id, entry).await {
                tracing::error!("Failed to record result for {}: {}", result.id, e);
            }
        }

        self.broadcast_to_room(
            room_id,
            ServerMessage::Results {
                room_id: room_id.to_string(),
                results,
            },
        );
    }
}
