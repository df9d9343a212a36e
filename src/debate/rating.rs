//! Peer ratings collected during the voting phase, and the final ranking.

use super::DebateSession;
use crate::types::*;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotVoting,
    SelfRating,
    UnknownParticipant,
    AlreadyRated,
    ScoreOutOfRange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RatingOutcome {
    Recorded,
    /// The last missing rating arrived; the session is now in `Results`
    Completed(Vec<RankedResult>),
    Ignored(IgnoreReason),
}

impl DebateSession {
    /// Record `rater`'s score for `ratee`. Each participant rates every other
    /// participant at most once; anything else is ignored.
    pub fn submit_rating(
        &mut self,
        rater: &str,
        ratee: &str,
        score: u8,
        feedback: String,
    ) -> RatingOutcome {
        if self.phase != DebatePhase::Voting {
            return RatingOutcome::Ignored(IgnoreReason::NotVoting);
        }
        if rater == ratee {
            return RatingOutcome::Ignored(IgnoreReason::SelfRating);
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            return RatingOutcome::Ignored(IgnoreReason::ScoreOutOfRange);
        }
        if self.participant(rater).is_none() {
            return RatingOutcome::Ignored(IgnoreReason::UnknownParticipant);
        }
        let Some(target) = self.participants.iter_mut().find(|p| p.id == ratee) else {
            return RatingOutcome::Ignored(IgnoreReason::UnknownParticipant);
        };
        if target.ratings.contains_key(rater) {
            return RatingOutcome::Ignored(IgnoreReason::AlreadyRated);
        }

        target.ratings.insert(rater.to_string(), score);
        target.feedback.insert(rater.to_string(), feedback);

        self.complete_if_rated()
            .map_or(RatingOutcome::Recorded, RatingOutcome::Completed)
    }

    /// Every participant has rated every other participant
    pub fn all_rated(&self) -> bool {
        self.participants.iter().all(|ratee| {
            self.participants
                .iter()
                .filter(|rater| rater.id != ratee.id)
                .all(|rater| ratee.ratings.contains_key(&rater.id))
        })
    }

    /// Participants `rater_id` has not rated yet
    pub fn pending_ratees(&self, rater_id: &str) -> Vec<ParticipantId> {
        self.participants
            .iter()
            .filter(|p| p.id != rater_id && !p.ratings.contains_key(rater_id))
            .map(|p| p.id.clone())
            .collect()
    }

    /// Move to `Results` when voting is complete, returning the ranking
    pub fn complete_if_rated(&mut self) -> Option<Vec<RankedResult>> {
        if self.phase != DebatePhase::Voting || !self.all_rated() {
            return None;
        }
        let results = rank(&self.participants);
        self.finish_voting(results.clone());
        Some(results)
    }
}

/// Mean of the ratings a participant received, 0 when nobody rated them
pub fn average_score(participant: &Participant) -> f64 {
    if participant.ratings.is_empty() {
        return 0.0;
    }
    let sum: u32 = participant.ratings.values().map(|&r| r as u32).sum();
    sum as f64 / participant.ratings.len() as f64
}

/// Rank participants by average score, highest first. Ties keep turn order.
pub fn rank(participants: &[Participant]) -> Vec<RankedResult> {
    let mut scored: Vec<(&Participant, f64)> = participants
        .iter()
        .map(|p| (p, average_score(p)))
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (p, average_score))| RankedResult {
            id: p.id.clone(),
            name: p.name.clone(),
            avatar: p.avatar.clone(),
            average_score,
            rank: i as u32 + 1,
        })
        .collect()
}
