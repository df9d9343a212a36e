use super::AppState;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LeaderboardSort {
    #[default]
    TotalPoints,
    DebatesWon,
    AverageRating,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub id: UserId,
    pub name: String,
    pub avatar: String,
    pub stats: UserStats,
    pub win_rate: u32,
}

fn compare(a: &User, b: &User, sort: LeaderboardSort) -> Ordering {
    let primary = match sort {
        LeaderboardSort::TotalPoints => b.stats.total_points.cmp(&a.stats.total_points),
        LeaderboardSort::DebatesWon => b.stats.debates_won.cmp(&a.stats.debates_won),
        LeaderboardSort::AverageRating => b.stats.average_rating.total_cmp(&a.stats.average_rating),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

/// Rank users by `sort`, best first
pub fn build_leaderboard(mut users: Vec<User>, sort: LeaderboardSort) -> Vec<LeaderboardEntry> {
    users.sort_by(|a, b| compare(a, b, sort));
    users
        .into_iter()
        .enumerate()
        .map(|(i, user)| LeaderboardEntry {
            rank: i as u32 + 1,
            win_rate: user.stats.win_rate(),
            id: user.id,
            name: user.name,
            avatar: user.avatar,
            stats: user.stats,
        })
        .collect()
}

impl AppState {
    pub async fn leaderboard(&self, sort: LeaderboardSort) -> Vec<LeaderboardEntry> {
        build_leaderboard(self.profiles.all().await, sort)
    }
}
