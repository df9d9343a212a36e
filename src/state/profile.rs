use super::{AppError, AppState};
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Profile page payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileView {
    pub user: User,
    /// Percent, rounded
    pub win_rate: u32,
}

impl From<User> for ProfileView {
    fn from(user: User) -> Self {
        Self {
            win_rate: user.stats.win_rate(),
            user,
        }
    }
}

fn mock_user(id: &str, name: &str, email: &str, stats: (u32, u32, u32, f64)) -> User {
    let (total_points, debates_participated, debates_won, average_rating) = stats;
    User {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        avatar: DEFAULT_AVATAR.to_string(),
        stats: UserStats {
            total_points,
            debates_participated,
            debates_won,
            average_rating,
        },
        debate_history: Vec::new(),
    }
}

/// Demo accounts the leaderboard and bot opponents are seeded from
pub fn mock_users() -> Vec<User> {
    let mut alex = mock_user("user-1", "Alex Johnson", "alex@example.com", (450, 15, 7, 8.2));
    alex.debate_history = vec![
        DebateResult {
            id: "debate-1".to_string(),
            topic: "Is AI development moving too quickly without proper regulation?".to_string(),
            date: "2025-03-15".to_string(),
            score: 8.5,
            position: 1,
            participants: 4,
        },
        DebateResult {
            id: "debate-2".to_string(),
            topic: "Should voting be mandatory?".to_string(),
            date: "2025-03-10".to_string(),
            score: 7.8,
            position: 2,
            participants: 4,
        },
    ];

    vec![
        alex,
        mock_user("user-2", "Sam Rivera", "sam@example.com", (380, 12, 5, 7.9)),
        mock_user("user-3", "Taylor Kim", "taylor@example.com", (520, 18, 9, 8.5)),
        mock_user("user-4", "Jordan Smith", "jordan@example.com", (410, 14, 6, 8.0)),
        mock_user("user-5", "Jamie Lee", "jamie@example.com", (350, 10, 4, 7.8)),
        mock_user("user-6", "Casey Morgan", "casey@example.com", (320, 9, 3, 7.6)),
        mock_user("user-7", "Riley Patel", "riley@example.com", (290, 8, 2, 7.5)),
        mock_user("user-8", "Quinn Wilson", "quinn@example.com", (260, 7, 2, 7.4)),
        mock_user("user-9", "Avery Chen", "avery@example.com", (230, 6, 1, 7.3)),
        mock_user("user-10", "Morgan Davis", "morgan@example.com", (200, 5, 1, 7.2)),
    ]
}

/// Up to `count` demo accounts to seat as bots next to `host_id`, starting with user-2
pub fn mock_opponents(host_id: &str, count: usize) -> Vec<User> {
    let mut pool = mock_users();
    pool.rotate_left(1);
    pool.into_iter()
        .filter(|u| u.id != host_id)
        .take(count)
        .collect()
}

/// Fold one finished debate into a user's record
pub fn apply_result(user: &mut User, result: DebateResult) {
    let stats = &mut user.stats;
    let n = stats.debates_participated as f64;
    stats.average_rating = (stats.average_rating * n + result.score) / (n + 1.0);
    stats.debates_participated += 1;
    stats.total_points += result.score.round() as u32;
    if result.position == 1 {
        stats.debates_won += 1;
    }
    user.debate_history.insert(0, result);
}

impl AppState {
    pub async fn get_profile(&self, user_id: &str) -> Option<ProfileView> {
        self.profiles.get(user_id).await.map(ProfileView::from)
    }

    /// Append a finished debate to a user's history and update their stats
    pub async fn record_debate_result(
        &self,
        user_id: &str,
        result: DebateResult,
    ) -> Result<Option<User>, AppError> {
        tracing::info!(
            "Recording debate {} for {}: position {} score {:.1}",
            result.id,
            user_id,
            result.position,
            result.score
        );
        let updated = self
            .profiles
            .update(user_id, |user| apply_result(user, result))
            .await?;
        if updated.is_none() {
            tracing::warn!("No profile for {}, debate result dropped", user_id);
        }
        Ok(updated)
    }
}
