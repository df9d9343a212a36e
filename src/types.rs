use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque ID types
pub type RoomId = String;
pub type ParticipantId = String;
pub type UserId = String;
pub type SessionToken = String;
pub type CategoryId = String;

/// Stages of the structured debate format, in the only order they can occur
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DebatePhase {
    Waiting,
    Introduction,
    MainArguments,
    CounterQuestions,
    Conclusion,
    Voting,
    Results,
}

impl DebatePhase {
    /// Phases during which both countdowns run
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            DebatePhase::Introduction
                | DebatePhase::MainArguments
                | DebatePhase::CounterQuestions
                | DebatePhase::Conclusion
        )
    }

    /// Phases where the floor passes from one speaker to the next
    pub fn rotates_speakers(&self) -> bool {
        matches!(
            self,
            DebatePhase::Introduction | DebatePhase::MainArguments | DebatePhase::Conclusion
        )
    }

    pub fn title(&self) -> &'static str {
        match self {
            DebatePhase::Waiting => "Waiting to Start",
            DebatePhase::Introduction => "Introduction Phase",
            DebatePhase::MainArguments => "Main Arguments",
            DebatePhase::CounterQuestions => "Counter-Questioning Round",
            DebatePhase::Conclusion => "Conclusion Phase",
            DebatePhase::Voting => "Voting Phase",
            DebatePhase::Results => "Debate Results",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DebatePhase::Waiting => "Prepare your arguments for the debate",
            DebatePhase::Introduction => "Briefly introduce your position",
            DebatePhase::MainArguments => "Present your main arguments",
            DebatePhase::CounterQuestions => "Ask questions and challenge other participants",
            DebatePhase::Conclusion => "Summarize your position and final thoughts",
            DebatePhase::Voting => "Rate other participants and provide feedback",
            DebatePhase::Results => "View the results of the debate",
        }
    }
}

/// Timing and room setup for a debate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateConfig {
    pub introduction_secs: u32,
    pub main_arguments_secs: u32,
    pub counter_questions_secs: u32,
    pub conclusion_secs: u32,
    /// Overall debate clock
    pub total_secs: u32,
    /// Reported for phases without a countdown
    pub fallback_secs: u32,
    /// Mock opponents seated next to the room's creator
    pub bot_opponents: usize,
    /// Seconds a room may stay without any connection before it is discarded
    pub abandon_secs: u32,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            introduction_secs: 60,
            main_arguments_secs: 120,
            counter_questions_secs: 180,
            conclusion_secs: 60,
            total_secs: 600,
            fallback_secs: 120,
            bot_opponents: 3,
            abandon_secs: 60,
        }
    }
}

impl DebateConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let read = |key: &str, default: u32| -> u32 {
            std::env::var(key)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            introduction_secs: read("DEBATE_INTRODUCTION_SECS", defaults.introduction_secs),
            main_arguments_secs: read("DEBATE_MAIN_ARGUMENTS_SECS", defaults.main_arguments_secs),
            counter_questions_secs: read(
                "DEBATE_COUNTER_QUESTIONS_SECS",
                defaults.counter_questions_secs,
            ),
            conclusion_secs: read("DEBATE_CONCLUSION_SECS", defaults.conclusion_secs),
            total_secs: match read("DEBATE_TOTAL_SECS", defaults.total_secs) {
                0 => {
                    tracing::warn!(
                        "DEBATE_TOTAL_SECS=0 would never end a debate, using {}",
                        defaults.total_secs
                    );
                    defaults.total_secs
                }
                secs => secs,
            },
            fallback_secs: defaults.fallback_secs,
            bot_opponents: std::env::var("DEBATE_BOT_OPPONENTS")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.bot_opponents),
            abandon_secs: read("DEBATE_ABANDON_SECS", defaults.abandon_secs),
        }
    }

    /// Configured duration of a phase's countdown
    pub fn phase_duration(&self, phase: DebatePhase) -> u32 {
        match phase {
            DebatePhase::Introduction => self.introduction_secs,
            DebatePhase::MainArguments => self.main_arguments_secs,
            DebatePhase::CounterQuestions => self.counter_questions_secs,
            DebatePhase::Conclusion => self.conclusion_secs,
            _ => self.fallback_secs,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    Human,
    Bot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub avatar: String,
    pub kind: ParticipantKind,
    pub is_speaking: bool,
    /// A live capture stream is rendered in this participant's slot
    #[serde(default)]
    pub video_attached: bool,
    /// rater id -> score (1-10)
    #[serde(default)]
    pub ratings: HashMap<ParticipantId, u8>,
    /// rater id -> free-text feedback
    #[serde(default)]
    pub feedback: HashMap<ParticipantId, String>,
}

impl Participant {
    pub fn new(id: ParticipantId, name: String, avatar: String, kind: ParticipantKind) -> Self {
        Self {
            id,
            name,
            avatar,
            kind,
            is_speaking: false,
            video_attached: false,
            ratings: HashMap::new(),
            feedback: HashMap::new(),
        }
    }

    pub fn from_user(user: &User, kind: ParticipantKind) -> Self {
        Self::new(user.id.clone(), user.name.clone(), user.avatar.clone(), kind)
    }
}

/// One line of the results table shown after voting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedResult {
    pub id: ParticipantId,
    pub name: String,
    pub avatar: String,
    pub average_score: f64,
    pub rank: u32,
}

impl RankedResult {
    /// Score as displayed, one decimal place
    pub fn display_score(&self) -> String {
        format!("{:.1}", self.average_score)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserStats {
    pub total_points: u32,
    pub debates_participated: u32,
    pub debates_won: u32,
    pub average_rating: f64,
}

impl UserStats {
    /// Share of debates won, as a rounded percentage
    pub fn win_rate(&self) -> u32 {
        if self.debates_participated == 0 {
            return 0;
        }
        ((self.debates_won as f64 / self.debates_participated as f64) * 100.0).round() as u32
    }
}

/// Entry in a user's debate history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateResult {
    pub id: String,
    pub topic: String,
    /// YYYY-MM-DD
    pub date: String,
    pub score: f64,
    pub position: u32,
    pub participants: u32,
}

/// Persisted user profile record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub stats: UserStats,
    /// Newest first
    #[serde(default)]
    pub debate_history: Vec<DebateResult>,
}

/// Placeholder avatar used when a user has none
pub const DEFAULT_AVATAR: &str = "/placeholder.svg?height=40&width=40";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub label: String,
}

/// Categories a debate topic can be drawn from
pub const CATEGORIES: &[(&str, &str)] = &[
    ("politics", "Politics"),
    ("technology", "Technology"),
    ("ethics", "Ethics"),
    ("environment", "Environment"),
    ("education", "Education"),
    ("health", "Healthcare"),
    ("economics", "Economics"),
    ("social", "Social Issues"),
];

pub fn categories() -> Vec<Category> {
    CATEGORIES
        .iter()
        .map(|(id, label)| Category {
            id: id.to_string(),
            label: label.to_string(),
        })
        .collect()
}

pub fn is_known_category(id: &str) -> bool {
    CATEGORIES.iter().any(|(known, _)| *known == id)
}
