//! Persistent interaction history
//!
//! Provides:
//! - SQLite-backed `chat_history` table of prompt/response exchanges
//! - Feedback and curated-response updates
//! - Keyword-overlap lookup of reusable answers

pub mod sqlite;
pub mod matcher;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use sqlite::{InteractionStore, StoreStats};
pub use matcher::{find_reusable_answer, CandidateSource, overlap_ratio, select_reusable, tokenize, DEFAULT_OVERLAP_THRESHOLD};

/// Thumbs up / thumbs down on a stored response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feedback {
    Positive,
    Negative,
}

impl Feedback {
    pub fn from_positive(is_positive: bool) -> Self {
        if is_positive {
            Feedback::Positive
        } else {
            Feedback::Negative
        }
    }

    /// Integer stored in the `feedback` column
    pub fn to_column(self) -> i64 {
        match self {
            Feedback::Positive => 1,
            Feedback::Negative => 0,
        }
    }

    /// Decode the nullable `feedback` column; unknown values read as unset
    pub fn from_column(value: Option<i64>) -> Option<Self> {
        match value {
            Some(1) => Some(Feedback::Positive),
            Some(0) => Some(Feedback::Negative),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Feedback::Positive => "👍",
            Feedback::Negative => "👎",
        }
    }
}

impl std::fmt::Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feedback::Positive => write!(f, "positive"),
            Feedback::Negative => write!(f, "negative"),
        }
    }
}

/// One logged prompt/response exchange plus its feedback state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Auto-assigned row id (insertion order)
    pub id: i64,
    /// When the exchange happened
    pub timestamp: DateTime<Utc>,
    /// The user's prompt
    pub prompt: String,
    /// What the model answered
    pub response: String,
    /// Unset until the user rates the answer
    pub feedback: Option<Feedback>,
    /// Human-written replacement, normally only after negative feedback
    pub curated_response: Option<String>,
}

impl InteractionRecord {
    /// Answer text to reuse: curated text wins over the raw response
    pub fn reusable_text(&self) -> &str {
        self.curated_response.as_deref().unwrap_or(&self.response)
    }

    /// Whether the matcher may consider this record at all
    pub fn is_reusable(&self) -> bool {
        self.feedback == Some(Feedback::Positive) || self.curated_response.is_some()
    }
}
