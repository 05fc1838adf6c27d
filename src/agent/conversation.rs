//! In-memory transcript of the current chat session
//!
//! This is a rendering mirror only. It is never re-read from the store, so
//! it can drift from what another session writes to the same record.

use chrono::{DateTime, Utc};

use crate::memory::Feedback;
pub use crate::types::Role;

/// One line of the transcript
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Store id of the exchange (assistant entries only)
    pub record_id: Option<i64>,
    /// Feedback given in this session
    pub feedback: Option<Feedback>,
    /// Curated text submitted in this session
    pub curated_response: Option<String>,
    /// Whether an earlier answer was injected as context
    pub reused_context: bool,
}

/// Conversation transcript
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// Create a new empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add_user(&mut self, content: impl Into<String>) {
        self.entries.push(TranscriptEntry {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            record_id: None,
            feedback: None,
            curated_response: None,
            reused_context: false,
        });
    }

    pub fn add_assistant(&mut self, record_id: i64, content: impl Into<String>, reused_context: bool) {
        self.entries.push(TranscriptEntry {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            record_id: Some(record_id),
            feedback: None,
            curated_response: None,
            reused_context,
        });
    }

    /// Record id of the newest assistant message
    pub fn last_record_id(&self) -> Option<i64> {
        self.entries.iter().rev().find_map(|e| e.record_id)
    }

    /// User prompt that produced the given record, if it is in this transcript
    pub fn prompt_for(&self, record_id: i64) -> Option<&str> {
        let idx = self.entries.iter().position(|e| e.record_id == Some(record_id))?;
        self.entries[..idx]
            .iter()
            .rev()
            .find(|e| e.role == Role::User)
            .map(|e| e.content.as_str())
    }

    pub fn mark_feedback(&mut self, record_id: i64, feedback: Feedback) {
        if let Some(entry) = self.entry_mut(record_id) {
            entry.feedback = Some(feedback);
        }
    }

    pub fn mark_curated(&mut self, record_id: i64, text: impl Into<String>) {
        if let Some(entry) = self.entry_mut(record_id) {
            entry.curated_response = Some(text.into());
        }
    }

    fn entry_mut(&mut self, record_id: i64) -> Option<&mut TranscriptEntry> {
        self.entries.iter_mut().find(|e| e.record_id == Some(record_id))
    }

    /// Get a summary of the transcript for display
    pub fn summary(&self) -> String {
        let user_count = self.entries.iter().filter(|e| e.role == Role::User).count();
        let rated = self.entries.iter().filter(|e| e.feedback.is_some()).count();
        let curated = self.entries.iter().filter(|e| e.curated_response.is_some()).count();

        format!(
            "{} exchange(s), {} rated, {} curated",
            user_count, rated, curated
        )
    }
}
