//! Chat session state machine
//!
//! Owns the transcript mirror and the curation state. Rendering lives in
//! `interactive`; everything here is plain method calls so it can be driven
//! from the REPL, the one-shot CLI commands or tests.

use anyhow::{Context, Result};
use chrono::Utc;

use super::conversation::Transcript;
use super::responder::Responder;
use crate::memory::{find_reusable_answer, Feedback, InteractionStore, DEFAULT_OVERLAP_THRESHOLD};

/// Whether a negative answer is waiting for a human correction
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CurationState {
    #[default]
    Idle,
    AwaitingCuration {
        record_id: i64,
        original_prompt: String,
    },
}

/// Outcome of a best-effort store write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Updated,
    NoSuchRecord,
    /// The write failed; the failure was logged and the user still sees an ack
    Failed,
}

/// Result of one prompt/response turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub record_id: i64,
    pub response: String,
    /// Earlier answer injected as context, if any
    pub reused_context: Option<String>,
}

/// Acknowledgement for a thumbs up/down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackAck {
    pub record_id: i64,
    pub feedback: Feedback,
    pub status: WriteStatus,
}

/// Acknowledgement for a submitted correction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurationAck {
    pub record_id: i64,
    pub status: WriteStatus,
}

pub struct Session {
    store: InteractionStore,
    responder: Responder,
    threshold: f64,
    transcript: Transcript,
    state: CurationState,
}

impl Session {
    pub fn new(store: InteractionStore, responder: Responder) -> Self {
        Self {
            store,
            responder,
            threshold: DEFAULT_OVERLAP_THRESHOLD,
            transcript: Transcript::new(),
            state: CurationState::Idle,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn store(&self) -> &InteractionStore {
        &self.store
    }

    pub fn responder(&self) -> &Responder {
        &self.responder
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> &CurationState {
        &self.state
    }

    pub fn is_awaiting_curation(&self) -> bool {
        matches!(self.state, CurationState::AwaitingCuration { .. })
    }

    /// Match, generate, persist. A model fault aborts the turn and nothing is
    /// stored; the caller shows the error and the user resubmits.
    pub async fn submit_prompt(&mut self, prompt: &str) -> Result<TurnOutcome> {
        let reused_context = find_reusable_answer(&self.store, prompt, self.threshold);
        if reused_context.is_some() {
            tracing::info!("Injecting a reusable answer as context");
        }

        let response = self
            .responder
            .generate(prompt, reused_context.as_deref())
            .await
            .context("Model call failed")?;

        let record_id = self
            .store
            .create_record(Utc::now(), prompt, &response)
            .context("Failed to save interaction")?;

        self.transcript.add_user(prompt);
        self.transcript
            .add_assistant(record_id, response.clone(), reused_context.is_some());

        Ok(TurnOutcome {
            record_id,
            response,
            reused_context,
        })
    }

    /// Thumbs up/down. Negative feedback opens curation for that record,
    /// replacing any curation already pending.
    pub fn give_feedback(&mut self, record_id: i64, is_positive: bool) -> FeedbackAck {
        let feedback = Feedback::from_positive(is_positive);

        let status = match self.store.set_feedback(record_id, is_positive) {
            Ok(true) => WriteStatus::Updated,
            Ok(false) => WriteStatus::NoSuchRecord,
            Err(e) => {
                tracing::warn!("Failed to save feedback for record {}: {:#}", record_id, e);
                WriteStatus::Failed
            }
        };

        self.transcript.mark_feedback(record_id, feedback);

        if feedback == Feedback::Negative {
            let original_prompt = self.prompt_of(record_id);
            if let CurationState::AwaitingCuration { record_id: previous, .. } = &self.state {
                if *previous != record_id {
                    tracing::debug!("Curation target moved from {} to {}", previous, record_id);
                }
            }
            self.state = CurationState::AwaitingCuration {
                record_id,
                original_prompt,
            };
        }

        FeedbackAck {
            record_id,
            feedback,
            status,
        }
    }

    /// Store the correction for the pending record and return to idle
    pub fn submit_curation(&mut self, text: &str) -> Result<CurationAck> {
        let record_id = match &self.state {
            CurationState::AwaitingCuration { record_id, .. } => *record_id,
            CurationState::Idle => anyhow::bail!("No response is awaiting curation"),
        };

        if text.trim().is_empty() {
            anyhow::bail!("Curated response is empty");
        }

        let status = match self.store.set_curated_response(record_id, text) {
            Ok(true) => WriteStatus::Updated,
            Ok(false) => WriteStatus::NoSuchRecord,
            Err(e) => {
                tracing::warn!("Failed to save curated response for record {}: {:#}", record_id, e);
                WriteStatus::Failed
            }
        };

        self.transcript.mark_curated(record_id, text);
        self.state = CurationState::Idle;

        Ok(CurationAck { record_id, status })
    }

    /// Leave curation without writing anything
    pub fn cancel_curation(&mut self) -> bool {
        let was_pending = self.is_awaiting_curation();
        self.state = CurationState::Idle;
        was_pending
    }

    fn prompt_of(&self, record_id: i64) -> String {
        if let Some(prompt) = self.transcript.prompt_for(record_id) {
            return prompt.to_string();
        }
        match self.store.get_record(record_id) {
            Ok(Some(record)) => record.prompt,
            Ok(None) => String::new(),
            Err(e) => {
                tracing::warn!("Failed to load record {}: {:#}", record_id, e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::llm::{ChatMessage, ChatModel, ModelError};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    struct ScriptedModel {
        answer: String,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
        fail: bool,
    }

    impl ScriptedModel {
        fn answering(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.to_string(),
                calls: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                answer: String::new(),
                calls: Mutex::new(Vec::new()),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, _model: &str, messages: Vec<ChatMessage>) -> Result<String, ModelError> {
            self.calls.lock().unwrap().push(messages);
            if self.fail {
                Err(ModelError::Decode("offline".to_string()))
            } else {
                Ok(self.answer.clone())
            }
        }
    }

    fn session_with(model: Arc<ScriptedModel>) -> (tempfile::TempDir, Session) {
        let dir = tempdir().unwrap();
        let store = InteractionStore::open(dir.path().join("s.db")).unwrap();
        let responder = Responder::new(model, "mistral");
        (dir, Session::new(store, responder))
    }

    #[tokio::test]
    async fn test_turn_persists_record() {
        let (_dir, mut session) = session_with(ScriptedModel::answering("Paris"));

        let outcome = session.submit_prompt("capital of France").await.unwrap();
        assert_eq!(outcome.response, "Paris");
        assert!(outcome.reused_context.is_none());

        let record = session.store().get_record(outcome.record_id).unwrap().unwrap();
        assert_eq!(record.prompt, "capital of France");
        assert_eq!(record.response, "Paris");
        assert_eq!(record.feedback, None);
        assert_eq!(session.transcript().len(), 2);
    }

    #[tokio::test]
    async fn test_model_failure_stores_nothing() {
        let (_dir, mut session) = session_with(ScriptedModel::failing());

        assert!(session.submit_prompt("hello").await.is_err());
        assert_eq!(session.store().stats().unwrap().total_records, 0);
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_positive_feedback_keeps_idle_and_enables_reuse() {
        let model = ScriptedModel::answering("Paris");
        let (_dir, mut session) = session_with(model.clone());

        let first = session.submit_prompt("What is the capital of France?").await.unwrap();
        let ack = session.give_feedback(first.record_id, true);
        assert_eq!(ack.status, WriteStatus::Updated);
        assert_eq!(session.state(), &CurationState::Idle);

        let second = session.submit_prompt("what is the capital of france").await.unwrap();
        assert_eq!(second.reused_context.as_deref(), Some("Paris"));

        let calls = model.calls.lock().unwrap();
        assert_eq!(calls[0].len(), 1);
        assert_eq!(calls[1].len(), 2);
        assert!(calls[1][0].content.ends_with("Paris"));
    }

    #[tokio::test]
    async fn test_negative_feedback_then_curation() {
        let (_dir, mut session) = session_with(ScriptedModel::answering("It will rain"));

        let turn = session.submit_prompt("weather today").await.unwrap();
        session.give_feedback(turn.record_id, false);
        assert_eq!(
            session.state(),
            &CurationState::AwaitingCuration {
                record_id: turn.record_id,
                original_prompt: "weather today".to_string(),
            }
        );

        let ack = session.submit_curation("It's sunny, 20°C").unwrap();
        assert_eq!(ack.status, WriteStatus::Updated);
        assert_eq!(session.state(), &CurationState::Idle);

        let record = session.store().get_record(turn.record_id).unwrap().unwrap();
        assert_eq!(record.feedback, Some(Feedback::Negative));
        assert_eq!(record.curated_response.as_deref(), Some("It's sunny, 20°C"));

        let next = session.submit_prompt("weather today please").await.unwrap();
        assert_eq!(next.reused_context.as_deref(), Some("It's sunny, 20°C"));
    }

    #[tokio::test]
    async fn test_second_negative_overwrites_pending_target() {
        let (_dir, mut session) = session_with(ScriptedModel::answering("meh"));

        let a = session.submit_prompt("first question").await.unwrap();
        let b = session.submit_prompt("second question").await.unwrap();
        session.give_feedback(a.record_id, false);
        session.give_feedback(b.record_id, false);

        session.submit_curation("fixed").unwrap();
        let rec_a = session.store().get_record(a.record_id).unwrap().unwrap();
        let rec_b = session.store().get_record(b.record_id).unwrap().unwrap();
        assert_eq!(rec_a.curated_response, None);
        assert_eq!(rec_b.curated_response.as_deref(), Some("fixed"));
    }

    #[tokio::test]
    async fn test_curation_rejected_when_idle_or_empty() {
        let (_dir, mut session) = session_with(ScriptedModel::answering("x"));
        assert!(session.submit_curation("anything").is_err());

        let turn = session.submit_prompt("q").await.unwrap();
        session.give_feedback(turn.record_id, false);
        assert!(session.submit_curation("   ").is_err());
        assert!(session.is_awaiting_curation());

        assert!(session.cancel_curation());
        assert!(!session.cancel_curation());
        let record = session.store().get_record(turn.record_id).unwrap().unwrap();
        assert_eq!(record.curated_response, None);
    }

    #[tokio::test]
    async fn test_curated_text_stored_as_written() {
        let (_dir, mut session) = session_with(ScriptedModel::answering("x"));
        let turn = session.submit_prompt("show me a loop").await.unwrap();
        session.give_feedback(turn.record_id, false);

        let text = "    for i in 0..3 {\n        println!(\"{i}\");\n    }\n";
        session.submit_curation(text).unwrap();

        let record = session.store().get_record(turn.record_id).unwrap().unwrap();
        assert_eq!(record.curated_response.as_deref(), Some(text));
    }

    #[tokio::test]
    async fn test_write_faults_still_acked_and_state_advances() {
        let (dir, mut session) = session_with(ScriptedModel::answering("It will rain"));
        let turn = session.submit_prompt("weather today").await.unwrap();

        // Database file replaced by a directory: every later open fails
        let path = dir.path().join("s.db");
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let ack = session.give_feedback(turn.record_id, false);
        assert_eq!(ack.status, WriteStatus::Failed);
        assert_eq!(
            session.state(),
            &CurationState::AwaitingCuration {
                record_id: turn.record_id,
                original_prompt: "weather today".to_string(),
            }
        );

        let ack = session.submit_curation("It's sunny, 20°C").unwrap();
        assert_eq!(ack.status, WriteStatus::Failed);
        assert_eq!(ack.record_id, turn.record_id);
        assert_eq!(session.state(), &CurationState::Idle);
    }

    #[test]
    fn test_feedback_on_unknown_record_still_acked() {
        let (_dir, mut session) = session_with(ScriptedModel::answering("x"));
        let ack = session.give_feedback(42, false);
        assert_eq!(ack.status, WriteStatus::NoSuchRecord);
        assert_eq!(
            session.state(),
            &CurationState::AwaitingCuration {
                record_id: 42,
                original_prompt: String::new(),
            }
        );
    }

    #[tokio::test]
    async fn test_prompt_falls_back_to_store() {
        let (_dir, mut session) = session_with(ScriptedModel::answering("x"));
        let id = session
            .store()
            .create_record(Utc::now(), "from another session", "y")
            .unwrap();

        session.give_feedback(id, false);
        assert_eq!(
            session.state(),
            &CurationState::AwaitingCuration {
                record_id: id,
                original_prompt: "from another session".to_string(),
            }
        );
    }
}
