//! Chat Curator - local LLM chat assistant library
//!
//! A small assistant with:
//! - Ollama chat integration for a locally hosted model
//! - SQLite history of every prompt/response exchange
//! - Thumbs up/down feedback and human-curated corrections
//! - Reuse of approved or curated answers for similar new prompts
//!
//! # Example
//!
//! ```ignore
//! use chat_curator::{agent, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut session = agent::build_session(&Config::default())?;
//!     let turn = session.submit_prompt("What is the capital of France?").await?;
//!     session.give_feedback(turn.record_id, true);
//!     Ok(())
//! }
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod types;
pub mod memory;  // Must come before agent since agent depends on memory
pub mod agent;
pub mod config;
pub mod cli;

// Re-export commonly used types for convenience
pub use agent::{
    llm::{ChatMessage, ChatModel, ModelError, OllamaClient, ProviderConfig},
    responder::Responder,
    session::{CurationState, Session, TurnOutcome, WriteStatus},
};

pub use memory::{
    Feedback,
    InteractionRecord,
    InteractionStore,
    StoreStats,
};

pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
