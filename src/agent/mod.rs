//! Agent module - model calls, session state and the chat loop

pub mod conversation;
pub mod llm;
pub mod responder;
pub mod session;
pub mod interactive;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::memory::InteractionStore;
use llm::{OllamaClient, ProviderConfig};
use responder::Responder;
use session::Session;

/// Open the store described by the config. Fatal if the schema cannot be
/// created.
pub fn open_store(config: &Config) -> Result<InteractionStore> {
    let path = config.store.resolved_path()?;
    InteractionStore::open(&path)
        .with_context(|| format!("Failed to initialize history database at {}", path.display()))
}

/// Build the model-backed responder described by the config
pub fn build_responder(config: &Config) -> Result<Responder> {
    let client = OllamaClient::with_provider(ProviderConfig::from_config(&config.model))
        .context("Failed to create model client")?;
    Ok(Responder::new(Arc::new(client), config.model.name.clone())
        .with_context_label(config.model.context_label.clone()))
}

/// Wire store and responder into a fresh session
pub fn build_session(config: &Config) -> Result<Session> {
    let store = open_store(config)?;
    let responder = build_responder(config)?;
    Ok(Session::new(store, responder).with_threshold(config.matcher.threshold))
}

/// Start the interactive chat
pub async fn start_chat(config: &Config) -> Result<()> {
    let session = build_session(config)?;
    tracing::info!(
        "Chat session using {} at {} (history: {})",
        config.model.name,
        config.model.host,
        session.store().path().display()
    );
    interactive::run_interactive(session).await
}
