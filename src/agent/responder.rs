//! Single-shot answer generation with optional reused context

use std::sync::Arc;

use super::llm::{ChatMessage, ChatModel, ModelError};

/// Wraps the model call and injects an earlier answer as a system hint
#[derive(Clone)]
pub struct Responder {
    model: Arc<dyn ChatModel>,
    model_name: String,
    context_label: String,
}

impl Responder {
    pub fn new(model: Arc<dyn ChatModel>, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            context_label: crate::config::default_context_label(),
        }
    }

    pub fn with_context_label(mut self, label: impl Into<String>) -> Self {
        self.context_label = label.into();
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Messages sent for one turn: optional system hint, then the prompt
    pub fn build_messages(&self, prompt: &str, context: Option<&str>) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ctx) = context {
            messages.push(ChatMessage::system(format!("{}\n\n{}", self.context_label, ctx)));
        }
        messages.push(ChatMessage::user(prompt));
        messages
    }

    /// One request, one answer. No retry.
    pub async fn generate(&self, prompt: &str, context: Option<&str>) -> Result<String, ModelError> {
        let messages = self.build_messages(prompt, context);
        self.model.complete(&self.model_name, messages).await
    }
}
