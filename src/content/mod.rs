//! Debate topics and end-of-debate feedback.
//!
//! The room layer only talks to `ContentProvider`; the template provider is
//! always available, the LLM provider is layered on top when a model is
//! configured.

mod templates;

use crate::llm::{GenerateRequest, LlmConfig, LlmManager};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use templates::{TemplateContentProvider, FALLBACK_TOPIC};

#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Pick a debate topic from the selected categories
    async fn generate_topic(&self, categories: &[String]) -> String;

    /// Write feedback on a finished debate from its topic and the participants' notes
    async fn generate_feedback(&self, topic: &str, notes: &str) -> String;

    fn name(&self) -> &str;
}

const FEEDBACK_SYSTEM_PROMPT: &str = "You are an experienced debate coach. \
    Write one short paragraph (three to four sentences) of feedback on the debate described below. \
    Mention what worked, what lacked evidence, and one concrete suggestion for the next debate. \
    Address the participants as a group. No bullet points, no headings.";

/// Feedback from a language model, topics from the template bank
pub struct LlmContentProvider {
    manager: LlmManager,
    templates: TemplateContentProvider,
    timeout: Duration,
    max_tokens: u32,
}

impl LlmContentProvider {
    pub fn new(manager: LlmManager, config: &LlmConfig) -> Self {
        Self {
            manager,
            templates: TemplateContentProvider,
            timeout: config.default_timeout,
            max_tokens: config.default_max_tokens,
        }
    }
}

#[async_trait]
impl ContentProvider for LlmContentProvider {
    async fn generate_topic(&self, categories: &[String]) -> String {
        self.templates.generate_topic(categories).await
    }

    async fn generate_feedback(&self, topic: &str, notes: &str) -> String {
        let prompt = if notes.trim().is_empty() {
            format!("Debate topic: {}", topic)
        } else {
            format!("Debate topic: {}\n\nParticipant notes:\n{}", topic, notes.trim())
        };

        let request = GenerateRequest {
            system: FEEDBACK_SYSTEM_PROMPT.to_string(),
            prompt,
            max_tokens: Some(self.max_tokens),
            timeout: self.timeout,
        };

        match self.manager.generate_first(request).await {
            Ok(response) => response.text,
            Err(e) => {
                tracing::warn!("AI feedback failed: {}, using template feedback", e);
                self.templates.generate_feedback(topic, notes).await
            }
        }
    }

    fn name(&self) -> &str {
        "llm"
    }
}

/// Pick the content provider for the configured LLM setup
pub fn build_provider(config: &LlmConfig) -> Arc<dyn ContentProvider> {
    match config.build_manager() {
        Ok(manager) => {
            tracing::info!("LLM providers initialized, AI feedback enabled");
            Arc::new(LlmContentProvider::new(manager, config))
        }
        Err(e) => {
            tracing::warn!("{}. Debate feedback will use templates.", e);
            Arc::new(TemplateContentProvider)
        }
    }
}
