//! Suggestion sources.
//!
//! The orchestrator pulls suggestion batches through this seam. The
//! live source talks to the completion provider; the fixture source
//! returns a canned batch for development and tests. Which one runs is
//! an explicit construction-time choice — a live failure is never
//! silently replaced by the fixture.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::GeneratorConfig;
use crate::error::LlmError;
use crate::llm::{prompts, CompletionClient, CompletionRequest, Message, StructuredRequest};
use crate::store::Suggestion;

/// Provider of candidate flashcard batches.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn fetch_suggestions(
        &self,
        source_text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Suggestion>, LlmError>;
}

/// Live source backed by the completion provider.
pub struct LiveSuggestionSource {
    client: CompletionClient,
    config: GeneratorConfig,
}

impl LiveSuggestionSource {
    pub fn new(client: CompletionClient, config: GeneratorConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl SuggestionSource for LiveSuggestionSource {
    async fn fetch_suggestions(
        &self,
        source_text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Suggestion>, LlmError> {
        let request = StructuredRequest {
            completion: CompletionRequest {
                messages: vec![Message::user(source_text)],
                model: self.config.model.clone(),
                system_prompt: Some(prompts::flashcard_system_prompt(
                    self.config.min_suggestions,
                    self.config.max_suggestions,
                )),
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            },
            schema: prompts::suggestion_schema(
                self.config.min_suggestions,
                self.config.max_suggestions,
            ),
            schema_name: "flashcard_suggestions".to_string(),
            expect_array: true,
        };
        self.client.get_structured_completion(&request, cancel).await
    }
}

/// Fixed-batch source for development setups.
pub struct FixtureSuggestionSource {
    suggestions: Vec<Suggestion>,
}

impl FixtureSuggestionSource {
    pub fn new(suggestions: Vec<Suggestion>) -> Self {
        Self { suggestions }
    }

    /// A small built-in batch, enough to exercise the acceptance flow.
    pub fn sample() -> Self {
        Self::new(vec![
            Suggestion::new(
                "When and by whom was JavaScript created?",
                "JavaScript was created by Brendan Eich in 1995 while he worked at Netscape Communications Corporation.",
            ),
            Suggestion::new(
                "Which programming paradigms does JavaScript support?",
                "JavaScript supports object-oriented, functional, and imperative programming.",
            ),
            Suggestion::new(
                "What is Node.js and how did it change JavaScript?",
                "Node.js, introduced in 2009, runs JavaScript outside the browser and enabled efficient server-side applications.",
            ),
            Suggestion::new(
                "How is JavaScript typed?",
                "JavaScript is dynamically typed: variable types are determined at runtime.",
            ),
            Suggestion::new(
                "What is NPM and what role does it play?",
                "NPM (Node Package Manager) is the world's largest software registry, hosting millions of JavaScript packages.",
            ),
        ])
    }
}

#[async_trait]
impl SuggestionSource for FixtureSuggestionSource {
    async fn fetch_suggestions(
        &self,
        _source_text: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Suggestion>, LlmError> {
        Ok(self.suggestions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_source_returns_its_batch_unchanged() {
        let source = FixtureSuggestionSource::sample();
        let batch = source
            .fetch_suggestions("anything", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(batch.len(), 5);
        assert!(batch.iter().all(|s| !s.front.is_empty() && !s.back.is_empty()));
    }
}
