//! Generation orchestration.
//!
//! Composes the rate limiter, a suggestion source, and the store into
//! one call: check the caller's budget, pull a suggestion batch with
//! bounded retry and exponential backoff, validate it, then persist a
//! provenance record — or a best-effort audit entry on failure. A call
//! either yields a complete batch meeting the minimum item count or a
//! single terminal error with a stable code; there is no partial
//! success.

pub mod source;

pub use source::{FixtureSuggestionSource, LiveSuggestionSource, SuggestionSource};

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::GeneratorConfig;
use crate::error::{GenerateError, LlmError};
use crate::limiter::RateLimiter;
use crate::store::{
    AcceptedSuggestion, CardSource, ErrorAuditLog, ErrorLogEntry, Flashcard, GenerationRecord,
    GenerationStore, Suggestion,
};

/// Longest wait between attempts after provider throttling or a 5xx.
const THROTTLE_BACKOFF_CAP: Duration = Duration::from_secs(10);
/// Longest wait between attempts after any other retryable failure.
const GENERAL_BACKOFF_CAP: Duration = Duration::from_secs(5);

/// One generation call. Length bounds on the source text are the
/// caller's responsibility; the identity is only used for budgeting.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub source_text: String,
    pub identity: String,
}

/// Everything a successful call produces.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub suggestions: Vec<Suggestion>,
    pub record: GenerationRecord,
}

/// The pipeline entry point collaborators call into.
pub struct FlashcardGenerator {
    config: GeneratorConfig,
    source: Arc<dyn SuggestionSource>,
    store: Arc<dyn GenerationStore>,
    audit: ErrorAuditLog,
    limiter: Arc<RateLimiter>,
}

impl FlashcardGenerator {
    pub fn new(
        config: GeneratorConfig,
        source: Arc<dyn SuggestionSource>,
        store: Arc<dyn GenerationStore>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let audit = ErrorAuditLog::new(store.clone());
        Self {
            config,
            source,
            store,
            audit,
            limiter,
        }
    }

    /// Generate a validated suggestion batch and persist its provenance.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome, GenerateError> {
        let decision = self.limiter.check_and_consume(&request.identity);
        if !decision.allowed {
            return Err(GenerateError::RateLimited {
                reset_at: decision.reset_at,
            });
        }

        let started = Instant::now();
        match self.fetch_with_retries(&request.source_text, cancel).await {
            Ok(suggestions) => {
                let now = Utc::now();
                let record = GenerationRecord {
                    id: Uuid::new_v4(),
                    model: self.config.model.clone(),
                    generated_count: suggestions.len() as u32,
                    accepted_edited_count: 0,
                    accepted_unedited_count: 0,
                    source_text_hash: source_text_hash(&request.source_text),
                    source_text_length: request.source_text.chars().count() as u32,
                    duration_ms: started.elapsed().as_millis() as u64,
                    created_at: now,
                    updated_at: now,
                };
                self.store
                    .insert_generation(record.clone())
                    .await
                    .map_err(GenerateError::Storage)?;
                Ok(GenerationOutcome {
                    suggestions,
                    record,
                })
            }
            Err(err) => {
                let code = err.code();
                self.audit
                    .record(ErrorLogEntry {
                        source_text_hash: source_text_hash(&request.source_text),
                        source_text_length: request.source_text.chars().count() as u32,
                        model: self.config.model.clone(),
                        error_code: code.as_str().to_string(),
                        error_message: err.to_string(),
                        created_at: Utc::now(),
                    })
                    .await;
                Err(GenerateError::Llm {
                    code,
                    message: err.to_string(),
                    source: err,
                })
            }
        }
    }

    async fn fetch_with_retries(
        &self,
        source_text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Suggestion>, LlmError> {
        let mut last_error: Option<LlmError> = None;

        for attempt in 1..=self.config.max_retries {
            match self.source.fetch_suggestions(source_text, cancel).await {
                Ok(batch) => {
                    let total = batch.len();
                    let valid: Vec<Suggestion> = batch
                        .into_iter()
                        .filter(|s| !s.front.trim().is_empty() && !s.back.trim().is_empty())
                        .collect();
                    if valid.len() >= self.config.min_suggestions {
                        debug!(attempt, count = valid.len(), "generation attempt succeeded");
                        return Ok(valid);
                    }
                    last_error = Some(LlmError::Shape(format!(
                        "only {} of {} suggestions were usable, need at least {}",
                        valid.len(),
                        total,
                        self.config.min_suggestions
                    )));
                }
                Err(err) if err.is_fatal() => {
                    warn!(attempt, error = %err, "fatal provider error, giving up");
                    return Err(err);
                }
                Err(err) => {
                    last_error = Some(err);
                }
            }

            if attempt < self.config.max_retries {
                let delay = backoff_delay(attempt, last_error.as_ref());
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                    "generation attempt failed, backing off"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        Err(last_error.unwrap_or(LlmError::EmptyResponse))
    }

    /// Persist accepted suggestions as flashcards and overwrite the
    /// generation's acceptance counters. Counters are replaced, not
    /// accumulated: accepting the same generation in two batches keeps
    /// only the second batch's counts.
    pub async fn accept_suggestions(
        &self,
        generation_id: Uuid,
        accepted: Vec<AcceptedSuggestion>,
    ) -> anyhow::Result<Vec<Flashcard>> {
        anyhow::ensure!(!accepted.is_empty(), "at least one suggestion must be accepted");

        let edited = accepted.iter().filter(|s| s.edited).count() as u32;
        let unedited = accepted.len() as u32 - edited;
        let now = Utc::now();

        let cards: Vec<Flashcard> = accepted
            .into_iter()
            .map(|s| Flashcard {
                id: Uuid::new_v4(),
                front: s.front,
                back: s.back,
                source: if s.edited {
                    CardSource::AiEdited
                } else {
                    CardSource::AiFull
                },
                generation_id,
                created_at: now,
                updated_at: now,
            })
            .collect();

        let saved = self.store.insert_flashcards(cards).await?;
        self.store
            .set_acceptance_counts(generation_id, edited, unedited)
            .await?;
        Ok(saved)
    }
}

/// `min(2^attempt seconds, cap)`; provider throttling gets the longer cap.
fn backoff_delay(attempt: u32, error: Option<&LlmError>) -> Duration {
    let cap = if error.is_some_and(|e| e.is_provider_throttle()) {
        THROTTLE_BACKOFF_CAP
    } else {
        GENERAL_BACKOFF_CAP
    };
    Duration::from_millis(1000u64 << attempt.min(10)).min(cap)
}

/// Deterministic SHA-256 hex digest of the source text's UTF-8 bytes,
/// used for audit correlation only.
pub fn source_text_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
