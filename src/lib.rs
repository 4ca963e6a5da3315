//! AI flashcard generation core.
//!
//! Turns raw study text into validated `{front, back}` suggestions via a
//! chat-completion provider, under an unreliable network, a model that
//! frequently emits non-clean JSON, and a per-identity request budget.
//! Every successful call persists a provenance record; every terminal
//! failure leaves a best-effort audit entry.
//!
//! The pieces compose as: caller -> [`limiter::RateLimiter`] ->
//! [`generate::FlashcardGenerator`] -> ([`llm::CompletionClient`] ->
//! [`llm::parse`]) x bounded retries -> [`store::GenerationStore`].

pub mod config;
pub mod error;
pub mod generate;
pub mod limiter;
pub mod llm;
pub mod store;

pub use config::{ClientConfig, GeneratorConfig, RateLimitConfig};
pub use error::{ErrorCode, GenerateError, LlmError};
pub use generate::{
    source_text_hash, FixtureSuggestionSource, FlashcardGenerator, GenerationOutcome,
    GenerationRequest, LiveSuggestionSource, SuggestionSource,
};
pub use limiter::{RateLimitDecision, RateLimiter};
pub use llm::{CompletionClient, CompletionRequest, Message, StructuredRequest};
pub use store::{
    AcceptedSuggestion, CardSource, ErrorAuditLog, ErrorLogEntry, Flashcard, GenerationRecord,
    GenerationStore, MemoryStore, Suggestion,
};
