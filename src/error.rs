//! Failure taxonomy for the generation pipeline.
//!
//! Every provider interaction resolves to one `LlmError` variant so the
//! retry loop can match on failure kind instead of inspecting strings.

use std::time::Instant;

use thiserror::Error;

/// Stable codes surfaced to callers and written to the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Llm,
    RateLimitExceeded,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Authentication => "AUTHENTICATION_ERROR",
            ErrorCode::RateLimit => "RATE_LIMIT_ERROR",
            ErrorCode::Network => "NETWORK_ERROR",
            ErrorCode::Timeout => "TIMEOUT_ERROR",
            ErrorCode::Llm => "LLM_ERROR",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed interaction with the completion provider.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// Invalid or missing credential (HTTP 401). Fatal.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Provider-side throttling (HTTP 429). Retryable.
    #[error("provider rate limit: {0}")]
    RateLimit(String),
    /// Malformed request (HTTP 400), with provider-supplied detail. Fatal.
    #[error("invalid request: {message}")]
    InvalidRequest {
        message: String,
        details: Option<serde_json::Value>,
    },
    /// Provider 5xx or other unexpected status. Retryable.
    #[error("provider error ({status}): {message}")]
    Server { status: u16, message: String },
    /// Transport-level failure. Retryable.
    #[error("network error: {0}")]
    Network(String),
    /// The per-call deadline elapsed. Fatal for the current call.
    #[error("request timed out")]
    Timeout,
    /// The caller's cancellation token fired. Fatal for the current call.
    #[error("request cancelled")]
    Cancelled,
    /// Model output could not be recovered as JSON. Retryable.
    #[error("model output is not valid JSON: {0}")]
    JsonParsing(String),
    /// Parsed JSON lacks the required shape or minimum item count. Retryable.
    #[error("model output has the wrong shape: {0}")]
    Shape(String),
    /// The provider returned no choices or empty content. Retryable.
    #[error("provider returned no completion")]
    EmptyResponse,
}

impl LlmError {
    /// Failures that end the retry loop immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LlmError::Authentication(_)
                | LlmError::InvalidRequest { .. }
                | LlmError::Timeout
                | LlmError::Cancelled
        )
    }

    /// Provider-side pressure; these get the longer backoff cap.
    pub fn is_provider_throttle(&self) -> bool {
        matches!(self, LlmError::RateLimit(_) | LlmError::Server { .. })
    }

    /// Stable code for the audit log and terminal failures.
    pub fn code(&self) -> ErrorCode {
        match self {
            LlmError::Authentication(_) => ErrorCode::Authentication,
            LlmError::RateLimit(_) => ErrorCode::RateLimit,
            LlmError::Network(_) => ErrorCode::Network,
            LlmError::Timeout | LlmError::Cancelled => ErrorCode::Timeout,
            LlmError::InvalidRequest { .. }
            | LlmError::Server { .. }
            | LlmError::JsonParsing(_)
            | LlmError::Shape(_)
            | LlmError::EmptyResponse => ErrorCode::Llm,
        }
    }
}

/// Terminal outcome of a generation call.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The caller's request budget is spent; retry after `reset_at`.
    #[error("request budget exhausted for this identity")]
    RateLimited { reset_at: Instant },
    /// The provider interaction failed after the retry loop gave up.
    #[error("{code}: {message}")]
    Llm {
        code: ErrorCode,
        message: String,
        #[source]
        source: LlmError,
    },
    /// Persisting the generation record failed.
    #[error("failed to persist generation record")]
    Storage(#[source] anyhow::Error),
}

impl GenerateError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            GenerateError::RateLimited { .. } => Some(ErrorCode::RateLimitExceeded),
            GenerateError::Llm { code, .. } => Some(*code),
            GenerateError::Storage(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_variants_end_the_retry_loop() {
        assert!(LlmError::Authentication("bad key".into()).is_fatal());
        assert!(LlmError::Timeout.is_fatal());
        assert!(LlmError::Cancelled.is_fatal());
        assert!(LlmError::InvalidRequest {
            message: "bad model".into(),
            details: None,
        }
        .is_fatal());
        assert!(!LlmError::RateLimit("slow down".into()).is_fatal());
        assert!(!LlmError::JsonParsing("eof".into()).is_fatal());
    }

    #[test]
    fn throttle_variants_get_the_longer_backoff() {
        assert!(LlmError::RateLimit("slow down".into()).is_provider_throttle());
        assert!(LlmError::Server {
            status: 503,
            message: "unavailable".into(),
        }
        .is_provider_throttle());
        assert!(!LlmError::Network("reset".into()).is_provider_throttle());
    }

    #[test]
    fn stable_codes_cover_the_taxonomy() {
        assert_eq!(
            LlmError::Authentication("x".into()).code().as_str(),
            "AUTHENTICATION_ERROR"
        );
        assert_eq!(LlmError::Cancelled.code().as_str(), "TIMEOUT_ERROR");
        assert_eq!(
            LlmError::Shape("not an array".into()).code().as_str(),
            "LLM_ERROR"
        );
        assert_eq!(LlmError::Network("x".into()).code().as_str(), "NETWORK_ERROR");
    }
}
