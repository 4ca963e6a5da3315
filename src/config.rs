//! Explicitly constructed configuration.
//!
//! Nothing here reads global state; callers build these values and hand
//! them to the components, so tests and multiple configurations coexist.

use std::time::Duration;

/// Default provider endpoint (OpenRouter-compatible chat completions).
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Connection settings for [`crate::llm::CompletionClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bearer credential for the provider.
    pub api_key: String,
    /// API root; `/chat/completions` is appended per call.
    pub base_url: String,
    /// Sent as `HTTP-Referer`; the provider uses it for attribution.
    pub referer: String,
    /// Sent as `X-Title`.
    pub app_title: String,
    /// Per-call deadline enforced by the HTTP client.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            referer: "https://github.com/flashgen".to_string(),
            app_title: "flashgen".to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Settings for [`crate::generate::FlashcardGenerator`].
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Provider model identifier.
    pub model: String,
    /// Total attempts in the retry loop, including the first.
    pub max_retries: u32,
    /// A batch with fewer usable items than this counts as a failed attempt.
    pub min_suggestions: usize,
    /// Upper bound declared in the schema sent to the model.
    pub max_suggestions: usize,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: "openai/gpt-4".to_string(),
            max_retries: 3,
            min_suggestions: 3,
            max_suggestions: 10,
            temperature: Some(0.7),
            max_tokens: Some(2000),
        }
    }
}

impl GeneratorConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Fixed-window budget for [`crate::limiter::RateLimiter`].
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    /// 10 requests per 10 minutes per identity.
    fn default() -> Self {
        Self {
            window: Duration::from_secs(10 * 60),
            max_requests: 10,
        }
    }
}
