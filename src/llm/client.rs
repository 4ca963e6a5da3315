//! HTTP client for the provider's chat-completion endpoint.
//!
//! One HTTPS POST per call, no retries here; the orchestrator owns the
//! retry loop. Non-success statuses map onto the error taxonomy so the
//! loop can classify without looking at strings. Each call takes a
//! caller-owned cancellation token.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{parse, prompts, Message};
use crate::config::ClientConfig;
use crate::error::LlmError;

/// Sampling temperature used when the caller does not override it.
const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Completion budget used when the caller does not override it.
const DEFAULT_MAX_TOKENS: u32 = 1000;

/// A plain text completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>, model: impl Into<String>) -> Self {
        Self {
            messages,
            model: model.into(),
            system_prompt: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// A completion call whose reply must be JSON matching `schema`.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub completion: CompletionRequest,
    pub schema: Value,
    /// Name used in logs only; the provider never sees it.
    pub schema_name: String,
    /// Whether the caller expects a top-level JSON array.
    pub expect_array: bool,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    error: Option<ProviderErrorDetail>,
}

#[derive(Deserialize)]
struct ProviderErrorDetail {
    message: Option<String>,
    details: Option<Value>,
}

/// Client over an OpenRouter-compatible chat endpoint. Explicitly
/// constructed with its own configuration; no shared global state.
pub struct CompletionClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl CompletionClient {
    pub fn new(config: ClientConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;
        Ok(Self { config, http })
    }

    /// Get a plain text completion.
    pub async fn get_completion(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        let messages = build_messages(request, None);
        self.send(request, &messages, cancel).await
    }

    /// Get a completion parsed into `T`, with the JSON contract pinned to
    /// both the system message and the trailing user message.
    pub async fn get_structured_completion<T: DeserializeOwned>(
        &self,
        request: &StructuredRequest,
        cancel: &CancellationToken,
    ) -> Result<T, LlmError> {
        debug!(schema = %request.schema_name, "requesting structured completion");
        let messages = build_messages(&request.completion, Some(&request.schema));
        let content = self.send(&request.completion, &messages, cancel).await?;
        parse::parse_json(&content, request.expect_array)
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &request.model,
            messages,
            temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        };
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        debug!(model = %request.model, "sending completion request");

        let pending = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.app_title)
            .json(&body)
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            result = pending => result.map_err(map_transport_error)?,
        };

        let status = response.status();
        let text = tokio::select! {
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            result = response.text() => result.map_err(map_transport_error)?,
        };

        if !status.is_success() {
            return Err(map_status_error(status, &text));
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| LlmError::Server {
            status: status.as_u16(),
            message: format!("unexpected provider response body: {e}"),
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)?;
        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(content)
    }
}

/// Prepend the system prompt; for structured calls, append the schema
/// instructions to the system message (creating one if absent) and the
/// array reminder to the last user message.
fn build_messages(request: &CompletionRequest, schema: Option<&Value>) -> Vec<Message> {
    let mut messages = request.messages.clone();
    if let Some(system_prompt) = &request.system_prompt {
        messages.insert(0, Message::system(system_prompt.clone()));
    }

    if let Some(schema) = schema {
        let instructions = prompts::schema_instructions(schema);
        match messages.iter_mut().find(|m| m.role == "system") {
            Some(system) => system.content.push_str(&instructions),
            None => messages.insert(
                0,
                Message::system(format!(
                    "You are a helpful assistant that responds only in JSON format.{instructions}"
                )),
            ),
        }
        if let Some(user) = messages.iter_mut().rev().find(|m| m.role == "user") {
            user.content.push_str(prompts::JSON_ARRAY_REMINDER);
        }
    }

    messages
}

fn map_transport_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Network(err.to_string())
    }
}

/// Map a non-success provider status onto the taxonomy.
fn map_status_error(status: StatusCode, body: &str) -> LlmError {
    let (message, details) = provider_error_detail(status, body);
    match status.as_u16() {
        401 => LlmError::Authentication(message),
        429 => LlmError::RateLimit(message),
        400 => LlmError::InvalidRequest { message, details },
        _ => LlmError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

fn provider_error_detail(status: StatusCode, body: &str) -> (String, Option<Value>) {
    if let Ok(parsed) = serde_json::from_str::<ProviderErrorBody>(body) {
        if let Some(error) = parsed.error {
            let message = error
                .message
                .unwrap_or_else(|| format!("API request failed with status {status}"));
            return (message, error.details);
        }
    }
    (
        format!("API request failed with status {status}"),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_system() -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::user("source text")],
            model: "openai/gpt-4".to_string(),
            system_prompt: Some("Generate flashcards.".to_string()),
            temperature: None,
            max_tokens: None,
        }
    }

    #[test]
    fn system_prompt_is_prepended() {
        let messages = build_messages(&request_with_system(), None);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "Generate flashcards.");
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn structured_call_pins_contract_to_both_ends() {
        let schema = prompts::suggestion_schema(3, 10);
        let messages = build_messages(&request_with_system(), Some(&schema));
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.starts_with("Generate flashcards."));
        assert!(messages[0].content.contains("matching this schema"));
        assert!(messages[1]
            .content
            .ends_with("Do not include schema description."));
    }

    #[test]
    fn structured_call_without_system_prompt_creates_one() {
        let request = CompletionRequest::new(vec![Message::user("text")], "openai/gpt-4");
        let schema = prompts::suggestion_schema(3, 10);
        let messages = build_messages(&request, Some(&schema));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0]
            .content
            .starts_with("You are a helpful assistant that responds only in JSON format."));
    }

    #[test]
    fn wire_body_uses_defaults_when_not_overridden() {
        let request = request_with_system();
        let messages = build_messages(&request, None);
        let body = ChatRequest {
            model: &request.model,
            messages: &messages,
            temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "openai/gpt-4");
        assert_eq!(value["temperature"], 0.7);
        assert_eq!(value["max_tokens"], 1000);
        assert_eq!(value["messages"][0]["role"], "system");
    }

    #[test]
    fn status_codes_map_onto_the_taxonomy() {
        let body = r#"{"error":{"message":"no credit"}}"#;
        assert!(matches!(
            map_status_error(StatusCode::UNAUTHORIZED, body),
            LlmError::Authentication(_)
        ));
        assert!(matches!(
            map_status_error(StatusCode::TOO_MANY_REQUESTS, body),
            LlmError::RateLimit(_)
        ));
        assert!(matches!(
            map_status_error(StatusCode::BAD_REQUEST, body),
            LlmError::InvalidRequest { .. }
        ));
        assert!(matches!(
            map_status_error(StatusCode::INTERNAL_SERVER_ERROR, body),
            LlmError::Server { status: 500, .. }
        ));
        assert!(matches!(
            map_status_error(StatusCode::BAD_GATEWAY, body),
            LlmError::Server { status: 502, .. }
        ));
    }

    #[test]
    fn provider_message_and_details_are_carried() {
        let body = r#"{"error":{"message":"model not found","details":{"param":"model"}}}"#;
        match map_status_error(StatusCode::BAD_REQUEST, body) {
            LlmError::InvalidRequest { message, details } => {
                assert_eq!(message, "model not found");
                assert_eq!(details.unwrap()["param"], "model");
            }
            other => panic!("expected InvalidRequest, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_error_body_falls_back_to_status_text() {
        match map_status_error(StatusCode::UNAUTHORIZED, "<html>nope</html>") {
            LlmError::Authentication(message) => {
                assert!(message.contains("401"));
            }
            other => panic!("expected Authentication, got {other:?}"),
        }
    }
}
