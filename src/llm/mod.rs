//! Completion provider integration: wire types, HTTP client, and
//! defensive response parsing.

pub mod client;
pub mod parse;
pub mod prompts;

pub use client::{CompletionClient, CompletionRequest, StructuredRequest};

use serde::{Deserialize, Serialize};

/// One chat message on the provider wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}
