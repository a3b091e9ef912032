//! Wire models for chat completion requests and streamed deltas.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of the message sender.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// One streamed chunk of a chat completion.
///
/// The wire form looks like:
/// ```text
/// {"id":"chatcmpl-6yVT...","object":"chat.completion.chunk","created":1679878715,
///  "model":"gpt-3.5-turbo-0301","choices":[{"delta":{"content":"Once"},"index":0,"finish_reason":null}]}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,

    /// Token usage, sent on the final chunk by some deployments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatCompletionChunk {
    /// Concatenated content deltas of every choice in this chunk.
    pub fn text(&self) -> String {
        self.choices
            .iter()
            .filter_map(|choice| choice.delta.content.as_deref())
            .join("")
    }

    /// First finish reason reported by any choice.
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices
            .iter()
            .find_map(|choice| choice.finish_reason.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkChoice {
    pub delta: Delta,
    pub index: u32,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental message content.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Token usage information.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Error envelope returned by the API in place of a delta.
///
/// ```text
/// {"error": {"message": "Rate limit reached ...", "type": "requests", "param": null, "code": null}}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiErrorEnvelope {
    pub error: ApiError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub param: Option<Value>,
    #[serde(default)]
    pub code: Option<Value>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_type {
            Some(kind) => write!(f, "{} ({})", self.message, kind),
            None => f.write_str(&self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_and_finish_reason() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"id":"chatcmpl-1","object":"chat.completion.chunk","created":1679878715,
                "model":"gpt-3.5-turbo-0301",
                "choices":[{"delta":{"content":"Once"},"index":0,"finish_reason":null},
                           {"delta":{"content":" upon"},"index":1,"finish_reason":"stop"}]}"#,
        )
        .unwrap();

        assert_eq!(chunk.text(), "Once upon");
        assert_eq!(chunk.finish_reason(), Some("stop"));
        assert!(chunk.usage.is_none());
    }

    #[test]
    fn test_role_only_delta() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"id":"c","object":"chat.completion.chunk","created":1,"model":"m",
                "choices":[{"delta":{"role":"assistant"},"index":0}]}"#,
        )
        .unwrap();

        assert_eq!(chunk.choices[0].delta.role, Some(Role::Assistant));
        assert_eq!(chunk.text(), "");
        assert_eq!(chunk.finish_reason(), None);
    }

    #[test]
    fn test_api_error_display() {
        let envelope: ApiErrorEnvelope = serde_json::from_str(
            r#"{"error":{"message":"Rate limit reached","type":"requests","param":null,"code":null}}"#,
        )
        .unwrap();

        assert_eq!(envelope.error.to_string(), "Rate limit reached (requests)");
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_string(&ChatMessage::user("Hello!")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"Hello!"}"#);
    }
}
