//! OpenAI Chat Completions streaming client.
//!
//! Sends `POST /v1/chat/completions` with `"stream": true` and reassembles
//! the `data:` lines of the response into [`ChatCompletionChunk`]s.
//! See: <https://platform.openai.com/docs/api-reference/chat/create>

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use tracing::debug;

use crate::client::{ClientError, StreamingClient};
use crate::decode::JsonDecoder;
use crate::http::{add_extra_headers, ReqwestTransport};
use crate::model::{ChatCompletionChunk, ChatMessage};
use crate::options::{HttpTransport, ModelOptions, OpenAiModel, TransportOptions};
use crate::session::{EventStream, SseSession};

const DEFAULT_API_BASE: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// OpenAI client using HTTP transport.
pub struct OpenAiClient {
    model_options: ModelOptions<OpenAiModel>,
    transport_options: TransportOptions<HttpTransport>,
}

impl OpenAiClient {
    fn build_request(
        transport: &ReqwestTransport,
        messages: Vec<ChatMessage>,
        model_options: &ModelOptions<OpenAiModel>,
        transport_options: &TransportOptions<HttpTransport>,
    ) -> Result<reqwest::Request, ClientError> {
        // Validate API key is present
        let api_key = transport_options
            .provider
            .api_key
            .as_ref()
            .ok_or_else(|| ClientError::Config("API key is required".to_string()))?;

        let api_base = transport_options
            .provider
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/');

        let url = format!("{}/v1/chat/completions", api_base);
        let request_body = OpenAiRequest::from((messages, model_options));
        debug!(url = %url, model = %request_body.model, "building chat completion stream request");

        let req = transport
            .client()
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", api_key.expose_secret()))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream");

        let req = add_extra_headers(req, &transport_options.provider.extra_headers);

        Ok(req.json(&request_body).build()?)
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new(
            ModelOptions::new(OpenAiModel::default()).with_model(DEFAULT_MODEL.to_string()),
            TransportOptions::new(HttpTransport::default()),
        )
    }
}

impl StreamingClient for OpenAiClient {
    type ModelProvider = OpenAiModel;
    type TransportProvider = HttpTransport;

    fn new(
        model_options: ModelOptions<Self::ModelProvider>,
        transport_options: TransportOptions<Self::TransportProvider>,
    ) -> Self {
        Self {
            model_options,
            transport_options,
        }
    }

    fn model_options(&self) -> &ModelOptions<Self::ModelProvider> {
        &self.model_options
    }

    fn transport_options(&self) -> &TransportOptions<Self::TransportProvider> {
        &self.transport_options
    }

    fn request_stream(
        messages: Vec<ChatMessage>,
        model_options: &ModelOptions<Self::ModelProvider>,
        transport_options: &TransportOptions<Self::TransportProvider>,
    ) -> Result<EventStream<ChatCompletionChunk>, ClientError> {
        let transport = ReqwestTransport::from_options(transport_options)?;
        let request = Self::build_request(&transport, messages, model_options, transport_options)?;

        let mut session = SseSession::new(transport, JsonDecoder::<ChatCompletionChunk>::new())
            .with_options(transport_options.stream);
        Ok(session.connect(request))
    }
}

impl From<(Vec<ChatMessage>, &ModelOptions<OpenAiModel>)> for OpenAiRequest {
    fn from((messages, model_options): (Vec<ChatMessage>, &ModelOptions<OpenAiModel>)) -> Self {
        let messages = model_options
            .instructions
            .iter()
            .map(|instructions| ChatMessage::system(instructions.as_str()))
            .chain(messages)
            .collect();

        OpenAiRequest {
            model: model_options
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            messages,
            stream: true,
            temperature: model_options.temperature,
            top_p: model_options.top_p,
            max_tokens: model_options.max_tokens,
            frequency_penalty: model_options.provider.frequency_penalty,
            presence_penalty: model_options.provider.presence_penalty,
            user: model_options.provider.user.clone(),
        }
    }
}

// --- OpenAI API Request Types ---

#[derive(Debug, Clone, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use serde_json::json;

    #[test]
    fn test_request_body_prepends_instructions() {
        let options = ModelOptions::new(OpenAiModel {
            user: Some("user-1".to_string()),
            ..Default::default()
        })
        .with_instructions("Be brief.".to_string())
        .with_max_tokens(64);

        let body = OpenAiRequest::from((vec![ChatMessage::user("Hello!")], &options));
        assert_eq!(body.messages[0].role, Role::System);

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gpt-3.5-turbo",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Hello!"}
                ],
                "stream": true,
                "max_tokens": 64,
                "user": "user-1"
            })
        );
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let client = OpenAiClient::default();
        let transport = ReqwestTransport::default();
        let result = OpenAiClient::build_request(
            &transport,
            vec![ChatMessage::user("Hi")],
            client.model_options(),
            client.transport_options(),
        );
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_request_targets_chat_completions() {
        let transport_options = TransportOptions::new(
            HttpTransport::new("sk-test").with_base_url("http://localhost:8080/".to_string()),
        );
        let request = OpenAiClient::build_request(
            &ReqwestTransport::default(),
            vec![ChatMessage::user("Hi")],
            &ModelOptions::new(OpenAiModel::default()),
            &transport_options,
        )
        .unwrap();

        assert_eq!(request.url().as_str(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer sk-test");
        assert_eq!(request.headers()[ACCEPT], "text/event-stream");
    }
}
