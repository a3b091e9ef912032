//! Decoding of reassembled JSON text into stream messages.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::client::DecodeError;
use crate::model::{ApiError, ApiErrorEnvelope};

/// A successfully decoded stream message.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage<T> {
    /// An incremental delta payload.
    Delta(T),
    /// The API reported an error in place of a delta.
    ApiError(ApiError),
}

impl<T> StreamMessage<T> {
    pub fn delta(&self) -> Option<&T> {
        match self {
            StreamMessage::Delta(delta) => Some(delta),
            StreamMessage::ApiError(_) => None,
        }
    }

    pub fn into_delta(self) -> Option<T> {
        match self {
            StreamMessage::Delta(delta) => Some(delta),
            StreamMessage::ApiError(_) => None,
        }
    }
}

/// Turns one complete JSON text into a stream message.
pub trait Decode: Send + Sync + 'static {
    /// The delta payload type.
    type Delta: Send + 'static;

    fn decode(&self, text: &str) -> Result<StreamMessage<Self::Delta>, DecodeError>;
}

impl<D: Decode> Decode for Arc<D> {
    type Delta = D::Delta;

    fn decode(&self, text: &str) -> Result<StreamMessage<Self::Delta>, DecodeError> {
        (**self).decode(text)
    }
}

/// `serde_json` decoder that checks for the API error envelope first and
/// falls back to the delta shape `T`.
pub struct JsonDecoder<T> {
    _delta: PhantomData<fn() -> T>,
}

impl<T> JsonDecoder<T> {
    pub fn new() -> Self {
        Self {
            _delta: PhantomData,
        }
    }
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonDecoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonDecoder")
    }
}

impl<T> Decode for JsonDecoder<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Delta = T;

    fn decode(&self, text: &str) -> Result<StreamMessage<T>, DecodeError> {
        if let Ok(envelope) = serde_json::from_str::<ApiErrorEnvelope>(text) {
            return Ok(StreamMessage::ApiError(envelope.error));
        }

        serde_json::from_str::<T>(text)
            .map(StreamMessage::Delta)
            .map_err(|source| DecodeError {
                text: text.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatCompletionChunk;
    use serde_json::{json, Value};

    #[test]
    fn test_decode_delta_with_leading_space() {
        let decoder = JsonDecoder::<Value>::new();
        let message = decoder.decode(" {\"id\":1,\"done\":true}").unwrap();
        assert_eq!(message.delta(), Some(&json!({"id": 1, "done": true})));
        assert_eq!(message.into_delta(), Some(json!({"id": 1, "done": true})));
    }

    #[test]
    fn test_error_envelope_takes_precedence() {
        let decoder = JsonDecoder::<Value>::new();
        let message = decoder
            .decode(r#"{"error":{"message":"Rate limit reached","type":"requests","param":null,"code":null}}"#)
            .unwrap();

        match message {
            StreamMessage::ApiError(error) => {
                assert_eq!(error.message, "Rate limit reached");
                assert_eq!(error.error_type.as_deref(), Some("requests"));
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[test]
    fn test_api_error_has_no_delta() {
        let decoder = JsonDecoder::<Value>::new();
        let message = decoder.decode(r#"{"error":{"message":"bad key"}}"#).unwrap();
        assert!(message.delta().is_none());
    }

    #[test]
    fn test_decode_error_keeps_text() {
        let decoder = JsonDecoder::<Value>::new();
        let err = decoder.decode("{not json}").unwrap_err();
        assert_eq!(err.text, "{not json}");
        assert!(err.source.is_syntax());
    }

    #[test]
    fn test_wrong_shape_is_decode_error() {
        let decoder = JsonDecoder::<ChatCompletionChunk>::new();
        let err = decoder.decode("{\"id\":1,\"done\":true}").unwrap_err();
        assert!(err.source.is_data());
    }
}
