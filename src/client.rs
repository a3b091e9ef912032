//! Core client trait and error types.

use thiserror::Error;

use crate::model::{ChatCompletionChunk, ChatMessage};
use crate::options::{ModelOptions, TransportOptions};
use crate::session::EventStream;

/// Errors that can occur while building or starting a request.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures reported by the transport collaborator.
///
/// These are terminal: a session surfaces one of them exactly once and
/// then ends without a completion event.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Stream cancelled")]
    Cancelled,

    #[error("Transport error: {0}")]
    Other(String),
}

/// Reassembled text passed the completeness check but matched neither the
/// error envelope nor the delta shape.
#[derive(Error, Debug)]
#[error("failed to decode stream message: {source}")]
pub struct DecodeError {
    /// The reassembled JSON text that failed to decode.
    pub text: String,
    #[source]
    pub source: serde_json::Error,
}

/// Error variants delivered through a session's event stream.
///
/// Only [`StreamError::Transport`] ends a session; every other variant is
/// reported and the session keeps consuming.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Chunk is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Pending fragments exceeded {limit} bytes")]
    Overflow { limit: usize },
}

impl StreamError {
    /// Whether this error terminates the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamError::Transport(_))
    }
}

/// Client trait for providers that stream chat completion deltas.
///
/// Each provider defines its own model and transport option types and
/// implements `request_stream`; the instance methods reuse the options
/// stored in the client.
///
/// Streams are driven by a background tokio task, so these methods must be
/// called from within a tokio runtime.
///
/// # Example
/// ```rust,ignore
/// impl StreamingClient for MyClient {
///     type ModelProvider = MyModel;
///     type TransportProvider = HttpTransport;
///
///     fn request_stream(
///         messages: Vec<ChatMessage>,
///         model_options: &ModelOptions<Self::ModelProvider>,
///         transport_options: &TransportOptions<Self::TransportProvider>,
///     ) -> Result<EventStream<ChatCompletionChunk>, ClientError> {
///         // Build the request and open a session for it
///     }
///     // ...
/// }
/// ```
pub trait StreamingClient {
    /// Provider-specific model options type
    type ModelProvider: Send + Sync;

    /// Provider-specific transport options type
    type TransportProvider: Send + Sync;

    /// Create a new client instance with default options.
    fn new(
        model_options: ModelOptions<Self::ModelProvider>,
        transport_options: TransportOptions<Self::TransportProvider>,
    ) -> Self;

    /// Get reference to the model options field.
    fn model_options(&self) -> &ModelOptions<Self::ModelProvider>;

    /// Get reference to the transport options field.
    fn transport_options(&self) -> &TransportOptions<Self::TransportProvider>;

    /// Static streaming method.
    ///
    /// Starts the request and returns the stream of session events. The
    /// stream ends after `SessionEvent::Complete` or a transport error.
    fn request_stream(
        messages: Vec<ChatMessage>,
        model_options: &ModelOptions<Self::ModelProvider>,
        transport_options: &TransportOptions<Self::TransportProvider>,
    ) -> Result<EventStream<ChatCompletionChunk>, ClientError>;

    /// Instance method for streaming that uses default options.
    fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<EventStream<ChatCompletionChunk>, ClientError> {
        Self::request_stream(messages, self.model_options(), self.transport_options())
    }

    /// Instance method for streaming that overrides default model options.
    fn chat_stream_with_options(
        &self,
        messages: Vec<ChatMessage>,
        model_options: &ModelOptions<Self::ModelProvider>,
    ) -> Result<EventStream<ChatCompletionChunk>, ClientError> {
        Self::request_stream(messages, model_options, self.transport_options())
    }
}
