//! # deltastream - streaming chat completion deltas over SSE
//!
//! Reassembles the `data:` lines of a Server-Sent Events response into
//! discrete JSON messages, whatever the chunk boundaries of the transport.
//!
//! ## Pipeline
//!
//! 1. **Frame splitting** ([`sse`]): a raw chunk is decoded as UTF-8, split on
//!    `\n` and each line classified as sentinel, `data:` line, bare
//!    continuation, or blank.
//! 2. **Reassembly** ([`reassembly`]): fragments accumulate until their
//!    concatenation is a brace-balanced JSON object.
//! 3. **Decoding** ([`decode`]): the object is decoded as the API error
//!    envelope or, failing that, as the delta type.
//!
//! [`stream::EventPipeline`] ties the three together for one session, and
//! [`session::SseSession`] drives it from a [`http::Transport`] on a tokio
//! task, publishing [`SessionEvent`]s through an [`EventStream`].
//!
//! ## Example
//! ```no_run
//! use futures::StreamExt;
//! use deltastream::client::StreamingClient;
//! use deltastream::model::ChatMessage;
//! use deltastream::options::{HttpTransport, ModelOptions, OpenAiModel, TransportOptions};
//! use deltastream::providers::OpenAiClient;
//! use deltastream::{SessionEvent, StreamMessage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OpenAiClient::new(
//!         ModelOptions::new(OpenAiModel::default()).with_model("gpt-3.5-turbo".to_string()),
//!         TransportOptions::new(HttpTransport::new("your-api-key")),
//!     );
//!
//!     let mut events = client.chat_stream(vec![ChatMessage::user("Hello!")])?;
//!     while let Some(event) = events.next().await {
//!         match event {
//!             SessionEvent::Event(Ok(StreamMessage::Delta(chunk))) => print!("{}", chunk.text()),
//!             SessionEvent::Event(Ok(StreamMessage::ApiError(error))) => eprintln!("API error: {}", error),
//!             SessionEvent::Event(Err(err)) => eprintln!("stream error: {}", err),
//!             SessionEvent::Complete => println!(),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod decode;
pub mod http;
pub mod model;
pub mod options;
pub mod providers;
pub mod reassembly;
pub mod session;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use client::{ClientError, DecodeError, StreamError, StreamingClient, TransportError};
pub use decode::{Decode, JsonDecoder, StreamMessage};
pub use model::{ChatCompletionChunk, ChatMessage};
pub use session::{EventStream, SessionState, SseSession};
pub use stream::SessionEvent;
