//! Streaming chat completion example.
//!
//! Run with:
//! ```bash
//! export OPENAI_API_KEY="your-api-key"
//! RUST_LOG=deltastream=debug cargo run --example openai_streaming
//! ```

use std::io::Write;
use std::time::Duration;

use deltastream::client::StreamingClient;
use deltastream::model::ChatMessage;
use deltastream::options::{HttpTransport, ModelOptions, OpenAiModel, TransportOptions};
use deltastream::providers::OpenAiClient;
use deltastream::{SessionEvent, StreamMessage};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Get API key from environment
    let api_key =
        std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY environment variable must be set");

    let model_options = ModelOptions::new(OpenAiModel::default())
        .with_model("gpt-3.5-turbo".to_string())
        .with_temperature(0.9)
        .with_max_tokens(256);

    let transport_options = TransportOptions::new(HttpTransport::new(api_key))
        .with_timeout(Duration::from_secs(60));

    let client = OpenAiClient::new(model_options, transport_options);

    let messages = vec![ChatMessage::user("Write a haiku about Rust programming.")];

    println!("Streaming response...\n");

    let mut events = client.chat_stream(messages)?;
    while let Some(event) = events.next().await {
        match event {
            SessionEvent::Event(Ok(StreamMessage::Delta(chunk))) => {
                print!("{}", chunk.text());
                std::io::stdout().flush()?;

                if let Some(reason) = chunk.finish_reason() {
                    println!("\n\nFinish reason: {}", reason);
                }
            }
            SessionEvent::Event(Ok(StreamMessage::ApiError(error))) => {
                eprintln!("\nAPI error: {}", error);
            }
            SessionEvent::Event(Err(err)) => {
                eprintln!("\nError in stream: {}", err);
                if err.is_terminal() {
                    return Err(err.into());
                }
            }
            SessionEvent::Complete => println!("\n=== Stream Complete ==="),
        }
    }

    Ok(())
}
