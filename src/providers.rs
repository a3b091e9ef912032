//! LLM provider implementations.

pub mod openai;

// Re-export for convenience
pub use openai::OpenAiClient;
