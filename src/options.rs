//! Generic options structures for model, transport and stream configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Generic model options containing common model behavior parameters
/// and provider-specific model configuration.
///
/// # Example
/// ```rust
/// use deltastream::options::{ModelOptions, OpenAiModel};
///
/// let options = ModelOptions::new(OpenAiModel::default())
///     .with_model("gpt-3.5-turbo".to_string())
///     .with_temperature(0.7);
/// assert_eq!(options.max_tokens, None);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelOptions<T> {
    /// Model identifier (e.g., "gpt-3.5-turbo")
    pub model: Option<String>,

    /// System instructions, sent as a leading system message
    pub instructions: Option<String>,

    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,

    /// Top-p (nucleus) sampling parameter
    pub top_p: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Provider-specific model options
    pub provider: T,
}

/// Generic transport options containing truly generic transport fields
/// and provider-specific transport configuration.
///
/// # Example
/// ```rust
/// use deltastream::options::{TransportOptions, HttpTransport, SecretString};
/// use std::time::Duration;
///
/// let options = TransportOptions {
///     timeout: Some(Duration::from_secs(30)),
///     stream: Default::default(),
///     provider: HttpTransport {
///         api_key: Some(SecretString::new("sk-...".to_string())),
///         base_url: Some("https://api.openai.com".to_string()),
///         proxy: None,
///         extra_headers: None,
///     },
/// };
/// ```
#[derive(Debug, Clone)]
pub struct TransportOptions<T> {
    /// Request timeout (applies to all transports)
    pub timeout: Option<Duration>,

    /// Reassembly settings for streamed responses
    pub stream: StreamOptions,

    /// Provider-specific transport options
    pub provider: T,
}

/// HTTP-specific transport options.
/// Used as the provider field in `TransportOptions<HttpTransport>`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    /// API key for authentication
    pub api_key: Option<SecretString>,

    /// Base URL for API endpoints
    pub base_url: Option<String>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl HttpTransport {
    /// Create new HTTP transport options with an API key.
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: None,
            proxy: None,
            extra_headers: None,
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}

/// OpenAI-specific model options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenAiModel {
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    /// End-user identifier forwarded for abuse monitoring
    pub user: Option<String>,
}

/// Default upper bound on text held by the fragment buffer.
pub const DEFAULT_MAX_PENDING_BYTES: usize = 1024 * 1024;

/// Settings for the reassembly pipeline of one stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Maximum number of bytes the fragment buffer may hold before it is
    /// discarded with an overflow error. `None` disables the bound.
    pub max_pending_bytes: Option<usize>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            max_pending_bytes: Some(DEFAULT_MAX_PENDING_BYTES),
        }
    }
}

impl StreamOptions {
    /// Options without a bound on pending fragments.
    pub fn unbounded() -> Self {
        Self {
            max_pending_bytes: None,
        }
    }

    pub fn with_max_pending_bytes(mut self, limit: usize) -> Self {
        self.max_pending_bytes = Some(limit);
        self
    }
}

impl<T> ModelOptions<T> {
    /// Create new model options with provider-specific configuration.
    pub fn new(provider: T) -> Self {
        Self {
            model: None,
            instructions: None,
            temperature: None,
            top_p: None,
            max_tokens: None,
            provider,
        }
    }

    /// Set the model identifier.
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the system instructions.
    pub fn with_instructions(mut self, instructions: String) -> Self {
        self.instructions = Some(instructions);
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set top-p sampling parameter.
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

impl<T> TransportOptions<T> {
    /// Create new transport options with provider-specific configuration.
    pub fn new(provider: T) -> Self {
        Self {
            timeout: None,
            stream: StreamOptions::default(),
            provider,
        }
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the stream reassembly options.
    pub fn with_stream_options(mut self, stream: StreamOptions) -> Self {
        self.stream = stream;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let secret = SecretString::from("sk-live");
        assert_eq!(format!("{:?}", secret), "SecretString([REDACTED])");
        assert_eq!(secret.expose_secret(), "sk-live");
    }

    #[test]
    fn test_stream_options_default_is_bounded() {
        assert_eq!(
            StreamOptions::default().max_pending_bytes,
            Some(DEFAULT_MAX_PENDING_BYTES)
        );
        assert_eq!(StreamOptions::unbounded().max_pending_bytes, None);
        assert_eq!(
            StreamOptions::unbounded().with_max_pending_bytes(16).max_pending_bytes,
            Some(16)
        );
    }

    #[test]
    fn test_http_transport_headers() {
        let transport = HttpTransport::new("key")
            .with_header("OpenAI-Organization".to_string(), "org-1".to_string());
        let headers = transport.extra_headers.unwrap();
        assert_eq!(headers.get("OpenAI-Organization").map(String::as_str), Some("org-1"));
    }
}
