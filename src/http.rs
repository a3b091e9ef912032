//! HTTP transport for streaming requests.
//!
//! The [`Transport`] trait is the only seam between a stream session and the
//! network: it starts a request and hands back the response body as ordered
//! byte chunks. Cancelling a transfer is done by dropping the stream.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::client::TransportError;
use crate::options::{HttpTransport, TransportOptions};

/// Response body chunks in arrival order.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// A client capable of streaming a response body.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The request description this transport knows how to issue.
    type Request: Send + 'static;

    /// Issue `request` and return its body as a stream of chunks.
    ///
    /// The returned stream ends after the last chunk, or yields one error
    /// if the transfer fails.
    async fn start(&self, request: Self::Request) -> Result<ByteStream, TransportError>;
}

/// [`Transport`] backed by a `reqwest::Client`.
///
/// Non-success statuses are not turned into errors: their bodies carry the
/// API's error envelope, which the stream pipeline decodes like any other
/// message.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build the underlying client from transport options.
    pub fn from_options(
        transport_options: &TransportOptions<HttpTransport>,
    ) -> Result<Self, reqwest::Error> {
        build_http_client(transport_options).map(Self::new)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    type Request = reqwest::Request;

    async fn start(&self, request: Self::Request) -> Result<ByteStream, TransportError> {
        debug!(method = %request.method(), url = %request.url(), "starting stream request");

        let response = self.client.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%status, "stream request failed; reading error body from stream");
        }

        Ok(response
            .bytes_stream()
            .map_err(TransportError::from)
            .boxed())
    }
}

/// Build a configured HTTP client from transport options.
///
/// This applies common configuration like timeouts and proxies.
///
/// # Example
/// ```ignore
/// let client = build_http_client(&transport_options)?;
/// ```
pub fn build_http_client(
    transport_options: &TransportOptions<HttpTransport>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();

    if let Some(timeout) = transport_options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &transport_options.provider.proxy {
        match reqwest::Proxy::all(proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(err) => warn!(proxy = %proxy_url, error = %err, "ignoring invalid proxy URL"),
        }
    }

    builder.build()
}

/// Add extra headers to a request if specified in transport options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::SecretString;
    use std::time::Duration;

    #[test]
    fn test_build_http_client() {
        let transport_options = TransportOptions::new(HttpTransport {
            api_key: Some(SecretString::new("test".to_string())),
            base_url: None,
            proxy: None,
            extra_headers: None,
        })
        .with_timeout(Duration::from_secs(30));

        assert!(build_http_client(&transport_options).is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let transport_options = TransportOptions::new(
            HttpTransport::new("test").with_proxy("http://proxy.example.com:8080".to_string()),
        );

        assert!(ReqwestTransport::from_options(&transport_options).is_ok());
    }

    #[test]
    fn test_add_extra_headers() {
        let client = Client::new();
        let mut headers = HashMap::new();
        headers.insert("x-trace".to_string(), "abc".to_string());

        let request = add_extra_headers(client.get("http://localhost/"), &Some(headers))
            .build()
            .unwrap();
        assert_eq!(request.headers()["x-trace"], "abc");
    }
}
