//! HTTP transport for chat requests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};

use crate::api::openai::error_from_status;
use crate::client::ClientError;
use crate::options::TransportOptions;
use crate::request::RequestDescriptor;
use crate::sse::SSEResponseExt;

/// Stream of raw SSE `data` payloads.
pub type PayloadStream = BoxStream<'static, Result<String, ClientError>>;

/// Performs the network side of a request.
///
/// Implementations must be safe to share between concurrent operations.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST the request and return the response body of a 2xx reply.
    async fn post(&self, request: &RequestDescriptor) -> Result<String, ClientError>;

    /// POST the request and subscribe to its SSE reply.
    ///
    /// Returns once the provider has accepted the request. Dropping the
    /// returned stream cancels the subscription.
    async fn open_stream(&self, request: &RequestDescriptor) -> Result<PayloadStream, ClientError>;
}

/// Build a configured HTTP client from transport options.
pub fn build_http_client(transport_options: &TransportOptions) -> Result<Client, ClientError> {
    let mut builder = Client::builder();

    match transport_options {
        TransportOptions::Http { timeout, proxy, .. } => {
            if let Some(t) = timeout {
                builder = builder.timeout(*t);
            }
            if let Some(proxy_url) = proxy {
                let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                    ClientError::Config(format!("invalid proxy '{proxy_url}': {e}"))
                })?;
                builder = builder.proxy(proxy);
            }
        }
    }

    builder.build().map_err(ClientError::from)
}

/// [`Transport`] backed by one shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(transport_options: &TransportOptions) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_http_client(transport_options)?,
        })
    }

    /// Wrap an existing client, sharing its connection pool.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(&self, request: &RequestDescriptor) -> Result<reqwest::Response, ClientError> {
        let response = self
            .client
            .post(request.url())
            .headers_from(request)
            .body_logged(request.body())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text_logged().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(
                        url = %request.url(),
                        status = status.as_u16(),
                        error = %e,
                        "failed to read error response body"
                    );
                    String::new()
                }
            };
            return Err(error_from_status(status.as_u16(), &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: &RequestDescriptor) -> Result<String, ClientError> {
        let response = self.send(request).await?;
        Ok(response.text_logged().await?)
    }

    async fn open_stream(&self, request: &RequestDescriptor) -> Result<PayloadStream, ClientError> {
        let response = self.send(request).await?;
        tracing::debug!(url = %request.url(), status = %response.status(), "stream opened");
        Ok(response.sse().boxed())
    }
}

/// Extension trait for RequestBuilder that applies descriptor headers and logs the body.
pub trait RequestBuilderExt {
    fn headers_from(self, request: &RequestDescriptor) -> Self;

    /// Set a pre-serialized JSON body and log it.
    fn body_logged(self, body: &str) -> Self;
}

impl RequestBuilderExt for RequestBuilder {
    fn headers_from(mut self, request: &RequestDescriptor) -> Self {
        for (key, value) in request.headers() {
            self = self.header(key, value);
        }
        self
    }

    fn body_logged(self, body: &str) -> Self {
        tracing::debug!("API request body ({} bytes):\n{}", body.len(), body);
        self.body(body.to_string())
    }
}

/// Extension trait for Response that logs the response body.
#[async_trait]
pub trait ResponseExt {
    /// Get response text and log it. Consumes the response.
    async fn text_logged(self) -> Result<String, reqwest::Error>;
}

#[async_trait]
impl ResponseExt for reqwest::Response {
    async fn text_logged(self) -> Result<String, reqwest::Error> {
        let text = self.text().await?;
        tracing::debug!("API response ({} bytes):\n{}", text.len(), text);
        Ok(text)
    }
}
