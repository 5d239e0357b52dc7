//! Core client trait, error types, and the pipeline-backed client.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::api::openai::parse_response;
use crate::config::ChatConfig;
use crate::context::ChatContext;
use crate::http::{HttpTransport, Transport};
use crate::interceptor::{ChatInterceptor, InterceptorChain, LoggingInterceptor, Terminal};
use crate::model::{AiMessage, ChatResponse, Prompt};
use crate::options::ChatOptions;
use crate::stream::{drive, DeltaListener, StreamAggregator, StreamListener};

/// Errors that can occur during client operations.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// Connection, timeout or body-read failure.
    #[error("HTTP error: {0}")]
    Http(Arc<reqwest::Error>),

    /// Non-2xx reply without a provider error object.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {message}")]
    Parse { message: String, raw: Option<String> },

    /// Well-formed error object returned by the provider.
    #[error("Provider error: {message}")]
    Provider {
        message: String,
        code: Option<String>,
        kind: Option<String>,
        status: Option<u16>,
        raw: String,
    },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        // Builder failures (bad URL, invalid header value) never succeed on retry.
        if err.is_builder() {
            ClientError::Config(format!("invalid request: {err}"))
        } else {
            ClientError::Http(Arc::new(err))
        }
    }
}

impl ClientError {
    pub(crate) fn missing_field(field: &str) -> Self {
        ClientError::Config(format!("Required configuration field is missing: {field}"))
    }

    pub(crate) fn invalid_json(raw: &str, err: serde_json::Error) -> Self {
        ClientError::Parse {
            message: err.to_string(),
            raw: Some(raw.to_string()),
        }
    }

    /// Network-level failures are worth another attempt; everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Http(_) | ClientError::Status { .. })
    }

    pub fn is_rate_limit(&self) -> bool {
        match self {
            ClientError::Provider { kind, code, status, .. } => {
                kind.as_deref() == Some("rate_limit_exceeded")
                    || code.as_deref() == Some("rate_limit_exceeded")
                    || *status == Some(429)
            }
            ClientError::Status { status, .. } => *status == 429,
            _ => false,
        }
    }

    pub fn is_authentication(&self) -> bool {
        match self {
            ClientError::Provider { kind, code, status, .. } => {
                code.as_deref() == Some("invalid_api_key")
                    || kind.as_deref() == Some("authentication_error")
                    || *status == Some(401)
            }
            ClientError::Status { status, .. } => *status == 401,
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Http(e) if e.is_timeout())
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(self, ClientError::Http(e) if e.is_connect())
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Provider { status, .. } => *status,
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Raw payload that produced the error, if any.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            ClientError::Status { body, .. } => Some(body),
            ClientError::Provider { raw, .. } => Some(raw),
            ClientError::Parse { raw, .. } => raw.as_deref(),
            _ => None,
        }
    }
}

/// Caller-facing chat surface.
///
/// # Example
/// ```no_run
/// use chatline::client::{ChatClient, ChatModel};
/// use chatline::providers::{OpenAi, Provider};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = ChatClient::new(OpenAi::config("your-api-key"))?;
///     let reply = client.chat("Hello!").await?;
///     println!("{reply}");
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one synchronous request through the pipeline.
    async fn call(&self, prompt: Prompt, options: ChatOptions) -> Result<ChatResponse, ClientError>;

    /// Stream a reply into `listener`. Resolves once the stream has stopped;
    /// stream failures are reported to the listener, not returned.
    async fn stream_with(
        &self,
        prompt: Prompt,
        options: ChatOptions,
        listener: &mut dyn StreamListener,
    ) -> Result<(), ClientError>;

    /// Send a single user turn with default options and return the text.
    async fn chat(&self, prompt: &str) -> Result<String, ClientError> {
        let response = self.call(Prompt::from(prompt), ChatOptions::default()).await?;
        Ok(response.content().to_string())
    }

    /// Stream a reply, handing each delta to `on_delta`.
    ///
    /// Returns the final aggregate, or the stream's failure once the stream
    /// has stopped.
    async fn stream<F>(
        &self,
        prompt: Prompt,
        on_delta: F,
        options: ChatOptions,
    ) -> Result<AiMessage, ClientError>
    where
        F: FnMut(&str) + Send,
        Self: Sized,
    {
        let mut listener = DeltaListener::new(on_delta);
        self.stream_with(prompt, options, &mut listener).await?;
        listener.into_result()
    }

    /// Stream a single user turn with default options and return the full text.
    async fn stream_text<F>(&self, prompt: &str, on_delta: F) -> Result<String, ClientError>
    where
        F: FnMut(&str) + Send,
        Self: Sized,
    {
        let message = self
            .stream(Prompt::from(prompt), on_delta, ChatOptions::default())
            .await?;
        Ok(message.full_content)
    }
}

/// Terminal call that goes to a [`Transport`] with the request's retry budget.
#[derive(Clone)]
pub struct TransportTerminal {
    transport: Arc<dyn Transport>,
}

impl TransportTerminal {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Terminal for TransportTerminal {
    async fn call(&self, ctx: &ChatContext) -> Result<ChatResponse, ClientError> {
        let request = ctx.request();
        let body = request
            .retry()
            .execute_if(
                || self.transport.post(request),
                ctx.cancellation(),
                ClientError::is_retryable,
            )
            .await?;
        parse_response(&body)
    }

    async fn stream(
        &self,
        ctx: &ChatContext,
        listener: &mut dyn StreamListener,
    ) -> Result<(), ClientError> {
        let request = ctx.request();
        let mut aggregator = StreamAggregator::new(ctx, listener);

        let opened = request
            .retry()
            .execute_if(
                || self.transport.open_stream(request),
                ctx.cancellation(),
                ClientError::is_retryable,
            )
            .await;

        match opened {
            Ok(payloads) => drive(payloads, &mut aggregator, ctx.cancellation()).await,
            Err(err) => aggregator.on_error(err),
        }
        Ok(())
    }
}

/// Chat client running every request through the interceptor chain.
///
/// Cheap to clone; clones share the configuration, interceptors and the
/// transport's connection pool. Each call gets its own [`ChatContext`].
#[derive(Clone)]
pub struct ChatClient {
    config: Arc<ChatConfig>,
    terminal: TransportTerminal,
    chain: InterceptorChain,
}

impl ChatClient {
    /// Validate `config` and create a client over HTTP.
    pub fn new(config: ChatConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(&config.transport)?;
        Self::with_transport(config, transport)
    }

    /// Validate `config` and create a client over a custom transport.
    pub fn with_transport(
        config: ChatConfig,
        transport: impl Transport + 'static,
    ) -> Result<Self, ClientError> {
        config.validate()?;

        let mut chain = InterceptorChain::new();
        if config.log_enabled {
            chain.push(LoggingInterceptor);
        }

        Ok(Self {
            config: Arc::new(config),
            terminal: TransportTerminal::new(Arc::new(transport)),
            chain,
        })
    }

    /// Add an interceptor inside all previously added ones.
    pub fn with_interceptor(mut self, interceptor: impl ChatInterceptor + 'static) -> Self {
        self.chain.push(interceptor);
        self
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Stream with a caller-owned cancellation token.
    ///
    /// Cancelling stops the stream (final message and stop still fire) or
    /// aborts a pending retry delay.
    pub async fn stream_with_cancel(
        &self,
        prompt: Prompt,
        options: ChatOptions,
        listener: &mut dyn StreamListener,
        cancel: CancellationToken,
    ) -> Result<(), ClientError> {
        let mut ctx = ChatContext::with_cancellation(
            prompt,
            options.streaming(true),
            self.config.clone(),
            cancel,
        );
        self.chain.stream(&mut ctx, listener, &self.terminal).await
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn call(&self, prompt: Prompt, options: ChatOptions) -> Result<ChatResponse, ClientError> {
        let mut ctx = ChatContext::new(prompt, options.streaming(false), self.config.clone());
        self.chain.call(&mut ctx, &self.terminal).await
    }

    async fn stream_with(
        &self,
        prompt: Prompt,
        options: ChatOptions,
        listener: &mut dyn StreamListener,
    ) -> Result<(), ClientError> {
        self.stream_with_cancel(prompt, options, listener, CancellationToken::new())
            .await
    }
}
