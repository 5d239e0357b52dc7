//! Interceptor chain around the terminal sync and stream calls.
//!
//! Interceptors run in registration order. Each one receives the context
//! and a [`Next`] (or [`StreamNext`]) continuation; it may act before or
//! after calling it, handle its errors, or not call it at all. The last
//! continuation is the terminal transport call.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::client::ClientError;
use crate::context::ChatContext;
use crate::model::{AiMessage, ChatResponse};
use crate::stream::StreamListener;

/// The innermost operation of a chain.
#[async_trait]
pub trait Terminal: Send + Sync {
    async fn call(&self, ctx: &ChatContext) -> Result<ChatResponse, ClientError>;

    /// Drive a stream to completion. Results reach the caller through
    /// `listener`; the return value only reports errors that happened
    /// outside the stream itself.
    async fn stream(
        &self,
        ctx: &ChatContext,
        listener: &mut dyn StreamListener,
    ) -> Result<(), ClientError>;
}

/// Cross-cutting behaviour wrapped around the terminal call.
///
/// Both methods default to passing straight through.
#[async_trait]
pub trait ChatInterceptor: Send + Sync {
    async fn intercept(
        &self,
        ctx: &mut ChatContext,
        next: Next<'_>,
    ) -> Result<ChatResponse, ClientError> {
        next.run(ctx).await
    }

    async fn intercept_stream(
        &self,
        ctx: &mut ChatContext,
        listener: &mut dyn StreamListener,
        next: StreamNext<'_>,
    ) -> Result<(), ClientError> {
        next.run(ctx, listener).await
    }
}

/// Continuation of the synchronous chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    interceptors: &'a [Arc<dyn ChatInterceptor>],
    index: usize,
    terminal: &'a dyn Terminal,
}

impl<'a> Next<'a> {
    pub fn new(interceptors: &'a [Arc<dyn ChatInterceptor>], terminal: &'a dyn Terminal) -> Self {
        Self {
            interceptors,
            index: 0,
            terminal,
        }
    }

    /// Invoke the rest of the chain.
    pub async fn run(self, ctx: &mut ChatContext) -> Result<ChatResponse, ClientError> {
        match self.interceptors.get(self.index) {
            Some(current) => {
                let next = Next {
                    index: self.index + 1,
                    ..self
                };
                current.intercept(ctx, next).await
            }
            None => self.terminal.call(ctx).await,
        }
    }
}

/// Continuation of the streaming chain.
#[derive(Clone, Copy)]
pub struct StreamNext<'a> {
    interceptors: &'a [Arc<dyn ChatInterceptor>],
    index: usize,
    terminal: &'a dyn Terminal,
}

impl<'a> StreamNext<'a> {
    pub fn new(interceptors: &'a [Arc<dyn ChatInterceptor>], terminal: &'a dyn Terminal) -> Self {
        Self {
            interceptors,
            index: 0,
            terminal,
        }
    }

    /// Invoke the rest of the chain.
    pub async fn run(
        self,
        ctx: &mut ChatContext,
        listener: &mut dyn StreamListener,
    ) -> Result<(), ClientError> {
        match self.interceptors.get(self.index) {
            Some(current) => {
                let next = StreamNext {
                    index: self.index + 1,
                    ..self
                };
                current.intercept_stream(ctx, listener, next).await
            }
            None => self.terminal.stream(ctx, listener).await,
        }
    }
}

/// Ordered list of interceptors.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn ChatInterceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor; it runs inside every one added before it.
    pub fn push(&mut self, interceptor: impl ChatInterceptor + 'static) {
        self.interceptors.push(Arc::new(interceptor));
    }

    /// Insert an interceptor outside every existing one.
    pub fn push_front(&mut self, interceptor: impl ChatInterceptor + 'static) {
        self.interceptors.insert(0, Arc::new(interceptor));
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub async fn call(
        &self,
        ctx: &mut ChatContext,
        terminal: &dyn Terminal,
    ) -> Result<ChatResponse, ClientError> {
        Next::new(&self.interceptors, terminal).run(ctx).await
    }

    pub async fn stream(
        &self,
        ctx: &mut ChatContext,
        listener: &mut dyn StreamListener,
        terminal: &dyn Terminal,
    ) -> Result<(), ClientError> {
        StreamNext::new(&self.interceptors, terminal)
            .run(ctx, listener)
            .await
    }
}

/// Logs each operation through `tracing`. No prompt text or keys are logged.
#[derive(Debug, Clone, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl ChatInterceptor for LoggingInterceptor {
    async fn intercept(
        &self,
        ctx: &mut ChatContext,
        next: Next<'_>,
    ) -> Result<ChatResponse, ClientError> {
        let started = Instant::now();
        debug!(
            target: "chatline::chat",
            operation = %ctx.id(),
            provider = %ctx.config().provider,
            model = %ctx.request().model(),
            url = %ctx.request().url(),
            stream = false,
            "sending request"
        );

        let result = next.run(ctx).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(response) => debug!(
                target: "chatline::chat",
                operation = %ctx.id(),
                elapsed_ms,
                finish_reason = ?response.finish_reason,
                total_tokens = response.usage.map(|u| u.total_tokens),
                "response received"
            ),
            Err(err) => warn!(
                target: "chatline::chat",
                operation = %ctx.id(),
                elapsed_ms,
                error = %err,
                "request failed"
            ),
        }
        result
    }

    async fn intercept_stream(
        &self,
        ctx: &mut ChatContext,
        listener: &mut dyn StreamListener,
        next: StreamNext<'_>,
    ) -> Result<(), ClientError> {
        debug!(
            target: "chatline::chat",
            operation = %ctx.id(),
            provider = %ctx.config().provider,
            model = %ctx.request().model(),
            url = %ctx.request().url(),
            stream = true,
            "opening stream"
        );

        let mut tap = CountingListener {
            inner: listener,
            started: Instant::now(),
            deltas: 0,
        };
        next.run(ctx, &mut tap).await
    }
}

struct CountingListener<'a> {
    inner: &'a mut dyn StreamListener,
    started: Instant,
    deltas: usize,
}

impl StreamListener for CountingListener<'_> {
    fn on_start(&mut self, ctx: &ChatContext) {
        self.inner.on_start(ctx);
    }

    fn on_message(&mut self, ctx: &ChatContext, message: &AiMessage) {
        if !message.finished {
            self.deltas += 1;
        }
        self.inner.on_message(ctx, message);
    }

    fn on_failure(&mut self, ctx: &ChatContext, error: &ClientError) {
        warn!(
            target: "chatline::chat",
            operation = %ctx.id(),
            deltas = self.deltas,
            error = %error,
            "stream failed"
        );
        self.inner.on_failure(ctx, error);
    }

    fn on_stop(&mut self, ctx: &ChatContext, message: &AiMessage) {
        debug!(
            target: "chatline::chat",
            operation = %ctx.id(),
            deltas = self.deltas,
            chars = message.full_content.len(),
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "stream closed"
        );
        self.inner.on_stop(ctx, message);
    }
}
