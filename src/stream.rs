//! Stream aggregation: raw SSE payloads in, normalized listener events out.
//!
//! ```text
//! STARTED --payload--> RECEIVING --[DONE] | blank | close | cancel--> FINISHED
//!     \                    |
//!      \------ error ------+--> ERRORED --> (stop)
//! ```
//!
//! Every delta is delivered in arrival order. The final message event (empty
//! delta, full content, `finished` set) follows all deltas, and `on_stop`
//! is the last notification of any kind. Each of start, final message,
//! failure and stop fires at most once however the termination signals
//! arrive.

use futures::stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::api::openai::{parse_payload, ParseMode};
use crate::client::ClientError;
use crate::context::ChatContext;
use crate::model::AiMessage;
use crate::sse::is_done_marker;

/// Receiver of streaming events.
///
/// Only `on_message` is required. The defaults for the other callbacks do
/// nothing, except `on_failure` which logs the cause.
pub trait StreamListener: Send {
    fn on_start(&mut self, _ctx: &ChatContext) {}

    /// A delta (`finished == false`) or the final aggregate (`finished == true`).
    fn on_message(&mut self, ctx: &ChatContext, message: &AiMessage);

    fn on_failure(&mut self, ctx: &ChatContext, error: &ClientError) {
        warn!(operation = %ctx.id(), error = %error, "stream failed");
    }

    /// Always the last notification. `message` is the frozen aggregate.
    fn on_stop(&mut self, _ctx: &ChatContext, _message: &AiMessage) {}
}

/// Adapts a closure receiving each non-empty delta into a listener.
///
/// Keeps the frozen aggregate and the failure (if any) for the caller.
pub struct DeltaListener<F> {
    on_delta: F,
    message: Option<AiMessage>,
    error: Option<ClientError>,
}

impl<F> DeltaListener<F>
where
    F: FnMut(&str) + Send,
{
    pub fn new(on_delta: F) -> Self {
        Self {
            on_delta,
            message: None,
            error: None,
        }
    }

    /// The aggregate after `on_stop`, or the stream failure.
    pub fn into_result(self) -> Result<AiMessage, ClientError> {
        match (self.error, self.message) {
            (Some(err), _) => Err(err),
            (None, Some(message)) => Ok(message),
            (None, None) => Err(ClientError::Stream("stream ended without stop".to_string())),
        }
    }
}

impl<F> StreamListener for DeltaListener<F>
where
    F: FnMut(&str) + Send,
{
    fn on_message(&mut self, _ctx: &ChatContext, message: &AiMessage) {
        if !message.finished && !message.content.is_empty() {
            (self.on_delta)(&message.content);
        }
    }

    fn on_failure(&mut self, _ctx: &ChatContext, error: &ClientError) {
        self.error = Some(error.clone());
    }

    fn on_stop(&mut self, _ctx: &ChatContext, message: &AiMessage) {
        self.message = Some(message.clone());
    }
}

/// Where the aggregator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Started,
    Receiving,
    Finished,
    Errored,
}

/// Folds raw stream payloads into one growing [`AiMessage`].
pub struct StreamAggregator<'a> {
    ctx: &'a ChatContext,
    listener: &'a mut dyn StreamListener,
    message: AiMessage,
    state: StreamState,
    started: bool,
    finalized: bool,
    failed: bool,
    stopped: bool,
    parse_failures: u32,
    parse_error_budget: Option<u32>,
}

impl<'a> StreamAggregator<'a> {
    pub fn new(ctx: &'a ChatContext, listener: &'a mut dyn StreamListener) -> Self {
        Self {
            parse_error_budget: ctx.config().stream_parse_error_budget,
            ctx,
            listener,
            message: AiMessage::default(),
            state: StreamState::Started,
            started: false,
            finalized: false,
            failed: false,
            stopped: false,
            parse_failures: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// The aggregate so far.
    pub fn message(&self) -> &AiMessage {
        &self.message
    }

    /// True once the stop notification has fired.
    pub fn is_done(&self) -> bool {
        self.stopped
    }

    /// The subscription is confirmed. Fires `on_start` once.
    pub fn on_start(&mut self) {
        if self.started || self.is_terminal() {
            return;
        }
        self.started = true;
        self.state = StreamState::Receiving;
        debug!(operation = %self.ctx.id(), "stream started");
        self.listener.on_start(self.ctx);
    }

    /// One raw `data` payload from the transport.
    pub fn on_payload(&mut self, raw: &str) {
        if self.is_terminal() {
            trace!(operation = %self.ctx.id(), "payload after stream end ignored");
            return;
        }
        if raw.trim().is_empty() || is_done_marker(raw) {
            self.finish();
            return;
        }
        self.on_start();

        let fragment = match parse_payload(raw, ParseMode::Delta) {
            Ok(fragment) => fragment,
            Err(err @ ClientError::Provider { .. }) => {
                self.on_error(err);
                return;
            }
            Err(err) => {
                self.parse_failures += 1;
                warn!(
                    operation = %self.ctx.id(),
                    failures = self.parse_failures,
                    raw = %raw,
                    error = %err,
                    "skipping malformed stream frame"
                );
                if self
                    .parse_error_budget
                    .is_some_and(|budget| self.parse_failures > budget)
                {
                    self.on_error(err);
                }
                return;
            }
        };

        if fragment.finish_reason.is_some() {
            self.message.finish_reason = fragment.finish_reason;
        }
        if fragment.usage.is_some() {
            self.message.usage = fragment.usage;
        }

        match fragment.content {
            Some(content) if !content.is_empty() => {
                self.message.merge(&content);
                let delta = self.message.delta(&content);
                self.listener.on_message(self.ctx, &delta);
            }
            _ => {}
        }
    }

    /// The transport closed normally (or the caller cancelled).
    pub fn on_close(&mut self) {
        self.finish();
    }

    /// The transport failed. Fires `on_failure` once, then the stop sequence.
    pub fn on_error(&mut self, error: ClientError) {
        if !self.failed && !self.stopped {
            self.failed = true;
            self.state = StreamState::Errored;
            self.listener.on_failure(self.ctx, &error);
        }
        self.stop();
    }

    fn is_terminal(&self) -> bool {
        matches!(self.state, StreamState::Finished | StreamState::Errored)
    }

    fn finish(&mut self) {
        if !self.finalized && !self.failed {
            self.finalized = true;
            self.state = StreamState::Finished;
            self.message.freeze();
            self.listener.on_message(self.ctx, &self.message);
        }
        self.stop();
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.message.freeze();
        debug!(
            operation = %self.ctx.id(),
            state = ?self.state,
            chars = self.message.full_content.len(),
            "stream stopped"
        );
        self.listener.on_stop(self.ctx, &self.message);
    }
}

/// Drive `payloads` through `aggregator` until a termination signal.
///
/// Termination is the `[DONE]` marker, a blank payload, the end of the
/// stream, a transport error, or `cancel`. The payload stream is dropped on
/// return, which closes the underlying subscription.
pub async fn drive<S>(payloads: S, aggregator: &mut StreamAggregator<'_>, cancel: &CancellationToken)
where
    S: Stream<Item = Result<String, ClientError>>,
{
    let mut payloads = std::pin::pin!(payloads);
    aggregator.on_start();

    while !aggregator.is_done() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("stream cancelled by caller");
                aggregator.on_close();
            }
            item = payloads.next() => match item {
                Some(Ok(raw)) => aggregator.on_payload(&raw),
                Some(Err(err)) => aggregator.on_error(err),
                None => aggregator.on_close(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatConfig;
    use crate::model::Prompt;
    use crate::options::ChatOptions;
    use futures::stream;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Start,
        Delta(String, String),
        Final(String),
        Failure(String),
        Stop(String),
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
    }

    impl StreamListener for Recorder {
        fn on_start(&mut self, _ctx: &ChatContext) {
            self.events.push(Event::Start);
        }

        fn on_message(&mut self, _ctx: &ChatContext, message: &AiMessage) {
            if message.finished {
                assert!(message.content.is_empty());
                self.events.push(Event::Final(message.full_content.clone()));
            } else {
                self.events.push(Event::Delta(
                    message.content.clone(),
                    message.full_content.clone(),
                ));
            }
        }

        fn on_failure(&mut self, _ctx: &ChatContext, error: &ClientError) {
            self.events.push(Event::Failure(error.to_string()));
        }

        fn on_stop(&mut self, _ctx: &ChatContext, message: &AiMessage) {
            assert!(message.finished);
            self.events.push(Event::Stop(message.full_content.clone()));
        }
    }

    fn context(config: ChatConfig) -> ChatContext {
        ChatContext::new(
            Prompt::from("hi"),
            ChatOptions::new().streaming(true),
            config.with_api_key("sk-test").into(),
        )
    }

    fn default_context() -> ChatContext {
        context(ChatConfig::new("test", "http://localhost", "/chat", "m"))
    }

    fn chunk(content: &str) -> String {
        serde_json::json!({"choices": [{"delta": {"content": content}}]}).to_string()
    }

    fn delta(d: &str, full: &str) -> Event {
        Event::Delta(d.to_string(), full.to_string())
    }

    #[test]
    fn test_done_then_close_stops_once() {
        let ctx = default_context();
        let mut recorder = Recorder::default();
        {
            let mut aggregator = StreamAggregator::new(&ctx, &mut recorder);
            aggregator.on_start();
            aggregator.on_payload(&chunk("He"));
            aggregator.on_payload(&chunk("llo"));
            aggregator.on_payload("[DONE]");
            aggregator.on_close();
            aggregator.on_payload(&chunk("late"));
            assert_eq!(aggregator.state(), StreamState::Finished);
            assert_eq!(aggregator.message().full_content, "Hello");
        }

        assert_eq!(
            recorder.events,
            vec![
                Event::Start,
                delta("He", "He"),
                delta("llo", "Hello"),
                Event::Final("Hello".to_string()),
                Event::Stop("Hello".to_string()),
            ]
        );
    }

    #[test]
    fn test_error_after_delta_fails_then_stops_once() {
        let ctx = default_context();
        let mut recorder = Recorder::default();
        {
            let mut aggregator = StreamAggregator::new(&ctx, &mut recorder);
            aggregator.on_start();
            aggregator.on_payload(&chunk("He"));
            aggregator.on_error(ClientError::Stream("connection reset".to_string()));
            aggregator.on_close();
            aggregator.on_error(ClientError::Stream("again".to_string()));
            assert_eq!(aggregator.state(), StreamState::Errored);
        }

        assert_eq!(
            recorder.events,
            vec![
                Event::Start,
                delta("He", "He"),
                Event::Failure("Stream error: connection reset".to_string()),
                Event::Stop("He".to_string()),
            ]
        );
    }

    #[test]
    fn test_blank_payload_finishes() {
        let ctx = default_context();
        let mut recorder = Recorder::default();
        {
            let mut aggregator = StreamAggregator::new(&ctx, &mut recorder);
            aggregator.on_payload(&chunk("a"));
            aggregator.on_payload("   ");
        }
        assert_eq!(
            recorder.events,
            vec![
                Event::Start,
                delta("a", "a"),
                Event::Final("a".to_string()),
                Event::Stop("a".to_string()),
            ]
        );
    }

    #[test]
    fn test_malformed_frame_is_swallowed() {
        let ctx = default_context();
        let mut recorder = Recorder::default();
        {
            let mut aggregator = StreamAggregator::new(&ctx, &mut recorder);
            aggregator.on_payload(&chunk("a"));
            aggregator.on_payload("{broken");
            aggregator.on_payload(&chunk("b"));
            aggregator.on_close();
        }
        assert_eq!(
            recorder.events,
            vec![
                Event::Start,
                delta("a", "a"),
                delta("b", "ab"),
                Event::Final("ab".to_string()),
                Event::Stop("ab".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_error_budget_exceeded_fails_stream() {
        let ctx = context(
            ChatConfig::new("test", "http://localhost", "/chat", "m").with_stream_parse_error_budget(1),
        );
        let mut recorder = Recorder::default();
        {
            let mut aggregator = StreamAggregator::new(&ctx, &mut recorder);
            aggregator.on_payload(&chunk("a"));
            aggregator.on_payload("{broken");
            aggregator.on_payload("{still broken");
            aggregator.on_payload(&chunk("never"));
            assert_eq!(aggregator.state(), StreamState::Errored);
        }
        assert_eq!(recorder.events.len(), 4);
        assert!(matches!(recorder.events[2], Event::Failure(ref msg) if msg.contains("parse")));
        assert_eq!(recorder.events[3], Event::Stop("a".to_string()));
    }

    #[test]
    fn test_control_frames_do_not_emit() {
        let ctx = default_context();
        let mut recorder = Recorder::default();
        let message = {
            let mut aggregator = StreamAggregator::new(&ctx, &mut recorder);
            aggregator.on_payload(r#"{"choices":[{"delta":{"role":"assistant","content":""}}]}"#);
            aggregator.on_payload(&chunk("x"));
            aggregator.on_payload(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#);
            aggregator.on_payload(
                r#"{"choices":[],"usage":{"prompt_tokens":1,"completion_tokens":1,"total_tokens":2}}"#,
            );
            aggregator.on_payload("[DONE]");
            aggregator.message().clone()
        };
        assert_eq!(recorder.events.len(), 4);
        assert_eq!(message.finish_reason, Some(crate::model::FinishReason::Stop));
        assert_eq!(message.usage.map(|u| u.total_tokens), Some(2));
    }

    #[test]
    fn test_provider_error_frame_fails_stream() {
        let ctx = default_context();
        let mut recorder = Recorder::default();
        {
            let mut aggregator = StreamAggregator::new(&ctx, &mut recorder);
            aggregator.on_payload(r#"{"error":{"message":"overloaded","type":"server_error"}}"#);
        }
        assert_eq!(recorder.events.len(), 3);
        assert!(matches!(recorder.events[1], Event::Failure(ref msg) if msg.contains("overloaded")));
    }

    #[tokio::test]
    async fn test_drive_until_done_marker() {
        let ctx = default_context();
        let mut recorder = Recorder::default();
        let payloads = stream::iter(vec![
            Ok(chunk("He")),
            Ok(chunk("llo")),
            Ok("[DONE]".to_string()),
            Ok(chunk("ignored")),
        ]);
        {
            let mut aggregator = StreamAggregator::new(&ctx, &mut recorder);
            drive(payloads, &mut aggregator, &CancellationToken::new()).await;
        }
        let stops = recorder
            .events
            .iter()
            .filter(|e| matches!(e, Event::Stop(_)))
            .count();
        assert_eq!(stops, 1);
        assert_eq!(recorder.events.len(), 5);
    }

    #[tokio::test]
    async fn test_drive_cancelled_stops_without_more_deltas() {
        let ctx = default_context();
        let mut recorder = Recorder::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let payloads = stream::iter(vec![Ok(chunk("never"))]);
        {
            let mut aggregator = StreamAggregator::new(&ctx, &mut recorder);
            drive(payloads, &mut aggregator, &cancel).await;
        }
        assert_eq!(
            recorder.events,
            vec![
                Event::Start,
                Event::Final(String::new()),
                Event::Stop(String::new()),
            ]
        );
    }

    #[test]
    fn test_delta_listener_collects_result() {
        let ctx = default_context();
        let mut seen = Vec::new();
        let mut listener = DeltaListener::new(|d: &str| seen.push(d.to_string()));
        {
            let mut aggregator = StreamAggregator::new(&ctx, &mut listener);
            aggregator.on_payload(&chunk("He"));
            aggregator.on_payload(&chunk("llo"));
            aggregator.on_close();
        }
        let message = listener.into_result().unwrap();
        assert_eq!(message.full_content, "Hello");
        assert_eq!(seen, ["He", "llo"]);
    }
}
