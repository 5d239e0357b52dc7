//! Turning a prompt, its options and the provider config into a transport-ready request.

use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::ChatConfig;
use crate::model::Prompt;
use crate::options::ChatOptions;
use crate::retry::RetryPolicy;

/// Everything the transport needs for one operation.
///
/// Built once per operation by [`RequestDescriptor::build`] and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    url: String,
    headers: HashMap<String, String>,
    body: String,
    model: String,
    stream: bool,
    retry: RetryPolicy,
}

impl RequestDescriptor {
    /// Build the request for `prompt`.
    ///
    /// Generation parameters are only written when set in `options`; the
    /// `extra` bag is layered on last and wins on key collisions.
    pub fn build(prompt: &Prompt, options: &ChatOptions, config: &ChatConfig) -> Self {
        let model = options
            .model
            .as_deref()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or(&config.model)
            .to_string();

        let mut body = Map::new();
        body.insert("model".to_string(), Value::from(model.as_str()));
        body.insert("messages".to_string(), serialize_messages(prompt));

        put(&mut body, "temperature", options.temperature);
        put(&mut body, "max_tokens", options.max_tokens);
        put(&mut body, "top_p", options.top_p);
        put(&mut body, "frequency_penalty", options.frequency_penalty);
        put(&mut body, "presence_penalty", options.presence_penalty);

        if options.stream {
            body.insert("stream".to_string(), Value::Bool(true));
            if options.include_usage.unwrap_or(config.include_usage) {
                body.insert("stream_options".to_string(), json!({ "include_usage": true }));
            }
        }

        for (key, value) in &options.extra {
            body.insert(key.clone(), value.clone());
        }

        Self {
            url: config.full_url(),
            headers: build_headers(config, options.stream),
            body: Value::Object(body).to_string(),
            model,
            stream: options.stream,
            retry: resolve_retry(options, config),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Serialized JSON body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Effective model name written into the body.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_stream(&self) -> bool {
        self.stream
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub fn retry_count(&self) -> u32 {
        self.retry.max_retries()
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry.delay()
    }
}

fn put<T: Into<Value>>(body: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        body.insert(key.to_string(), value.into());
    }
}

fn serialize_messages(prompt: &Prompt) -> Value {
    Value::Array(
        prompt
            .messages()
            .iter()
            .map(|message| {
                json!({
                    "role": message.role().as_str(),
                    "content": message.content(),
                })
            })
            .collect(),
    )
}

fn build_headers(config: &ChatConfig, stream: bool) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    if let Some(key) = &config.api_key {
        headers.insert("Authorization".to_string(), format!("Bearer {key}"));
    }
    if stream {
        headers.insert("Accept".to_string(), "text/event-stream".to_string());
    }
    if let Some(extra) = config.transport.headers() {
        for (key, value) in extra {
            headers.insert(key.clone(), value.clone());
        }
    }
    headers
}

fn resolve_retry(options: &ChatOptions, config: &ChatConfig) -> RetryPolicy {
    if !options.retry_enabled.unwrap_or(config.retry_enabled) {
        return RetryPolicy::none();
    }
    RetryPolicy::new(
        options.retry_count.unwrap_or(config.retry_count),
        Duration::from_millis(options.retry_delay_ms.unwrap_or(config.retry_delay_ms)),
    )
}
