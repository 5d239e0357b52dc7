//! Per-request chat options and transport configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use std::collections::HashMap;
use std::time::Duration;

/// Per-request overrides.
///
/// Every field is optional. Unset fields fall back to the [`ChatConfig`]
/// defaults when the request is built, and unset generation parameters are
/// left out of the request body entirely.
///
/// [`ChatConfig`]: crate::config::ChatConfig
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Model identifier overriding the provider default. Blank is treated as unset.
    pub model: Option<String>,

    /// Sampling temperature (0.0 - 2.0).
    pub temperature: Option<f64>,

    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,

    /// Nucleus sampling parameter.
    pub top_p: Option<f64>,

    pub frequency_penalty: Option<f64>,

    pub presence_penalty: Option<f64>,

    /// Ask the provider for a usage frame at the end of a stream.
    pub include_usage: Option<bool>,

    pub retry_enabled: Option<bool>,

    /// Number of retries after the first attempt.
    pub retry_count: Option<u32>,

    pub retry_delay_ms: Option<u64>,

    /// Provider-specific parameters merged into the body last.
    /// On a key collision these win over the named fields above.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,

    /// Set by the pipeline for the streaming entry points.
    #[serde(skip)]
    pub stream: bool,
}

impl ChatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_frequency_penalty(mut self, penalty: f64) -> Self {
        self.frequency_penalty = Some(penalty);
        self
    }

    pub fn with_presence_penalty(mut self, penalty: f64) -> Self {
        self.presence_penalty = Some(penalty);
        self
    }

    pub fn with_include_usage(mut self, include: bool) -> Self {
        self.include_usage = Some(include);
        self
    }

    /// Enable retries with the given budget and fixed delay.
    pub fn with_retry(mut self, count: u32, delay: Duration) -> Self {
        self.retry_enabled = Some(true);
        self.retry_count = Some(count);
        self.retry_delay_ms = Some(delay.as_millis() as u64);
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.retry_enabled = Some(false);
        self
    }

    /// Add a provider-specific body parameter.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Copy of these options with the streaming flag set.
    pub fn streaming(&self, stream: bool) -> Self {
        Self {
            stream,
            ..self.clone()
        }
    }
}

/// Transport configuration options.
///
/// Controls how requests are sent over the network.
#[derive(Debug, Clone)]
pub enum TransportOptions {
    /// HTTP transport configuration
    Http {
        /// Request timeout. If None, default client timeout is used.
        timeout: Option<Duration>,
        /// HTTP proxy URL.
        proxy: Option<String>,
        /// Additional HTTP headers to send with every request.
        headers: Option<HashMap<String, String>>,
    },
}

impl Default for TransportOptions {
    fn default() -> Self {
        TransportOptions::Http {
            timeout: None,
            proxy: None,
            headers: None,
        }
    }
}

impl TransportOptions {
    /// Create new default HTTP transport options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, duration: Duration) -> Self {
        match &mut self {
            TransportOptions::Http { timeout, .. } => *timeout = Some(duration),
        }
        self
    }

    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        match &mut self {
            TransportOptions::Http { proxy, .. } => *proxy = Some(proxy_url.into()),
        }
        self
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self {
            TransportOptions::Http { headers, .. } => {
                headers
                    .get_or_insert_with(HashMap::new)
                    .insert(key.into(), value.into());
            }
        }
        self
    }

    pub fn headers(&self) -> Option<&HashMap<String, String>> {
        match self {
            TransportOptions::Http { headers, .. } => headers.as_ref(),
        }
    }
}
