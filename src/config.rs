//! Provider-level configuration and defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::client::ClientError;
use crate::options::TransportOptions;

const DEFAULT_RETRY_COUNT: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Configuration of one provider endpoint.
///
/// Holds the defaults that [`ChatOptions`](crate::options::ChatOptions)
/// fall back to. Built with the `with_*` methods or deserialized from any
/// serde format; the API key is never serialized back out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Provider identifier used in logs (e.g. "openai").
    pub provider: String,

    /// Base URL, e.g. `https://api.openai.com`.
    pub endpoint: String,

    /// Path appended to the endpoint, e.g. `/v1/chat/completions`.
    pub request_path: String,

    /// Default model when the request does not name one.
    pub model: String,

    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_true")]
    pub retry_enabled: bool,

    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Request a usage frame on streams unless the request says otherwise.
    #[serde(default)]
    pub include_usage: bool,

    /// Install the logging interceptor as the outermost layer.
    #[serde(default = "default_true")]
    pub log_enabled: bool,

    /// Malformed stream frames tolerated before the stream is failed.
    /// `None` swallows every malformed frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_parse_error_budget: Option<u32>,

    #[serde(skip)]
    pub transport: TransportOptions,
}

fn default_true() -> bool {
    true
}

fn default_retry_count() -> u32 {
    DEFAULT_RETRY_COUNT
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

impl ChatConfig {
    pub fn new(
        provider: impl Into<String>,
        endpoint: impl Into<String>,
        request_path: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            endpoint: endpoint.into(),
            request_path: request_path.into(),
            model: model.into(),
            api_key: None,
            retry_enabled: true,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            include_usage: false,
            log_enabled: true,
            stream_parse_error_budget: None,
            transport: TransportOptions::default(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_request_path(mut self, request_path: impl Into<String>) -> Self {
        self.request_path = request_path.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_retry(mut self, count: u32, delay: Duration) -> Self {
        self.retry_enabled = true;
        self.retry_count = count;
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.retry_enabled = false;
        self
    }

    pub fn with_include_usage(mut self, include: bool) -> Self {
        self.include_usage = include;
        self
    }

    pub fn with_log_enabled(mut self, enabled: bool) -> Self {
        self.log_enabled = enabled;
        self
    }

    pub fn with_stream_parse_error_budget(mut self, budget: u32) -> Self {
        self.stream_parse_error_budget = Some(budget);
        self
    }

    pub fn with_transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }

    /// Endpoint and request path joined with exactly one slash.
    pub fn full_url(&self) -> String {
        let endpoint = self.endpoint.trim_end_matches('/');
        let path = self.request_path.trim_start_matches('/');
        if path.is_empty() {
            endpoint.to_string()
        } else {
            format!("{endpoint}/{path}")
        }
    }

    /// Check required fields before any network activity.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.api_key.as_deref().map_or(true, |key| key.trim().is_empty()) {
            return Err(ClientError::missing_field("api_key"));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ClientError::missing_field("endpoint"));
        }
        if self.model.trim().is_empty() {
            return Err(ClientError::missing_field("model"));
        }
        if self.api_key.as_deref().is_some_and(has_control_chars) {
            return Err(ClientError::Config(
                "api_key contains control characters".to_string(),
            ));
        }
        if let Some(headers) = self.transport.headers() {
            for (name, value) in headers {
                if has_control_chars(name) || has_control_chars(value) {
                    return Err(ClientError::Config(format!(
                        "header '{}' contains control characters",
                        name.escape_debug()
                    )));
                }
            }
        }
        Ok(())
    }
}

// Header values cannot carry these; a key read from a file often ends in '\n'.
fn has_control_chars(value: &str) -> bool {
    value.chars().any(char::is_control)
}
