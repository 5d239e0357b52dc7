//! DeepSeek API.

use crate::config::ChatConfig;
use crate::providers::Provider;

pub struct DeepSeek;

impl Provider for DeepSeek {
    fn config(api_key: impl Into<String>) -> ChatConfig {
        ChatConfig::new(
            "deepseek",
            "https://api.deepseek.com",
            "/chat/completions",
            "deepseek-chat",
        )
        .with_api_key(api_key)
    }
}
