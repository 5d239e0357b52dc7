//! Alibaba DashScope in OpenAI-compatible mode.

use crate::config::ChatConfig;
use crate::providers::Provider;

pub struct Qwen;

impl Provider for Qwen {
    fn config(api_key: impl Into<String>) -> ChatConfig {
        ChatConfig::new(
            "qwen",
            "https://dashscope.aliyuncs.com",
            "/compatible-mode/v1/chat/completions",
            "qwen-turbo",
        )
        .with_api_key(api_key)
    }
}
