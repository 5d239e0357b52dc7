//! Presets for OpenAI-compatible providers.

use crate::client::{ChatClient, ClientError};
use crate::config::ChatConfig;
use crate::options::TransportOptions;

/// A provider endpoint with known defaults.
pub trait Provider {
    /// Configuration with the provider's endpoint, path and default model.
    fn config(api_key: impl Into<String>) -> ChatConfig;

    /// Create a client with the provider defaults.
    fn create(api_key: impl Into<String>) -> Result<ChatClient, ClientError> {
        ChatClient::new(Self::config(api_key))
    }

    /// Create a client for a specific model and transport.
    fn create_with_options(
        api_key: impl Into<String>,
        model: impl Into<String>,
        transport_options: TransportOptions,
    ) -> Result<ChatClient, ClientError> {
        ChatClient::new(
            Self::config(api_key)
                .with_model(model)
                .with_transport(transport_options),
        )
    }
}

pub mod deepseek;
pub mod groq;
pub mod openai;
pub mod qwen;

pub use deepseek::DeepSeek;
pub use groq::Groq;
pub use openai::OpenAi;
pub use qwen::Qwen;
