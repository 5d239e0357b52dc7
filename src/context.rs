//! State scoped to one logical chat operation.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ChatConfig;
use crate::model::Prompt;
use crate::options::ChatOptions;
use crate::request::RequestDescriptor;

/// Everything one operation carries through the interceptor chain and the
/// terminal call.
///
/// A context is created per call and passed explicitly; it is never shared
/// between concurrent operations and is dropped when the call returns.
#[derive(Debug)]
pub struct ChatContext {
    id: Uuid,
    prompt: Prompt,
    options: ChatOptions,
    config: Arc<ChatConfig>,
    request: RequestDescriptor,
    cancel: CancellationToken,
}

impl ChatContext {
    /// Build the request descriptor and open a new context.
    pub fn new(prompt: Prompt, options: ChatOptions, config: Arc<ChatConfig>) -> Self {
        Self::with_cancellation(prompt, options, config, CancellationToken::new())
    }

    pub fn with_cancellation(
        prompt: Prompt,
        options: ChatOptions,
        config: Arc<ChatConfig>,
        cancel: CancellationToken,
    ) -> Self {
        let request = RequestDescriptor::build(&prompt, &options, &config);
        Self {
            id: Uuid::new_v4(),
            prompt,
            options,
            config,
            request,
            cancel,
        }
    }

    /// Identifier of this operation, used to correlate log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn request(&self) -> &RequestDescriptor {
        &self.request
    }

    /// Swap in a different request, e.g. after an interceptor refreshed
    /// credentials. The descriptor itself stays immutable.
    pub fn replace_request(&mut self, request: RequestDescriptor) -> RequestDescriptor {
        std::mem::replace(&mut self.request, request)
    }

    pub fn is_stream(&self) -> bool {
        self.options.stream
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}
