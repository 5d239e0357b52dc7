//! # chatline
//!
//! A request pipeline for OpenAI-compatible chat completion APIs.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Interceptor chain around both synchronous and streaming calls
//! - Bounded retries with a fixed delay, cancellable
//! - Server-Sent Events aggregated into deltas plus one final message
//! - Per-call context, safe under concurrent use of one client
//!
//! ## Architecture
//!
//! 1. **[`ChatConfig`]** holds provider defaults; [`ChatOptions`] overrides them per call.
//! 2. **[`RequestDescriptor`]** is the immutable request built from both.
//! 3. **[`ChatContext`]** carries one operation through the [`InterceptorChain`].
//! 4. The terminal call goes through a [`Transport`] with the request's [`RetryPolicy`].
//! 5. Streams are folded by a [`StreamAggregator`] into [`StreamListener`] events.
//!
//! ## Example
//! ```no_run
//! use chatline::{ChatClient, ChatModel, ChatOptions, Prompt};
//! use chatline::providers::{OpenAi, Provider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ChatClient::new(OpenAi::config("your-api-key"))?;
//!
//!     let response = client
//!         .call(Prompt::user("Hello!"), ChatOptions::new().with_temperature(0.2))
//!         .await?;
//!     println!("{}", response.content());
//!
//!     let message = client
//!         .stream(Prompt::user("Tell me a story"), |delta| print!("{delta}"), ChatOptions::new())
//!         .await?;
//!     println!("\n{} chars", message.text().len());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod context;
pub mod http;
pub mod interceptor;
pub mod model;
pub mod options;
pub mod providers;
pub mod request;
pub mod retry;
pub mod sse;
pub mod stream;

pub use client::{ChatClient, ChatModel, ClientError, TransportTerminal};
pub use config::ChatConfig;
pub use context::ChatContext;
pub use http::{HttpTransport, PayloadStream, Transport};
pub use interceptor::{ChatInterceptor, InterceptorChain, LoggingInterceptor, Next, StreamNext, Terminal};
pub use model::{AiMessage, ChatResponse, FinishReason, Message, Prompt, Role, Usage};
pub use options::{ChatOptions, TransportOptions};
pub use request::RequestDescriptor;
pub use retry::RetryPolicy;
pub use stream::{DeltaListener, StreamAggregator, StreamListener, StreamState};

// Re-export so callers can cancel streams without naming tokio-util.
pub use tokio_util::sync::CancellationToken;
