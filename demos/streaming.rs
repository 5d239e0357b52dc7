use std::io::Write;
use std::time::Duration;

use chatline::providers::{Provider, Qwen};
use chatline::{
    AiMessage, CancellationToken, ChatClient, ChatContext, ChatOptions, ClientError, Prompt,
    StreamListener,
};
use tracing_subscriber::EnvFilter;

/// Prints deltas as they arrive and a summary at the end.
struct Printer;

impl StreamListener for Printer {
    fn on_start(&mut self, ctx: &ChatContext) {
        println!("[stream {} started]", ctx.id());
    }

    fn on_message(&mut self, _ctx: &ChatContext, message: &AiMessage) {
        if message.finished {
            println!("\n[final: {} chars]", message.full_content.len());
        } else {
            print!("{}", message.content);
            let _ = std::io::stdout().flush();
        }
    }

    fn on_failure(&mut self, _ctx: &ChatContext, error: &ClientError) {
        eprintln!("\n[failed: {error}]");
    }

    fn on_stop(&mut self, _ctx: &ChatContext, message: &AiMessage) {
        println!(
            "[stopped, finish reason {:?}, usage {:?}]",
            message.finish_reason, message.usage
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let api_key = std::env::var("DASHSCOPE_API_KEY")?;
    let client = ChatClient::new(Qwen::config(api_key).with_include_usage(true))?;

    // Stop the stream after ten seconds; the listener still gets the final message.
    let cancel = CancellationToken::new();
    let timer = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        timer.cancel();
    });

    client
        .stream_with_cancel(
            Prompt::user("Write a short poem about Rust."),
            ChatOptions::new().with_temperature(0.7),
            &mut Printer,
            cancel,
        )
        .await?;

    Ok(())
}
