use std::time::Duration;

use chatline::providers::{OpenAi, Provider};
use chatline::{ChatClient, ChatModel, ChatOptions, Prompt};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=chatline=debug shows the pipeline's request and retry logs.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // ============================================================================================
    // Step 1: Configure the provider
    // ============================================================================================
    // A preset fills in endpoint, path and default model. Everything on `ChatConfig` is a
    // default that per-call `ChatOptions` may override.
    let api_key = std::env::var("OPENAI_API_KEY")?;
    let config = OpenAi::config(api_key).with_retry(2, Duration::from_millis(500));
    let client = ChatClient::new(config)?;

    // ============================================================================================
    // Step 2: Send the request
    // ============================================================================================
    let prompt = Prompt::user("Explain quantum computing in one sentence.")
        .with_system("You are a concise assistant.");
    let options = ChatOptions::new().with_temperature(0.3).with_max_tokens(100);

    println!("Sending request...");
    match client.call(prompt, options).await {
        Ok(response) => {
            println!("Response: {}", response.content());
            if let Some(usage) = response.usage {
                println!(
                    "Tokens: {} prompt + {} completion",
                    usage.prompt_tokens, usage.completion_tokens
                );
            }
        }
        Err(err) if err.is_rate_limit() => eprintln!("Rate limited: {err}"),
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
