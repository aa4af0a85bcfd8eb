//! Canned, non-interactive demonstration against the real Mistral API.
//!
//! ```bash
//! export MISTRAL_API_KEY=...
//! cargo run --example canned_run            # text mode
//! cargo run --example canned_run -- image   # image mode, reads ./image.jpg
//! ```

use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;

use mistchat::chat::{ChatFacade, ChatOptions};
use mistchat::config::Config;
use mistchat::gateway::RetryingClient;
use mistchat::mode::Mode;
use mistchat::providers::mistral::MistralClient;

const DEMO_QUESTION: &str = "Tell me a short fact about the mistral wind.";
const DEMO_IMAGE_PATH: &str = "image.jpg";
const DEMO_IMAGE_CAPTION: &str = "What is shown in this picture?";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = mistchat::logging::init();

    let cfg = Config::from_env();
    let mode_token = std::env::args().nth(1).unwrap_or_else(|| "text".to_string());
    let api_key = cfg.api_key.clone().context("MISTRAL_API_KEY is not set")?;
    let http = Client::builder()
        .timeout(Duration::from_secs(cfg.model_timeout_secs))
        .build()
        .context("Failed to initialize HTTP client")?;
    let client = RetryingClient::new(
        MistralClient::new(http, api_key, cfg.api_base_url.clone(), cfg.model_timeout_secs),
        cfg.retry.clone(),
    );
    let mut chat = ChatFacade::new(client, &mode_token, ChatOptions::from_config(&cfg))?;

    let reply = match chat.mode() {
        Mode::Text => chat.ask_question(DEMO_QUESTION, None).await?,
        Mode::Image => {
            chat.ask_question(DEMO_IMAGE_CAPTION, Some(Path::new(DEMO_IMAGE_PATH)))
                .await?
        }
    };
    println!("{}", reply.content);
    Ok(())
}
