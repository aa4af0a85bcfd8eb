pub mod chat;
pub mod config;
pub mod error;
pub mod gateway;
pub mod image;
pub mod logging;
pub mod mode;
pub mod model;
pub mod providers;
pub mod repl;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use chat::{ChatFacade, ChatOptions, Request};
use config::Config;
use gateway::RetryingClient;
use mode::Mode;
use providers::mistral::MistralClient;
use repl::{prompt_mode, run_repl};

#[derive(Debug, Parser)]
#[command(name = "mistchat", about = "Chat with Mistral models from the terminal")]
pub struct Cli {
    /// Conversation mode: `text` or `image`. Falls back to CHAT_MODE, then a prompt.
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Image to attach to a one-shot question (image mode only)
    #[arg(short, long, requires = "prompt")]
    pub image: Option<PathBuf>,

    /// Question to ask once; starts an interactive session when omitted
    pub prompt: Vec<String>,
}

impl Cli {
    fn request(&self) -> Option<Request> {
        if self.prompt.is_empty() {
            return None;
        }
        let text = self.prompt.join(" ");
        Some(match &self.image {
            Some(image_path) => Request::Image {
                text,
                image_path: image_path.clone(),
            },
            None => Request::Text { text },
        })
    }
}

/// Expects `.env` to be loaded by the caller, before logging is initialized.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::from_env();
    info!(
        api_base_url = %cfg.api_base_url,
        api_key_set = cfg.api_key.is_some(),
        model_timeout_secs = cfg.model_timeout_secs,
        retry_max_attempts = cfg.retry.max_attempts,
        on_image_error = cfg.on_image_error.as_str(),
        image_replay = cfg.image_replay.as_str(),
        "loaded runtime configuration"
    );

    let mode_token = match cli.mode.clone().or_else(|| cfg.mode.clone()) {
        Some(token) => token,
        None => prompt_mode()?,
    };
    let mode = Mode::parse(&mode_token)?;
    let api_key = cfg
        .api_key
        .clone()
        .context("MISTRAL_API_KEY is not set. Export it or add it to .env.")?;

    let http = Client::builder()
        .timeout(Duration::from_secs(cfg.model_timeout_secs))
        .build()
        .context("Failed to initialize HTTP client")?;
    let client = RetryingClient::new(
        MistralClient::new(http, api_key, cfg.api_base_url.clone(), cfg.model_timeout_secs),
        cfg.retry.clone(),
    );
    let mut chat = ChatFacade::with_mode(client, mode, ChatOptions::from_config(&cfg));

    match cli.request() {
        Some(request) => {
            let reply = chat.ask(request).await?;
            println!("{}", reply.content.to_string().trim());
            Ok(())
        }
        None => run_repl(&mut chat).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use std::path::PathBuf;

    use super::Cli;
    use crate::chat::Request;

    #[test]
    fn cli_without_prompt_starts_interactive_session() {
        let cli = Cli::parse_from(["mistchat", "--mode", "text"]);
        assert_eq!(cli.mode.as_deref(), Some("text"));
        assert!(cli.request().is_none());
    }

    #[test]
    fn cli_joins_prompt_words_into_text_request() {
        let cli = Cli::parse_from(["mistchat", "what", "is", "rust?"]);
        assert_eq!(
            cli.request(),
            Some(Request::Text {
                text: "what is rust?".to_string()
            })
        );
    }

    #[test]
    fn cli_image_flag_requires_a_prompt() {
        let err = Cli::try_parse_from(["mistchat", "--mode", "image", "--image", "cat.jpg"])
            .expect_err("an image without a question should be rejected");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn cli_image_flag_builds_image_request() {
        let cli = Cli::parse_from(["mistchat", "-m", "image", "-i", "cat.jpg", "describe", "it"]);
        assert_eq!(
            cli.request(),
            Some(Request::Image {
                text: "describe it".to_string(),
                image_path: PathBuf::from("cat.jpg"),
            })
        );
    }
}
