mod sender;

pub use sender::{ImageRequestSender, TextRequestSender, build_messages};

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{Config, ImageErrorPolicy, ImageReplay};
use crate::error::ChatError;
use crate::gateway::CompletionClient;
use crate::mode::{Mode, ModelRegistry};
use crate::model::Message;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatOptions {
    /// Overrides the registry's model for the selected mode.
    pub model: Option<String>,
    pub on_image_error: ImageErrorPolicy,
    pub image_replay: ImageReplay,
}

impl ChatOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            model: cfg.model.clone(),
            on_image_error: cfg.on_image_error,
            image_replay: cfg.image_replay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Text { text: String },
    Image { text: String, image_path: PathBuf },
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
        }
    }
}

enum BoundSender<C> {
    Text(TextRequestSender<C>),
    Image(ImageRequestSender<C>),
}

/// One conversation bound to a single mode, model and sender.
pub struct ChatFacade<C> {
    mode: Mode,
    model: String,
    sender: BoundSender<C>,
    image_replay: ImageReplay,
    history: Vec<Message>,
}

impl<C: CompletionClient> ChatFacade<C> {
    pub fn new(client: C, mode_token: &str, options: ChatOptions) -> Result<Self, ChatError> {
        let mode = Mode::parse(mode_token)?;
        Ok(Self::with_mode(client, mode, options))
    }

    pub fn with_mode(client: C, mode: Mode, options: ChatOptions) -> Self {
        let model = options
            .model
            .unwrap_or_else(|| ModelRegistry::primary(mode).to_string());
        let sender = match mode {
            Mode::Text => BoundSender::Text(TextRequestSender::new(client)),
            Mode::Image => {
                BoundSender::Image(ImageRequestSender::new(client, options.on_image_error))
            }
        };
        info!(mode = %mode, model = %model, "chat session initialized");

        Self {
            mode,
            model,
            sender,
            image_replay: options.image_replay,
            history: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub async fn ask_question(
        &mut self,
        text: &str,
        image_path: Option<&Path>,
    ) -> Result<Message, ChatError> {
        let request = match image_path {
            Some(path) => Request::Image {
                text: text.to_string(),
                image_path: path.to_path_buf(),
            },
            None => Request::Text {
                text: text.to_string(),
            },
        };
        self.ask(request).await
    }

    /// Sends one turn. The user message is recorded once the request is
    /// dispatched; the reply is recorded only on success.
    pub async fn ask(&mut self, request: Request) -> Result<Message, ChatError> {
        let prior = self.replay_history();

        let reply = match (&self.sender, request) {
            (BoundSender::Text(sender), Request::Text { text }) => {
                self.history.push(Message::user(text.as_str()));
                debug!(history_len = prior.len(), "dispatching text turn");
                sender.send(&text, &self.model, &prior).await?
            }
            (BoundSender::Image(sender), Request::Image { text, image_path }) => {
                let user = sender.build_user_message(&text, &image_path)?;
                self.history.push(user.clone());
                debug!(
                    history_len = prior.len(),
                    image_path = %image_path.display(),
                    "dispatching image turn"
                );
                sender.send_message(user, &self.model, &prior).await?
            }
            (_, request) => {
                return Err(ChatError::ModeMismatch {
                    mode: self.mode,
                    request: request.kind(),
                });
            }
        };

        self.history.push(reply.clone());
        Ok(reply)
    }

    fn replay_history(&self) -> Vec<Message> {
        match self.image_replay {
            ImageReplay::Full => self.history.clone(),
            ImageReplay::Captions => self.history.iter().map(Message::to_caption).collect(),
        }
    }
}
