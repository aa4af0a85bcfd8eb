use std::path::Path;
use tracing::warn;

use crate::config::ImageErrorPolicy;
use crate::error::{ChatError, UpstreamError};
use crate::gateway::{CompletionClient, CompletionRequest};
use crate::image::{encode_image, jpeg_data_url};
use crate::model::Message;

/// Prior turns in order, followed by the new user message.
pub fn build_messages(history: &[Message], user: Message) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.extend_from_slice(history);
    messages.push(user);
    messages
}

async fn dispatch<C: CompletionClient>(
    client: &C,
    model: &str,
    history: &[Message],
    user: Message,
) -> Result<Message, UpstreamError> {
    let response = client
        .complete(CompletionRequest {
            model: model.to_string(),
            messages: build_messages(history, user),
        })
        .await?;
    Ok(Message::assistant(response.content))
}

pub struct TextRequestSender<C> {
    client: C,
}

impl<C: CompletionClient> TextRequestSender<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub async fn send(
        &self,
        text: &str,
        model: &str,
        history: &[Message],
    ) -> Result<Message, UpstreamError> {
        dispatch(&self.client, model, history, Message::user(text)).await
    }
}

pub struct ImageRequestSender<C> {
    client: C,
    on_image_error: ImageErrorPolicy,
}

impl<C: CompletionClient> ImageRequestSender<C> {
    pub fn new(client: C, on_image_error: ImageErrorPolicy) -> Self {
        Self {
            client,
            on_image_error,
        }
    }

    /// Encodes the image and pairs it with `text` in a single user message.
    pub fn build_user_message(&self, text: &str, image_path: &Path) -> Result<Message, ChatError> {
        let encoded = match encode_image(image_path) {
            Ok(encoded) => encoded,
            Err(err) => match self.on_image_error {
                ImageErrorPolicy::Abort => return Err(err.into()),
                ImageErrorPolicy::SendEmpty => {
                    warn!(
                        path = %err.path().display(),
                        error = %err,
                        "image could not be read; sending empty image payload"
                    );
                    String::new()
                }
            },
        };
        Ok(Message::user_with_image(text, jpeg_data_url(&encoded)))
    }

    pub async fn send_message(
        &self,
        user: Message,
        model: &str,
        history: &[Message],
    ) -> Result<Message, UpstreamError> {
        dispatch(&self.client, model, history, user).await
    }

    pub async fn send(
        &self,
        text: &str,
        image_path: &Path,
        model: &str,
        history: &[Message],
    ) -> Result<Message, ChatError> {
        let user = self.build_user_message(text, image_path)?;
        Ok(self.send_message(user, model, history).await?)
    }
}
