use std::fmt;

use crate::error::ChatError;

const TEXT_MODELS: &[&str] = &["mistral-large-latest"];
const IMAGE_MODELS: &[&str] = &["pixtral-12b-2409"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Text,
    Image,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    /// Accepts `text` or `image`, ignoring case and surrounding whitespace.
    pub fn parse(token: &str) -> Result<Self, ChatError> {
        match token.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            _ => Err(ChatError::InvalidMode(token.trim().to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static model candidates per mode. Only the first entry is used by default.
pub struct ModelRegistry;

impl ModelRegistry {
    pub fn candidates(mode: Mode) -> &'static [&'static str] {
        match mode {
            Mode::Text => TEXT_MODELS,
            Mode::Image => IMAGE_MODELS,
        }
    }

    pub fn primary(mode: Mode) -> &'static str {
        Self::candidates(mode)[0]
    }
}
