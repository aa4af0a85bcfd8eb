use thiserror::Error;

use crate::image::ImageReadError;
use crate::mode::Mode;

/// Failure talking to the remote completion API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(
        "Model request timed out after {timeout_secs}s while calling '{url}'. \
         Increase MODEL_TIMEOUT_SECS or check API responsiveness."
    )]
    Timeout { url: String, timeout_secs: u64 },

    #[error(
        "Connection refused by completion API at '{url}'. \
         Ensure MISTRAL_BASE_URL points at a running service."
    )]
    ConnectionRefused { url: String },

    #[error(
        "Failed to connect to completion API at '{url}'. \
         Check MISTRAL_BASE_URL and network connectivity."
    )]
    Connect { url: String },

    #[error("Failed to call completion API at '{url}': {message}")]
    Transport { url: String, message: String },

    #[error("Completion API rejected the credentials (status {status}). Check MISTRAL_API_KEY: {body}")]
    Unauthorized { status: u16, body: String },

    #[error("Completion API rate limit reached (status 429): {body}")]
    RateLimited { body: String },

    #[error("Completion request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse completion response: {0}")]
    Malformed(String),

    #[error("Completion response contained no choices")]
    EmptyChoices,
}

impl UpstreamError {
    /// Whether a later attempt with the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. }
            | Self::ConnectionRefused { .. }
            | Self::Connect { .. }
            | Self::Transport { .. }
            | Self::RateLimited { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Unauthorized { .. } | Self::Malformed(_) | Self::EmptyChoices => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid mode '{0}': expected 'text' or 'image'")]
    InvalidMode(String),

    #[error("{request} request cannot be sent in {mode} mode")]
    ModeMismatch { mode: Mode, request: &'static str },

    #[error(transparent)]
    ImageRead(#[from] ImageReadError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}
