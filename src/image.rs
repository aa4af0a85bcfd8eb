use base64::{Engine as _, engine::general_purpose};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Error)]
pub enum ImageReadError {
    #[error("image file '{}' does not exist", .path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read image file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ImageReadError {
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound { path } | Self::Io { path, .. } => path,
        }
    }
}

/// Reads the whole file at `path` and returns it as standard, padded base64.
pub fn encode_image(path: &Path) -> Result<String, ImageReadError> {
    let bytes = fs::read(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ImageReadError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ImageReadError::Io {
            path: path.to_path_buf(),
            source: err,
        },
    })?;

    debug!(path = %path.display(), byte_len = bytes.len(), "encoded image file");
    Ok(general_purpose::STANDARD.encode(bytes))
}

/// The media type is always reported as JPEG.
pub fn jpeg_data_url(encoded: &str) -> String {
    format!("{JPEG_DATA_URL_PREFIX}{encoded}")
}
