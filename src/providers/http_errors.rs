use reqwest::StatusCode;
use std::error::Error as StdError;
use std::io::ErrorKind;

use crate::error::UpstreamError;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Walks the source chain looking for an io error of `kind` or a message containing `needle`.
fn error_chain_matches(err: &(dyn StdError + 'static), kind: ErrorKind, needle: &str) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == kind
        {
            return true;
        }

        if source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    error_chain_matches(err, ErrorKind::ConnectionRefused, "connection refused")
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    error_chain_matches(err, ErrorKind::TimedOut, "timed out")
}

pub(crate) fn request_error(err: reqwest::Error, api_url: &str, timeout_secs: u64) -> UpstreamError {
    if err.is_timeout() || error_chain_has_timeout(&err) {
        return UpstreamError::Timeout {
            url: api_url.to_string(),
            timeout_secs,
        };
    }

    if err.is_connect() {
        if error_chain_has_connection_refused(&err) {
            return UpstreamError::ConnectionRefused {
                url: api_url.to_string(),
            };
        }
        return UpstreamError::Connect {
            url: api_url.to_string(),
        };
    }

    UpstreamError::Transport {
        url: api_url.to_string(),
        message: err.to_string(),
    }
}

pub(crate) fn status_error(status: StatusCode, body: &str) -> UpstreamError {
    let body = truncate_body(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamError::Unauthorized {
            status: status.as_u16(),
            body,
        },
        StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited { body },
        _ => UpstreamError::Status {
            status: status.as_u16(),
            body,
        },
    }
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    out.push_str("...");
    out
}
