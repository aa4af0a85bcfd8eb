use std::env;

const DEFAULT_API_BASE_URL: &str = "https://api.mistral.ai/v1";
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 1;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 200;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 2_000;

/// What to do when the image for an image request cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageErrorPolicy {
    #[default]
    Abort,
    SendEmpty,
}

impl ImageErrorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::SendEmpty => "send-empty",
        }
    }
}

/// How earlier image turns are replayed to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageReplay {
    #[default]
    Captions,
    Full,
}

impl ImageReplay {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Captions => "captions",
            Self::Full => "full",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub mode: Option<String>,
    pub model: Option<String>,
    pub model_timeout_secs: u64,
    pub retry: RetryPolicy,
    pub on_image_error: ImageErrorPolicy,
    pub image_replay: ImageReplay,
}

// Hand-written so the API key never ends up in logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("mode", &self.mode)
            .field("model", &self.model)
            .field("model_timeout_secs", &self.model_timeout_secs)
            .field("retry", &self.retry)
            .field("on_image_error", &self.on_image_error)
            .field("image_replay", &self.image_replay)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        let retry = RetryPolicy {
            max_attempts: parse_retry_max_attempts(get_var("RETRY_MAX_ATTEMPTS").as_deref()),
            base_delay_ms: parse_positive_u64(
                get_var("RETRY_BASE_DELAY_MS").as_deref(),
                DEFAULT_RETRY_BASE_DELAY_MS,
            ),
            max_delay_ms: parse_positive_u64(
                get_var("RETRY_MAX_DELAY_MS").as_deref(),
                DEFAULT_RETRY_MAX_DELAY_MS,
            ),
        };

        Self {
            api_key: non_empty(get_var("MISTRAL_API_KEY")),
            api_base_url: non_empty(get_var("MISTRAL_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            mode: non_empty(get_var("CHAT_MODE")),
            model: non_empty(get_var("MODEL")),
            model_timeout_secs: parse_positive_u64(
                get_var("MODEL_TIMEOUT_SECS").as_deref(),
                DEFAULT_MODEL_TIMEOUT_SECS,
            ),
            retry,
            on_image_error: parse_image_error_policy(get_var("ON_IMAGE_ERROR").as_deref()),
            image_replay: parse_image_replay(get_var("HISTORY_IMAGE_REPLAY").as_deref()),
        }
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_positive_u64(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_retry_max_attempts(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS)
}

fn parse_image_error_policy(raw: Option<&str>) -> ImageErrorPolicy {
    match raw.unwrap_or("abort").trim().to_ascii_lowercase().as_str() {
        "send-empty" | "send_empty" | "proceed" => ImageErrorPolicy::SendEmpty,
        _ => ImageErrorPolicy::Abort,
    }
}

fn parse_image_replay(raw: Option<&str>) -> ImageReplay {
    match raw.unwrap_or("captions").trim().to_ascii_lowercase().as_str() {
        "full" => ImageReplay::Full,
        _ => ImageReplay::Captions,
    }
}
