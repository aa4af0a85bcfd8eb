use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::UpstreamError;
use crate::model::Message;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub content: String,
}

pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompletionResponse, UpstreamError>> + 'a>>;

/// A remote chat-completion endpoint.
pub trait CompletionClient {
    fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a>;
}

impl<T> CompletionClient for &T
where
    T: CompletionClient + ?Sized,
{
    fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a> {
        (**self).complete(request)
    }
}

/// Retries retryable upstream failures with capped exponential backoff.
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C> RetryingClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

fn backoff_delay(policy: &RetryPolicy, attempt_index: u32) -> Duration {
    let delay = policy
        .base_delay_ms
        .saturating_mul(1u64 << attempt_index.min(16))
        .min(policy.max_delay_ms);
    Duration::from_millis(delay)
}

impl<C> CompletionClient for RetryingClient<C>
where
    C: CompletionClient,
{
    fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(async move {
            let max_attempts = self.policy.max_attempts.max(1);
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                match self.inner.complete(request.clone()).await {
                    Ok(response) => {
                        if attempt > 1 {
                            debug!(attempt, "completion request succeeded after retry");
                        }
                        return Ok(response);
                    }
                    Err(err) if attempt < max_attempts && err.is_retryable() => {
                        let delay = backoff_delay(&self.policy, attempt - 1);
                        warn!(
                            attempt,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "completion request failed; retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(err) => return Err(err),
                }
            }
        })
    }
}
