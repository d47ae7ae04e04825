use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn bounded(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn forever(delay: Duration) -> Self {
        Self {
            attempts: u32::MAX,
            delay,
        }
    }
}

/// Runs `f` until it succeeds or the policy's attempts are used up, returning
/// the last error in the latter case.
pub async fn retry<T, E, F, Fut>(what: &str, policy: RetryPolicy, f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    tryhard::retry_fn(f)
        .retries(policy.attempts - 1)
        .fixed_backoff(policy.delay)
        .on_retry(|attempt: u32, _next: Option<Duration>, error: &E| {
            tracing::warn!("{what} failed (attempt {attempt}): {error}");
            futures::future::ready(())
        })
        .await
}
