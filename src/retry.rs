//! Shared exponential-backoff retry policy (spec §4.5, §4.7): 3 attempts,
//! initial delay 1s, factor 2, capped at 30s, retried only on 5xx/429/network
//! errors. `Retry-After` is honored when present (passed in by the caller).

use std::time::Duration;

use tracing::{debug, warn};

pub const MAX_ATTEMPTS: u32 = 3;
const INITIAL_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(30);
const BACKOFF_FACTOR: u32 = 2;

pub fn backoff_delay(attempt: u32) -> Duration {
    let multiplier = BACKOFF_FACTOR.saturating_pow(attempt);
    std::cmp::min(INITIAL_DELAY.saturating_mul(multiplier), MAX_DELAY)
}

/// Whether a failure is transient and thus worth retrying.
pub trait Retryable {
    fn should_retry(&self) -> bool;
    /// `Retry-After`, when the failure carried one (e.g. HTTP 429).
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Runs `operation` up to [`MAX_ATTEMPTS`] times, sleeping with exponential
/// backoff between attempts (or the error's own `Retry-After`, if larger).
pub async fn with_retry<T, E, F, Fut>(label: &str, mut operation: F) -> Result<T, E>
where
    E: Retryable,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < MAX_ATTEMPTS && err.should_retry() => {
                let delay = err.retry_after().unwrap_or_else(|| backoff_delay(attempt));
                warn!(%label, attempt = attempt + 1, ?delay, "transient failure, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                debug!(%label, attempt = attempt + 1, "giving up after retries");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_delay_grows_exponentially_and_caps_at_30s() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(10), Duration::from_secs(30));
    }

    #[derive(Debug)]
    struct FlakyError;

    impl Retryable for FlakyError {
        fn should_retry(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let mut remaining = 2;
        let result: Result<u32, FlakyError> = with_retry("test", || {
            let succeed = remaining == 0;
            if !succeed {
                remaining -= 1;
            }
            async move { if succeed { Ok(7) } else { Err(FlakyError) } }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let result: Result<u32, FlakyError> = with_retry("test", || async { Err(FlakyError) }).await;
        assert!(result.is_err());
    }
}
