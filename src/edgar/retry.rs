// src/edgar/retry.rs
use crate::utils::error::EdgarError;
use std::future::Future;
use std::time::Duration;

/// Bounded retry with exponential backoff for EDGAR requests.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each attempt after that.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Runs `op` until it succeeds, fails permanently, or the attempt budget runs out.
/// Only errors for which [`EdgarError::is_transient`] holds are retried.
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T, EdgarError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EdgarError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if attempt >= max_attempts => {
                tracing::error!("{} failed after {} attempts: {}", what, attempt, e);
                return Err(EdgarError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what,
                    attempt,
                    max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = tokio_test::block_on(retry_with_backoff(fast_policy(3), "test", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(EdgarError::RateLimited)
                } else {
                    Ok(n)
                }
            }
        }));
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = tokio_test::block_on(retry_with_backoff(fast_policy(5), "test", || {
            calls.set(calls.get() + 1);
            async { Err(EdgarError::FilingDocNotFound("gone".into())) }
        }));
        assert!(matches!(result, Err(EdgarError::FilingDocNotFound(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_reports_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), _> = retry_with_backoff(fast_policy(2), "test", || {
            calls.set(calls.get() + 1);
            async { Err(EdgarError::Http(reqwest::StatusCode::SERVICE_UNAVAILABLE)) }
        })
        .await;
        match result {
            Err(EdgarError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, EdgarError::Http(_)));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(calls.get(), 2);
    }
}
