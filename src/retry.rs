use std::future::Future;
use std::time::Duration;
use crate::logger::*;

/// Bounded retry with exponential backoff for remote calls.
///
/// Each attempt runs under `call_timeout`; a timed-out attempt counts as a
/// transient failure. After `max_attempts` the last error is returned.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            call_timeout: Duration::from_secs(2),
        }
    }
}

/// Failure of a retried call: either the operation's own error or a timeout.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("{0}")]
    Failed(E),
    #[error("{op} timed out after {attempts} attempt(s)")]
    TimedOut { op: &'static str, attempts: u32 },
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub async fn run<T, E, F, Fut>(
        &self,
        op: &'static str,
        is_transient: impl Fn(&E) -> bool,
        mut call: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(self.call_timeout, call()).await;
            let retryable = match &outcome {
                Ok(Ok(_)) => false,
                Ok(Err(e)) => is_transient(e),
                Err(_) => true,
            };
            if !retryable || attempt >= max_attempts {
                return match outcome {
                    Ok(Ok(v)) => Ok(v),
                    Ok(Err(e)) => Err(RetryError::Failed(e)),
                    Err(_) => Err(RetryError::TimedOut {
                        op,
                        attempts: attempt,
                    }),
                };
            }
            let delay = self.delay_for(attempt);
            match &outcome {
                Ok(Err(e)) => warn!(op, attempt, ?delay, "transient failure, retrying: {}", e),
                _ => warn!(op, attempt, ?delay, "call timed out, retrying"),
            }
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            call_timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            call_timeout: Duration::from_secs(1),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<u32, RetryError<String>> = fast_policy(5)
            .run("flaky", |_| true, move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(format!("boom {n}")) } else { Ok(n) }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), RetryError<String>> = fast_policy(3)
            .run("down", |_| true, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("unreachable".to_string())
            })
            .await;
        assert!(matches!(result, Err(RetryError::Failed(ref e)) if e == "unreachable"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), RetryError<String>> = fast_policy(5)
            .run("missing", |_| false, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("not found".to_string())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hung_calls_time_out() {
        let policy = RetryPolicy {
            call_timeout: Duration::from_millis(10),
            ..fast_policy(2)
        };
        let result: Result<(), RetryError<String>> = policy
            .run("hang", |_| true, || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(RetryError::TimedOut { attempts: 2, .. })));
    }
}
