//! Timeout and retry policy for remote calls

use std::future::Future;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};
use rvw_core::{CallPolicyConfig, Result, RvwError};

/// Per-attempt timeout plus bounded exponential backoff.
///
/// Only errors for which [`RvwError::is_retryable`] holds are retried; the
/// last error is returned once `max_attempts` is spent.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::from_config(&CallPolicyConfig::default())
    }
}

impl CallPolicy {
    pub fn from_config(config: &CallPolicyConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Single attempt bounded by `timeout`
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            timeout,
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_delay,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Run `operation` under this policy
    pub async fn run<F, Fut, T>(&self, service: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = self.backoff();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = match tokio::time::timeout(self.timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(RvwError::Timeout {
                    service: service.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                }),
            };

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_retryable() || attempt >= self.max_attempts {
                return Err(error);
            }

            let delay = backoff.next_backoff().unwrap_or(self.max_delay);
            tracing::warn!(
                service,
                attempt,
                max_attempts = self.max_attempts,
                ?delay,
                error = %error,
                "Retryable failure, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(max_attempts: usize) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_millis(200),
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicUsize::new(0);
        let result = fast_policy(3)
            .run("llm", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(RvwError::remote_status("llm", 503, "busy"))
                } else {
                    Ok("answer")
                }
            })
            .await;

        assert_eq!(tokio_test::assert_ok!(result), "answer");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = fast_policy(3)
            .run("llm", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RvwError::remote_status("llm", 429, "slow down"))
            })
            .await;

        assert!(matches!(
            result,
            Err(RvwError::RemoteService { status: Some(429), .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = fast_policy(5)
            .run("llm", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RvwError::remote_status("llm", 401, "bad key"))
            })
            .await;

        tokio_test::assert_err!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let calls = AtomicUsize::new(0);
        let policy = CallPolicy {
            timeout: Duration::from_millis(10),
            ..fast_policy(2)
        };
        let result: Result<()> = policy
            .run("vector-store", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        match result {
            Err(RvwError::Timeout {
                service,
                timeout_ms,
            }) => {
                assert_eq!(service, "vector-store");
                assert_eq!(timeout_ms, 10);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_from_config_clamps_attempts() {
        let policy = CallPolicy::from_config(&CallPolicyConfig {
            max_attempts: 0,
            ..Default::default()
        });
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.timeout, Duration::from_secs(30));
        assert_eq!(CallPolicy::no_retry(Duration::from_secs(1)).max_attempts, 1);
    }
}
