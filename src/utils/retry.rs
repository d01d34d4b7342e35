//! 调用方重试机制
//!
//! The pool never retries on its own. Callers that want to ride out a
//! transient `BackendUnavailable` wrap their call here; every other error is
//! returned immediately.

use crate::error::{PoolError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{error, info, warn};

/// 指数退避参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up after the first failure
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Un-jittered delays: `base_delay`, doubling, capped at `max_delay`
    ///
    /// `ExponentialBackoff` with base 2 yields `factor * 2^n` milliseconds,
    /// starting at n = 1.
    pub fn backoff(&self) -> impl Iterator<Item = Duration> {
        let half_base = (self.base_delay.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(half_base)
            .max_delay(self.max_delay)
            .take(self.max_retries as usize)
    }
}

/// Run `operation`, retrying retryable failures with jittered exponential backoff
///
/// # 示例
///
/// ```ignore
/// let stored = retry_async(&RetryPolicy::default(), "add_resource", || {
///     controller.add_resource(File::open(&path)?, descriptor)
/// })
/// .await?;
/// ```
pub async fn retry_async<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts: u32 = 0;
    let strategy = policy.backoff().map(jitter);

    let outcome = RetryIf::spawn(
        strategy,
        || {
            attempts += 1;
            let attempt = attempts;
            let fut = operation();
            async move {
                let result = fut.await;
                if let Err(ref e) = result {
                    warn!(
                        operation = %operation_name,
                        attempt,
                        error = %e,
                        "Operation attempt failed"
                    );
                }
                result
            }
        },
        |e: &PoolError| e.is_retryable(),
    )
    .await;

    match &outcome {
        Ok(_) if attempts > 1 => info!(
            operation = %operation_name,
            retries = attempts - 1,
            "Operation succeeded after retries"
        ),
        Ok(_) => {}
        Err(e) => error!(
            operation = %operation_name,
            attempts,
            error = %e,
            "Operation failed"
        ),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PoolError;
    use std::cell::Cell;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 8,
            ..RetryPolicy::default()
        };
        let delays: Vec<_> = policy.backoff().collect();
        assert_eq!(delays.len(), 8);
        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[2], Duration::from_millis(400));
        assert_eq!(delays[7], Duration::from_secs(5));

        assert_eq!(RetryPolicy::none().backoff().count(), 0);
    }

    #[tokio::test]
    async fn test_none_policy_makes_a_single_attempt() {
        let attempts = Cell::new(0);
        let result: Result<()> = retry_async(&RetryPolicy::none(), "test_none", || {
            attempts.set(attempts.get() + 1);
            async { Err(PoolError::backend_unavailable("connection refused", None)) }
        })
        .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let attempts = Cell::new(0);
        let result = retry_async(&fast_policy(), "test_retry", || {
            attempts.set(attempts.get() + 1);
            let current = attempts.get();
            async move {
                if current < 3 {
                    Err(PoolError::backend_unavailable("connection refused", None))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_returned_at_once() {
        let attempts = Cell::new(0);
        let result: Result<()> = retry_async(&fast_policy(), "test_non_retryable", || {
            attempts.set(attempts.get() + 1);
            async { Err(PoolError::size_exceeded(2000, 1024)) }
        })
        .await;

        assert!(matches!(result, Err(PoolError::SizeExceeded { .. })));
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let attempts = Cell::new(0);
        let result: Result<()> = retry_async(&fast_policy(), "test_exhausted", || {
            attempts.set(attempts.get() + 1);
            async { Err(PoolError::backend_unavailable("timeout", None)) }
        })
        .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(attempts.get(), 4);
    }
}
