//! Retry/concurrency kernel.
//!
//! Three primitives drive every suspending call the engines make:
//! `with_timeout` bounds an operation, `with_retry` applies the
//! classified-error retry policy, and `bounded_parallel` fans work out
//! under a concurrency ceiling without letting one failure abort the rest.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

/// Retry policy: exponential backoff over classified errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Sleep before attempt `n+1` is `base_delay * 2^(n-1)`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Bound an operation to `duration`.
///
/// The future is dropped on expiry, so a cancelled operation cannot emit
/// further side effects observable to the caller.
pub async fn with_timeout<T, E, Fut>(duration: Duration, fut: Fut) -> PipelineResult<T>
where
    Fut: Future<Output = Result<T, E>>,
    PipelineError: From<E>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result.map_err(PipelineError::from),
        Err(_) => Err(PipelineError::Timeout(duration.as_secs())),
    }
}

/// Invoke `op` up to `policy.max_attempts` times.
///
/// `content_policy` and `bad_output` are terminal; `provider_quota` is
/// retried at most once; everything else follows the kind's
/// retryability.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    op: F,
) -> PipelineResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = PipelineResult<T>>,
{
    let mut quota_failures = 0u32;

    for attempt in 1..=policy.max_attempts.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let kind = e.kind();
                let quota_exhausted = kind.is_quota() && quota_failures >= 1;
                if kind.is_quota() {
                    quota_failures += 1;
                }

                if !kind.is_retryable() || quota_exhausted || attempt >= policy.max_attempts {
                    return Err(e);
                }

                let delay = policy.delay_after(attempt);
                debug!(
                    operation,
                    attempt,
                    kind = %kind,
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed, retrying: {}",
                    e
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    unreachable!("retry loop returns from its final attempt")
}

/// Dispatch `tasks` with at most `max_in_flight` running concurrently.
///
/// Results come back at their task's index; a failing task records its
/// error without aborting the others.
pub async fn bounded_parallel<T, F, Fut>(
    tasks: Vec<F>,
    max_in_flight: usize,
) -> Vec<PipelineResult<T>>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = PipelineResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let total = tasks.len();
    let semaphore = Arc::new(Semaphore::new(max_in_flight.max(1)));
    let mut join_set = JoinSet::new();

    for (index, task) in tasks.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        join_set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore open");
            (index, task().await)
        });
    }

    let mut results: Vec<Option<PipelineResult<T>>> = (0..total).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, result)) => results[index] = Some(result),
            Err(e) => warn!("parallel task panicked: {}", e),
        }
    }

    results
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(PipelineError::internal("task panicked"))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    use reel_providers::ProviderError;

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: PipelineResult<()> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), PipelineError>(())
        })
        .await;
        assert!(matches!(result, Err(PipelineError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_with_retry_transient_then_success() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);

        let result = with_retry(&policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::transient("blip").into())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_content_policy_is_terminal() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);

        let result: PipelineResult<()> = with_retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::ContentPolicy("blocked".into()).into()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_quota_retried_once() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);

        let result: PipelineResult<()> = with_retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Quota("limit".into()).into()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_bounded_parallel_preserves_indices() {
        let tasks: Vec<_> = (0..8usize)
            .map(|i| {
                move || async move {
                    if i % 3 == 0 {
                        Err(PipelineError::internal(format!("task {}", i)))
                    } else {
                        Ok(i * 10)
                    }
                }
            })
            .collect();

        let results = bounded_parallel(tasks, 3).await;
        assert_eq!(results.len(), 8);
        for (i, result) in results.iter().enumerate() {
            if i % 3 == 0 {
                assert!(result.is_err());
            } else {
                assert_eq!(*result.as_ref().unwrap(), i * 10);
            }
        }
    }

    #[tokio::test]
    async fn test_bounded_parallel_respects_ceiling() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                move || async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .collect();

        bounded_parallel(tasks, 3).await;
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
