//! Bounded retry with exponential backoff.
//!
//! Warden wraps every network-facing step of identity resolution (token
//! claims, registry reads, peer pings) in one generic retry executor instead
//! of per-operation wrappers. Errors inside a wrapped step are swallowed and
//! converted into another attempt until the budget is exhausted; only the
//! final exhaustion surfaces to the caller.

use crate::error::{Result, WardenError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
    /// Add up to 25% random jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Quick retry configuration for cheap probes.
    pub fn quick() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: true,
        }
    }

    /// Patient retry configuration for registry mutations.
    pub fn patient() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }

    /// Calculate the delay for a given attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32 - 1);
        let delay = Duration::from_secs_f64(base_delay.min(self.max_delay.as_secs_f64()));

        if self.jitter {
            let jitter_factor = 1.0 + rand::thread_rng().gen_range(0.0..0.25);
            Duration::from_secs_f64(delay.as_secs_f64() * jitter_factor)
        } else {
            delay
        }
    }
}

/// Retry executor with exponential backoff.
pub struct RetryExecutor {
    config: RetryConfig,
    operation: &'static str,
}

impl RetryExecutor {
    /// Create a new retry executor. The operation name appears in logs and
    /// in the final [`WardenError::RetryExhausted`].
    pub fn new(operation: &'static str, config: RetryConfig) -> Self {
        Self { config, operation }
    }

    /// Execute a fallible async operation with retries.
    ///
    /// Non-retryable errors short-circuit; retryable errors are retried until
    /// the attempt budget runs out, after which the last error is returned.
    pub async fn execute<F, Fut, T>(&self, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < self.config.max_attempts {
            attempt += 1;

            match f().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }

                    tracing::debug!(
                        operation = self.operation,
                        attempt = attempt,
                        max_attempts = self.config.max_attempts,
                        error = %e,
                        "Attempt failed"
                    );
                    last_error = Some(e);

                    if attempt < self.config.max_attempts {
                        sleep(self.config.delay_for_attempt(attempt)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| WardenError::RetryExhausted {
            operation: self.operation.to_string(),
            attempts: attempt,
        }))
    }
}

/// Sleep a uniformly random duration in `[min, max]`.
///
/// Used to spread simultaneous starters before dead-token reclamation so a
/// freshly replaced autoscaling group does not stampede the registry.
pub async fn jitter_sleep(min: Duration, max: Duration) {
    let span = max.saturating_sub(min);
    let extra = if span.is_zero() {
        Duration::ZERO
    } else {
        Duration::from_millis(rand::thread_rng().gen_range(0..=span.as_millis() as u64))
    };
    sleep(min + extra).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_first_try() {
        let retry = RetryExecutor::new("test", RetryConfig::default());
        let result = retry.execute(|| async { Ok::<_, WardenError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_retryable_errors() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            jitter: false,
            ..Default::default()
        };
        let retry = RetryExecutor::new("test", config);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result = retry
            .execute(move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(WardenError::RegistryUnavailable("flaky".into()))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn surfaces_last_error_when_exhausted() {
        let config = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            jitter: false,
            ..Default::default()
        };
        let retry = RetryExecutor::new("test", config);
        let result: Result<()> = retry
            .execute(|| async { Err(WardenError::RegistryUnavailable("still down".into())) })
            .await;
        assert!(matches!(result, Err(WardenError::RegistryUnavailable(_))));
    }

    #[tokio::test]
    async fn non_retryable_errors_short_circuit() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1),
            jitter: false,
            ..Default::default()
        };
        let retry = RetryExecutor::new("test", config);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<()> = retry
            .execute(move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(WardenError::InvalidArgument("bad".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(WardenError::InvalidArgument(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
            multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(6), Duration::from_millis(400));
    }
}
