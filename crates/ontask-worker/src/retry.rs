//! Bounded retry for rate-limited remote calls.
//!
//! Only errors classified as [`ErrorClass::RateLimited`] are retried. Attempt
//! `n` that hits a rate limit waits `n * base_delay` before attempt `n + 1`;
//! the final attempt never waits.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use ontask_gemini::ErrorClass;

use crate::clock::Clock;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait unit; grows linearly with the attempt number.
    pub base_delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(60),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Wait after failed attempt `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded.
    Success { value: T, attempts: u32 },
    /// Every attempt was rate limited.
    Exhausted { error: E, attempts: u32 },
    /// A non-retryable error ended the loop.
    Aborted {
        error: E,
        class: ErrorClass,
        attempts: u32,
    },
}

impl<T, E> RetryResult<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success { .. })
    }

    /// Number of times the operation was invoked.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryResult::Success { attempts, .. }
            | RetryResult::Exhausted { attempts, .. }
            | RetryResult::Aborted { attempts, .. } => *attempts,
        }
    }
}

/// Execute `operation` until it succeeds, fails with a non-rate-limit error,
/// or `config.max_attempts` is reached.
pub async fn retry_rate_limited<F, Fut, T, E, C>(
    config: &RetryConfig,
    clock: &dyn Clock,
    classify: C,
    operation: F,
) -> RetryResult<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    C: Fn(&E) -> ErrorClass,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                return RetryResult::Success {
                    value,
                    attempts: attempt,
                }
            }
            Err(e) => match classify(&e) {
                ErrorClass::RateLimited if attempt < max_attempts => {
                    let delay = config.delay_for_attempt(attempt);
                    warn!(
                        operation = %config.operation_name,
                        attempt,
                        max_attempts,
                        delay_secs = delay.as_secs(),
                        "Rate limited, waiting before retry: {}", e
                    );
                    metrics::counter!("ontask_rate_limit_retries_total").increment(1);
                    clock.sleep(delay).await;
                }
                ErrorClass::RateLimited => {
                    warn!(
                        operation = %config.operation_name,
                        attempts = attempt,
                        "Rate limit persisted through every attempt: {}", e
                    );
                    return RetryResult::Exhausted {
                        error: e,
                        attempts: attempt,
                    };
                }
                class => {
                    debug!(
                        operation = %config.operation_name,
                        attempt,
                        ?class,
                        "Not retrying: {}", e
                    );
                    return RetryResult::Aborted {
                        error: e,
                        class,
                        attempts: attempt,
                    };
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RecordingClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn by_prefix(e: &&str) -> ErrorClass {
        if e.starts_with("429") {
            ErrorClass::RateLimited
        } else if e.starts_with("503") {
            ErrorClass::Transient
        } else {
            ErrorClass::Fatal
        }
    }

    #[test]
    fn test_delay_is_linear() {
        let config = RetryConfig::new("test");

        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(60));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(120));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(180));
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let config = RetryConfig::new("test");
        let clock = RecordingClock::new();
        let calls = AtomicU32::new(0);

        let result = retry_rate_limited(&config, &clock, by_prefix, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, &str>(42) }
        })
        .await;

        assert!(matches!(result, RetryResult::Success { value: 42, attempts: 1 }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_success_after_rate_limit() {
        let config = RetryConfig::new("test");
        let clock = RecordingClock::new();
        let calls = AtomicU32::new(0);

        let result = retry_rate_limited(&config, &clock, by_prefix, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err("429 quota")
                } else {
                    Ok("[]")
                }
            }
        })
        .await;

        assert!(result.is_success());
        assert_eq!(result.attempts(), 2);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60)]);
    }

    #[tokio::test]
    async fn test_exhausted_without_final_wait() {
        let config = RetryConfig::new("test").with_max_attempts(3);
        let clock = RecordingClock::new();
        let calls = AtomicU32::new(0);

        let result = retry_rate_limited(&config, &clock, by_prefix, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("429 RESOURCE_EXHAUSTED") }
        })
        .await;

        assert!(matches!(result, RetryResult::Exhausted { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(60), Duration::from_secs(120)]
        );
    }

    #[tokio::test]
    async fn test_other_errors_abort() {
        let config = RetryConfig::new("test");
        let clock = RecordingClock::new();

        let transient = retry_rate_limited(&config, &clock, by_prefix, || async {
            Err::<(), _>("503 unavailable")
        })
        .await;
        assert!(matches!(
            transient,
            RetryResult::Aborted { class: ErrorClass::Transient, attempts: 1, .. }
        ));

        let fatal = retry_rate_limited(&config, &clock, by_prefix, || async {
            Err::<(), _>("400 bad request")
        })
        .await;
        assert!(matches!(
            fatal,
            RetryResult::Aborted { class: ErrorClass::Fatal, attempts: 1, .. }
        ));
        assert!(clock.sleeps().is_empty());
    }
}
