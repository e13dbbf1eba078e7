//! Bounded retry with exponential backoff.

use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::errors::PipelineError;

/// Attempt limit and backoff base shared by all wrapped operations.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff after failed attempt number `attempt` (1-based):
    /// `base_delay * 2^(attempt-1)`. Pure in `base_delay` and the attempt
    /// index; no state carries across invocations.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Executes operations with bounded retry; optionally routes every attempt
/// through a circuit breaker.
pub struct RetryExecutor {
    policy: RetryPolicy,
    breaker: Option<CircuitBreaker>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            breaker: None,
        }
    }

    pub fn with_breaker(policy: RetryPolicy, breaker: CircuitBreaker) -> Self {
        Self {
            policy,
            breaker: Some(breaker),
        }
    }

    /// Run `op`, retrying retryable failures up to the attempt limit.
    ///
    /// # Errors
    ///
    /// Returns the final failure unchanged: either the first
    /// non-retryable error, or the last error after exhausting attempts.
    pub fn execute<T, F>(&self, label: &str, mut op: F) -> Result<T, PipelineError>
    where
        F: FnMut() -> Result<T, PipelineError>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            tracing::info!(
                label,
                attempt,
                max_attempts = self.policy.max_attempts,
                "Attempting operation"
            );
            let result = match &self.breaker {
                Some(breaker) => breaker.call(&mut op),
                None => op(),
            };
            match result {
                Ok(value) => {
                    tracing::info!(label, attempt, "Operation succeeded");
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    tracing::warn!(
                        label,
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        error = %err,
                        "Operation failed, will retry"
                    );
                    std::thread::sleep(delay);
                }
                Err(err) => {
                    tracing::error!(label, attempt, error = %err, "Operation failed permanently");
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_backoff_schedule_doubles() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(10));
    }

    #[test]
    fn test_success_on_first_attempt() {
        let executor = RetryExecutor::new(fast_policy(3));
        let mut calls = 0;
        let result = executor.execute("test op", || {
            calls += 1;
            Ok::<_, PipelineError>("done")
        });
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_retries_until_success() {
        let executor = RetryExecutor::new(fast_policy(3));
        let mut calls = 0;
        let result = executor.execute("flaky op", || {
            calls += 1;
            if calls < 3 {
                Err(PipelineError::Transient(format!("failure {calls}")))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_exhaustion_returns_last_error_unchanged() {
        let executor = RetryExecutor::new(fast_policy(3));
        let mut calls = 0;
        let result: Result<(), _> = executor.execute("doomed op", || {
            calls += 1;
            Err(PipelineError::Transient("connection reset by peer".into()))
        });
        assert_eq!(calls, 3);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("connection reset by peer"));
    }

    #[test]
    fn test_non_retryable_stops_immediately() {
        let executor = RetryExecutor::new(fast_policy(3));
        let mut calls = 0;
        let result: Result<(), _> = executor.execute("bad data", || {
            calls += 1;
            Err(PipelineError::DataIntegrity("no rows".into()))
        });
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(PipelineError::DataIntegrity(_))));
    }

    #[test]
    fn test_breaker_composition_fails_fast_once_open() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        let executor = RetryExecutor::with_breaker(fast_policy(3), breaker);
        let mut invocations = 0;
        let result: Result<(), _> = executor.execute("guarded op", || {
            invocations += 1;
            Err(PipelineError::Transient("down".into()))
        });
        // The breaker opens after the second failure; the third attempt is
        // rejected before the operation runs.
        assert_eq!(invocations, 2);
        assert!(matches!(result, Err(PipelineError::CircuitOpen { .. })));
    }
}
