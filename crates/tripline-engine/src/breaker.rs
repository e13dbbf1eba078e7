//! Circuit breaker for fast-failing during sustained outages.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::errors::PipelineError;

/// Breaker states. `Open` rejects calls until the cooldown elapses, after
/// which a single `HalfOpen` trial decides whether to close again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Tracks consecutive failures and short-circuits calls while open.
/// State lives only in memory and resets with the process.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold,
            cooldown,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Route `op` through the breaker.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CircuitOpen`] without invoking `op` while
    /// the circuit is open and cooling down; otherwise returns whatever
    /// `op` returns.
    pub fn call<T, F>(&self, mut op: F) -> Result<T, PipelineError>
    where
        F: FnMut() -> Result<T, PipelineError>,
    {
        self.before_call()?;
        match op() {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(err)
            }
        }
    }

    /// Operator intervention: force `Closed` with a clean failure count.
    pub fn reset(&self) {
        let mut inner = self.lock();
        tracing::info!("Circuit breaker manually reset");
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.last_failure = None;
    }

    fn before_call(&self) -> Result<(), PipelineError> {
        let mut inner = self.lock();
        if inner.state == CircuitState::Open {
            let elapsed = inner
                .last_failure
                .map_or(self.cooldown, |instant| instant.elapsed());
            if elapsed >= self.cooldown {
                tracing::info!("Circuit breaker entering half-open trial");
                inner.state = CircuitState::HalfOpen;
            } else {
                return Err(PipelineError::CircuitOpen {
                    failures: inner.failure_count,
                    cooldown_secs: self.cooldown.as_secs(),
                });
            }
        }
        Ok(())
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        inner.failure_count = 0;
        if inner.state == CircuitState::HalfOpen {
            tracing::info!("Circuit breaker closing after successful trial");
            inner.state = CircuitState::Closed;
        }
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());
        if inner.failure_count >= self.failure_threshold {
            tracing::error!(
                failures = inner.failure_count,
                "Circuit breaker opening"
            );
            inner.state = CircuitState::Open;
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing() -> Result<(), PipelineError> {
        Err(PipelineError::Transient("simulated failure".into()))
    }

    #[test]
    fn test_starts_closed() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_success_passes_through() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        let result = breaker.call(|| Ok::<_, PipelineError>(42));
        assert_eq!(result.unwrap(), 42);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        for _ in 0..2 {
            assert!(breaker.call(failing).is_err());
            assert_eq!(breaker.state(), CircuitState::Closed);
        }
        assert!(breaker.call(failing).is_err());
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_open_fails_fast_without_invoking_operation() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        assert!(breaker.call(failing).is_err());
        assert_eq!(breaker.state(), CircuitState::Open);

        let mut invoked = false;
        let result = breaker.call(|| {
            invoked = true;
            Ok::<_, PipelineError>(())
        });
        assert!(matches!(result, Err(PipelineError::CircuitOpen { .. })));
        assert!(!invoked, "operation must not run while the circuit is open");
    }

    #[test]
    fn test_half_open_trial_success_closes_and_resets() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(20));
        assert!(breaker.call(failing).is_err());
        assert_eq!(breaker.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(30));
        let result = breaker.call(|| Ok::<_, PipelineError>("ok"));
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(breaker.state(), CircuitState::Closed);

        // Failure counter is back to zero: one new failure must not reopen
        // a breaker with threshold 2.
        let breaker = CircuitBreaker::new(2, Duration::from_millis(20));
        assert!(breaker.call(failing).is_err());
        assert!(breaker.call(failing).is_err());
        std::thread::sleep(Duration::from_millis(30));
        assert!(breaker.call(|| Ok::<_, PipelineError>(())).is_ok());
        assert!(breaker.call(failing).is_err());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_trial_failure_reopens() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(20));
        assert!(breaker.call(failing).is_err());
        std::thread::sleep(Duration::from_millis(30));
        assert!(breaker.call(failing).is_err());
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_reset_closes_and_clears() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        assert!(breaker.call(failing).is_err());
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.call(|| Ok::<_, PipelineError>(())).is_ok());
    }
}
