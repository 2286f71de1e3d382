//! Three-state circuit breaker composed around any outbound call, matching
//! the external-collaborator propagation policy in spec §7: retry 5xx/timeout
//! with exponential backoff (3 attempts, `2^n * base`), never retry a 4xx,
//! and after the final failure trip the breaker so subsequent callers fail
//! fast instead of piling onto an unreachable service.

use parking_lot::Mutex;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
}

/// One breaker per outbound collaborator (SCADA, field-ops, sensor store,
/// GIS, weather), shared across every call site for that collaborator.
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                opened_at: None,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    fn should_attempt_reset(&self, inner: &Inner) -> bool {
        inner.opened_at.map(|at| at.elapsed() > self.recovery_timeout).unwrap_or(false)
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = 0;
        inner.state = CircuitState::Closed;
        inner.opened_at = None;
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        if inner.failure_count >= self.failure_threshold {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            warn!(failures = inner.failure_count, "circuit breaker opened");
        }
    }

    /// Runs `f` with backoff retry (3 attempts, `base * 2^attempt`) and
    /// circuit-breaker protection. `is_retryable` distinguishes a 5xx/timeout
    /// (retry) from a 4xx (fail immediately) the way spec §7 requires.
    pub async fn call<T, E, Fut>(
        &self,
        base_delay: Duration,
        is_retryable: impl Fn(&E) -> bool,
        mut f: impl FnMut() -> Fut,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let mut inner = self.inner.lock();
            if inner.state == CircuitState::Open {
                if self.should_attempt_reset(&inner) {
                    inner.state = CircuitState::HalfOpen;
                } else {
                    return Err(CircuitBreakerError::Open);
                }
            }
        }

        const MAX_ATTEMPTS: u32 = 3;
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match f().await {
                Ok(value) => {
                    self.on_success();
                    return Ok(value);
                }
                Err(e) => {
                    let retryable = is_retryable(&e);
                    last_err = Some(e);
                    if !retryable {
                        self.on_failure();
                        break;
                    }
                    if attempt + 1 < MAX_ATTEMPTS {
                        let delay = base_delay * 2u32.pow(attempt);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        self.on_failure();
        Err(CircuitBreakerError::Failed(last_err.expect("loop ran at least once")))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker is open")]
    Open,
    #[error("call failed after retries: {0}")]
    Failed(E),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn trips_open_after_failure_threshold() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        let calls = AtomicU32::new(0);
        for _ in 0..2 {
            let _ = breaker
                .call(Duration::from_millis(1), |_: &&str| false, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), &str>("boom")
                })
                .await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        let result = breaker
            .call(Duration::from_millis(1), |_: &&str| false, || async { Ok::<(), &str>(()) })
            .await;
        assert!(matches!(result, Err(CircuitBreakerError::Open)));
    }

    #[tokio::test]
    async fn retries_retryable_failures_before_succeeding() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(60));
        let attempts = AtomicU32::new(0);
        let result = breaker
            .call(Duration::from_millis(1), |_: &&str| true, || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err::<u32, &str>("timeout")
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
    }
}
