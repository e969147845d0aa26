use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

use studio_cache_core::CacheError;

/// Thresholds for the persistent-tier breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive store outages before the tier is skipped
    pub failure_threshold: u32,
    /// How long the tier is skipped before a trial write is allowed
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Closed,
    Open(Instant),
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: State,
    failures: u32,
}

/// Stops calling a persistent store that keeps reporting it is unavailable
///
/// While open the cache runs memory-only. After `reset_timeout` one trial
/// is let through; its outcome closes or reopens the breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    inner: Arc<RwLock<Inner>>,
    config: BreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                state: State::Closed,
                failures: 0,
            })),
            config,
        }
    }

    /// Check if the store may be called
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.write();
        match inner.state {
            State::Closed => true,
            State::Open(opened_at) => {
                if opened_at.elapsed() >= self.config.reset_timeout {
                    inner.state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
            State::HalfOpen => true,
        }
    }

    /// Record the outcome of a store call
    ///
    /// Only outages count against the store; a full quota, a rejected key or
    /// a corrupt value still proves the store is reachable.
    pub fn record(&self, result: &Result<(), &CacheError>) {
        match result {
            Err(err) if Self::is_failure(err) => self.report_failure(),
            _ => self.report_success(),
        }
    }

    pub fn report_success(&self) {
        let mut inner = self.inner.write();
        inner.state = State::Closed;
        inner.failures = 0;
    }

    pub fn report_failure(&self) {
        let mut inner = self.inner.write();
        match inner.state {
            State::Closed => {
                inner.failures += 1;
                if inner.failures >= self.config.failure_threshold {
                    inner.state = State::Open(Instant::now());
                }
            }
            State::HalfOpen => {
                inner.state = State::Open(Instant::now());
            }
            State::Open(_) => {}
        }
    }

    /// Whether the breaker is currently skipping the store
    pub fn is_open(&self) -> bool {
        matches!(self.inner.read().state, State::Open(_))
    }

    /// Helper to classify if an error should trip the breaker
    pub fn is_failure(err: &CacheError) -> bool {
        err.is_unavailable()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, reset: Duration) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: threshold,
            reset_timeout: reset,
        })
    }

    #[test]
    fn test_opens_after_threshold() {
        let breaker = breaker(2, Duration::from_secs(60));
        breaker.report_failure();
        assert!(breaker.allow_request());
        breaker.report_failure();
        assert!(breaker.is_open());
        assert!(!breaker.allow_request());
    }

    #[test]
    fn test_quota_does_not_trip() {
        let breaker = breaker(1, Duration::from_secs(60));
        breaker.record(&Err(&CacheError::QuotaExceeded));
        assert!(!breaker.is_open());
        breaker.record(&Err(&CacheError::Unavailable("off".into())));
        assert!(breaker.is_open());
    }

    #[test]
    fn test_rejected_entry_does_not_trip() {
        let breaker = breaker(2, Duration::from_secs(60));
        for _ in 0..5 {
            breaker.record(&Err(&CacheError::Rejected("name too long".into())));
        }
        assert!(!breaker.is_open());
        assert!(breaker.allow_request());
    }

    #[test]
    fn test_half_open_trial() {
        let breaker = breaker(1, Duration::ZERO);
        breaker.report_failure();
        assert!(breaker.allow_request());

        breaker.report_failure();
        assert!(breaker.is_open());

        assert!(breaker.allow_request());
        breaker.report_success();
        assert!(!breaker.is_open());
    }
}
