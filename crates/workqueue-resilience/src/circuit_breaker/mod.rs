//! Rolling-window circuit breaker.
//!
//! Unlike a simple consecutive-failure counter, this breaker trips on the
//! *failure ratio* over the last `window` recorded outcomes, so a handler
//! that fails once every few calls doesn't trip it while a handler that
//! fails most of the time does.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Circuit is closed - calls are allowed.
    Closed = 0,
    /// Circuit is open - calls are rejected until the cooldown elapses.
    Open = 1,
    /// Circuit is half-open - a single probe call is admitted.
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Closed,
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

impl CircuitState {
    /// Numeric encoding used on the `breaker_state` gauge: 0=closed,
    /// 1=open, 2=half_open.
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of recent outcomes considered.
    pub window: usize,
    /// Failure ratio (0.0-1.0) above which the circuit opens.
    pub threshold: f64,
    /// Minimum number of samples before the ratio is evaluated at all,
    /// so the breaker doesn't trip on a cold start with one failure.
    pub min_samples: usize,
    /// How long the circuit stays open before admitting a probe.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window: 20,
            threshold: 0.5,
            min_samples: 10,
            cooldown: Duration::from_secs(30),
        }
    }
}

struct Inner {
    outcomes: VecDeque<bool>,
    last_transition: Instant,
}

/// Three-state (Closed/Open/Half-Open) failure-isolation gate.
///
/// Safe for concurrent use: state transitions use an atomic tag, the
/// outcome window is behind a `parking_lot::Mutex`.
pub struct CircuitBreaker {
    name: String,
    state: AtomicU8,
    inner: Mutex<Inner>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            state: AtomicU8::new(CircuitState::Closed as u8),
            inner: Mutex::new(Inner {
                outcomes: VecDeque::with_capacity(config.window),
                last_transition: Instant::now(),
            }),
            config,
        }
    }

    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::SeqCst))
    }

    /// Whether a call should be let through right now. Transitions
    /// Open -> HalfOpen once the cooldown has elapsed.
    pub fn is_call_permitted(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => false, // a probe is already in flight
            CircuitState::Open => {
                let mut inner = self.inner.lock();
                if inner.last_transition.elapsed() >= self.config.cooldown {
                    self.state.store(CircuitState::HalfOpen as u8, Ordering::SeqCst);
                    inner.last_transition = Instant::now();
                    debug!(breaker = %self.name, "transitioning to half-open for a probe");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Duration remaining until the next probe window, `None` if not open.
    pub fn time_until_probe(&self) -> Option<Duration> {
        if self.state() != CircuitState::Open {
            return None;
        }
        let elapsed = self.inner.lock().last_transition.elapsed();
        Some(self.config.cooldown.saturating_sub(elapsed))
    }

    pub fn record_success(&self) {
        match self.state() {
            CircuitState::HalfOpen => {
                // Probe succeeded: close the breaker and clear history.
                self.state.store(CircuitState::Closed as u8, Ordering::SeqCst);
                let mut inner = self.inner.lock();
                inner.outcomes.clear();
                inner.last_transition = Instant::now();
                debug!(breaker = %self.name, "probe succeeded, circuit closed");
            }
            CircuitState::Closed => self.push_outcome(true),
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        match self.state() {
            CircuitState::HalfOpen => {
                // Probe failed: reopen with a fresh cooldown.
                self.state.store(CircuitState::Open as u8, Ordering::SeqCst);
                self.inner.lock().last_transition = Instant::now();
                warn!(breaker = %self.name, "probe failed, circuit reopened");
            }
            CircuitState::Closed => self.push_outcome(false),
            CircuitState::Open => {}
        }
    }

    fn push_outcome(&self, success: bool) {
        let mut inner = self.inner.lock();
        if inner.outcomes.len() == self.config.window {
            inner.outcomes.pop_front();
        }
        inner.outcomes.push_back(success);

        if inner.outcomes.len() < self.config.min_samples {
            return;
        }

        let failures = inner.outcomes.iter().filter(|ok| !**ok).count();
        let ratio = failures as f64 / inner.outcomes.len() as f64;

        if ratio > self.config.threshold {
            self.state.store(CircuitState::Open as u8, Ordering::SeqCst);
            inner.last_transition = Instant::now();
            warn!(
                breaker = %self.name,
                failures,
                samples = inner.outcomes.len(),
                ratio,
                "circuit opened: failure ratio exceeded threshold"
            );
        }
    }

    /// Resets the breaker to a clean closed state.
    pub fn reset(&self) {
        self.state.store(CircuitState::Closed as u8, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        inner.outcomes.clear();
        inner.last_transition = Instant::now();
        debug!(breaker = %self.name, "circuit breaker manually reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(window: usize, threshold: f64, min_samples: usize) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                window,
                threshold,
                min_samples,
                cooldown: Duration::from_millis(20),
            },
        )
    }

    #[test]
    fn starts_closed() {
        let cb = breaker(10, 0.5, 10);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.is_call_permitted());
    }

    #[test]
    fn does_not_trip_below_min_samples() {
        let cb = breaker(10, 0.5, 10);
        for _ in 0..5 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn trips_when_ratio_exceeds_threshold() {
        let cb = breaker(10, 0.5, 10);
        for _ in 0..10 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.is_call_permitted());
    }

    #[test]
    fn half_open_probe_success_closes() {
        let cb = breaker(10, 0.5, 10);
        for _ in 0..10 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.is_call_permitted());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_probe_failure_reopens() {
        let cb = breaker(10, 0.5, 10);
        for _ in 0..10 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.is_call_permitted());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn mixed_ratio_under_threshold_stays_closed() {
        let cb = breaker(10, 0.5, 10);
        for i in 0..10 {
            if i % 3 == 0 {
                cb.record_failure();
            } else {
                cb.record_success();
            }
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
