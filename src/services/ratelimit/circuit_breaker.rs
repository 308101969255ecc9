use crate::observability::CIRCUIT_BREAKER_STATE;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Consecutive successes required in HALF_OPEN before closing again.
const HALF_OPEN_SUCCESS_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation, requests pass through to the backend.
    Closed,
    /// Backend considered down, requests fall back immediately.
    Open,
    /// Recovery probe, trial requests are let through.
    HalfOpen,
}

impl CircuitState {
    fn as_u8(self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }

    fn from_u8(raw: u8) -> CircuitState {
        match raw {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("CLOSED"),
            CircuitState::Open => f.write_str("OPEN"),
            CircuitState::HalfOpen => f.write_str("HALF_OPEN"),
        }
    }
}

/// Three-state failure detector guarding one backend.
///
/// All state lives in atomics and every transition is a compare-and-swap, so
/// concurrent callers never take a lock and exactly one of them performs any
/// given transition. The OPEN timestamp is kept as milliseconds elapsed since
/// construction, which keeps it CAS-able in a u64.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    open_timeout: Duration,
    origin: Instant,
    state: AtomicU8,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    opened_at_ms: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: &str, failure_threshold: u32, open_timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            failure_threshold,
            open_timeout,
            origin: Instant::now(),
            state: AtomicU8::new(CircuitState::Closed.as_u8()),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            opened_at_ms: AtomicU64::new(0),
        }
    }

    /// Whether the caller may hit the backend. In OPEN this also performs the
    /// lazy OPEN -> HALF_OPEN transition once the timeout has elapsed.
    pub fn allow_request(&self) -> bool {
        match CircuitState::from_u8(self.state.load(Ordering::Acquire)) {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if self.open_timeout_expired() {
                    if self.transition(CircuitState::Open, CircuitState::HalfOpen) {
                        self.success_count.store(0, Ordering::Release);
                        tracing::info!(
                            "circuit breaker {}: OPEN -> HALF_OPEN (recovery probe)",
                            self.name
                        );
                    }
                    // Whoever lost the CAS still gets to probe.
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    pub fn record_success(&self) {
        match CircuitState::from_u8(self.state.load(Ordering::Acquire)) {
            CircuitState::HalfOpen => {
                let successes = self.success_count.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= HALF_OPEN_SUCCESS_THRESHOLD
                    && self.transition(CircuitState::HalfOpen, CircuitState::Closed)
                {
                    self.failure_count.store(0, Ordering::Release);
                    tracing::info!("circuit breaker {}: HALF_OPEN -> CLOSED (recovered)", self.name);
                }
            }
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Release);
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        match CircuitState::from_u8(self.state.load(Ordering::Acquire)) {
            CircuitState::HalfOpen => {
                if self.transition(CircuitState::HalfOpen, CircuitState::Open) {
                    self.stamp_opened();
                    tracing::warn!("circuit breaker {}: HALF_OPEN -> OPEN (probe failed)", self.name);
                }
            }
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.failure_threshold
                    && self.transition(CircuitState::Closed, CircuitState::Open)
                {
                    self.stamp_opened();
                    tracing::warn!(
                        "circuit breaker {}: CLOSED -> OPEN after {} consecutive failures",
                        self.name,
                        failures
                    );
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Current state, applying the same lazy OPEN -> HALF_OPEN check as
    /// `allow_request` so the answer is never stale beyond the timeout.
    pub fn state(&self) -> CircuitState {
        if CircuitState::from_u8(self.state.load(Ordering::Acquire)) == CircuitState::Open
            && self.open_timeout_expired()
            && self.transition(CircuitState::Open, CircuitState::HalfOpen)
        {
            self.success_count.store(0, Ordering::Release);
        }
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Operator-driven reset to the initial state. Not part of the failure
    /// handling algorithm.
    pub fn reset(&self) {
        self.state.store(CircuitState::Closed.as_u8(), Ordering::Release);
        self.failure_count.store(0, Ordering::Release);
        self.success_count.store(0, Ordering::Release);
        self.opened_at_ms.store(0, Ordering::Release);
        metrics::gauge!(CIRCUIT_BREAKER_STATE).set(0.0);
        tracing::info!("circuit breaker {}: reset to CLOSED", self.name);
    }

    fn transition(&self, from: CircuitState, to: CircuitState) -> bool {
        let swapped = self
            .state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if swapped {
            metrics::gauge!(CIRCUIT_BREAKER_STATE).set(to.as_u8() as f64);
        }
        swapped
    }

    fn stamp_opened(&self) {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.opened_at_ms.store(elapsed, Ordering::Release);
    }

    fn open_timeout_expired(&self) -> bool {
        let opened = self.opened_at_ms.load(Ordering::Acquire);
        let now = self.origin.elapsed().as_millis() as u64;
        now.saturating_sub(opened) > self.open_timeout.as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn breaker() -> CircuitBreaker {
        // 3 failures open the circuit, 100ms until the recovery probe.
        CircuitBreaker::new("test", 3, Duration::from_millis(100))
    }

    fn trip(cb: &CircuitBreaker) {
        for _ in 0..3 {
            cb.record_failure();
        }
    }

    #[test]
    fn initial_state_is_closed() {
        let cb = breaker();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
    }

    #[test]
    fn stays_closed_below_threshold() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
    }

    #[test]
    fn opens_after_threshold_failures() {
        let cb = breaker();
        trip(&cb);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
        assert!(!cb.allow_request());
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.failure_count(), 2);

        cb.record_success();
        assert_eq!(cb.failure_count(), 0);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn transitions_to_half_open_after_timeout() {
        let cb = breaker();
        trip(&cb);
        assert_eq!(cb.state(), CircuitState::Open);

        sleep(Duration::from_millis(150)).await;

        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn closes_after_successes_in_half_open() {
        let cb = breaker();
        trip(&cb);
        sleep(Duration::from_millis(150)).await;
        cb.allow_request();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        cb.record_success();
        cb.record_success();

        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn reopens_after_failure_in_half_open() {
        let cb = breaker();
        trip(&cb);
        sleep(Duration::from_millis(150)).await;
        cb.allow_request();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_failure();

        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn reset_restores_initial_state() {
        let cb = breaker();
        trip(&cb);
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert!(cb.allow_request());
    }

    #[test]
    fn exactly_one_caller_performs_the_open_transition() {
        use std::sync::Arc;
        use std::thread;

        let cb = Arc::new(CircuitBreaker::new("race", 1, Duration::from_secs(30)));
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        // Concurrent allow_request calls on an open circuit all agree.
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cb = cb.clone();
            handles.push(thread::spawn(move || cb.allow_request()));
        }
        for handle in handles {
            assert!(!handle.join().unwrap());
        }
    }
}
