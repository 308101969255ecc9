use crate::api::middleware::error::{ApiError, ApiResult};
use crate::observability::RATE_LIMIT_REJECTED_TOTAL;
use crate::services::lock_service::{Lease, LockService};
use crate::services::ratelimit::{slot_keys, CircuitBreaker, CircuitState, ResourceKind};
use chrono::NaiveDateTime;
use std::sync::Arc;

const LOCK_PREFIX: &str = "reservation:lock:";

/// Leases held for one admission attempt, or the marker that the distributed
/// layer was bypassed because the circuit is open.
#[derive(Debug, Default)]
pub struct LockContext {
    leases: Vec<Lease>,
    skipped: bool,
}

impl LockContext {
    fn held(leases: Vec<Lease>) -> Self {
        Self {
            leases,
            skipped: false,
        }
    }

    pub fn skipped() -> Self {
        Self {
            leases: Vec::new(),
            skipped: true,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub fn lease_count(&self) -> usize {
        self.leases.len()
    }
}

/// Cluster-wide admission layer over the lock service, guarded by a circuit
/// breaker.
///
/// The failure policy is asymmetric on purpose: a busy slot is a normal
/// rejection and never touches the breaker, while a backend error trips the
/// breaker and degrades this call to a skipped context — the system prefers
/// admitting without distributed coordination over failing outright when the
/// backend is unhealthy.
pub struct DistributedRateLimiter {
    locks: Arc<dyn LockService>,
    circuit_breaker: CircuitBreaker,
}

impl DistributedRateLimiter {
    pub fn new(locks: Arc<dyn LockService>, circuit_breaker: CircuitBreaker) -> Self {
        Self {
            locks,
            circuit_breaker,
        }
    }

    /// Zero-wait leased acquisition of every slot the interval touches.
    ///
    /// `Err(AdmissionRejected)` means another holder owns a slot. Backend
    /// trouble never surfaces as an error here — the context comes back
    /// skipped instead.
    pub async fn try_acquire(
        &self,
        kind: ResourceKind,
        resource_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> ApiResult<LockContext> {
        if !self.circuit_breaker.allow_request() {
            tracing::warn!(
                "circuit open, skipping distributed admission for {} {}",
                kind,
                resource_id
            );
            return Ok(LockContext::skipped());
        }

        let mut acquired: Vec<Lease> = Vec::new();

        for slot_key in slot_keys(kind, resource_id, start, end) {
            let lock_key = format!("{}{}", LOCK_PREFIX, slot_key);
            match self.locks.try_lock(&lock_key).await {
                Ok(Some(lease)) => acquired.push(lease),
                Ok(None) => {
                    // Busy is a normal outcome, not a backend failure.
                    let mut partial = LockContext::held(acquired);
                    self.release(&mut partial).await;
                    metrics::counter!(RATE_LIMIT_REJECTED_TOTAL, "layer" => "distributed")
                        .increment(1);
                    return Err(ApiError::AdmissionRejected(format!(
                        "{} {} already has a request in flight for this time window (distributed)",
                        kind, resource_id
                    )));
                }
                Err(e) => {
                    let mut partial = LockContext::held(acquired);
                    self.release(&mut partial).await;
                    self.circuit_breaker.record_failure();
                    tracing::warn!(
                        "lock backend error, degrading to local-only admission: {}",
                        e
                    );
                    return Ok(LockContext::skipped());
                }
            }
        }

        self.circuit_breaker.record_success();
        Ok(LockContext::held(acquired))
    }

    /// Release every lease the context owns. Unlock failures are logged, not
    /// retried — lease expiry is the backstop. Safe to call twice, and a
    /// no-op on skipped contexts.
    pub async fn release(&self, context: &mut LockContext) {
        for lease in context.leases.drain(..) {
            match self.locks.is_held_by_caller(&lease).await {
                Ok(true) => {
                    if let Err(e) = self.locks.unlock(&lease).await {
                        tracing::warn!(
                            "failed to release lease {} (will expire on its own): {}",
                            lease.key(),
                            e
                        );
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        "failed to inspect lease {} (will expire on its own): {}",
                        lease.key(),
                        e
                    );
                }
            }
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    pub fn reset_circuit(&self) {
        self.circuit_breaker.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::lock_service::test_support::{
        BusyLockService, FailingLockService, InMemoryLockService,
    };
    use chrono::NaiveDate;
    use std::time::Duration;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn limiter_over(locks: Arc<dyn LockService>) -> DistributedRateLimiter {
        DistributedRateLimiter::new(
            locks,
            CircuitBreaker::new("test-lock", 5, Duration::from_secs(30)),
        )
    }

    #[tokio::test]
    async fn acquires_and_releases_leases() {
        let locks = Arc::new(InMemoryLockService::new());
        let limiter = limiter_over(locks.clone());

        let mut context = limiter
            .try_acquire(ResourceKind::Vehicle, 1, at(10, 0), at(13, 0))
            .await
            .unwrap();
        assert!(!context.is_skipped());
        assert_eq!(context.lease_count(), 3);
        assert_eq!(locks.held_count(), 3);

        limiter.release(&mut context).await;
        assert_eq!(locks.held_count(), 0);
    }

    #[tokio::test]
    async fn busy_slot_rejects_with_distributed_marker() {
        let locks = Arc::new(InMemoryLockService::new());
        let limiter = limiter_over(locks.clone());

        let mut first = limiter
            .try_acquire(ResourceKind::Vehicle, 1, at(10, 0), at(11, 0))
            .await
            .unwrap();

        let err = limiter
            .try_acquire(ResourceKind::Vehicle, 1, at(10, 0), at(11, 0))
            .await
            .unwrap_err();
        match err {
            ApiError::AdmissionRejected(msg) => assert!(msg.contains("distributed")),
            other => panic!("expected AdmissionRejected, got {:?}", other),
        }
        // Busy outcomes must not feed the breaker.
        assert_eq!(limiter.circuit_state(), CircuitState::Closed);

        limiter.release(&mut first).await;
    }

    #[tokio::test]
    async fn busy_slot_releases_partial_leases() {
        let locks = Arc::new(InMemoryLockService::new());
        let limiter = limiter_over(locks.clone());

        // Occupy one slot in the middle of the window.
        let mut middle = limiter
            .try_acquire(ResourceKind::Vehicle, 1, at(11, 0), at(12, 0))
            .await
            .unwrap();

        let result = limiter
            .try_acquire(ResourceKind::Vehicle, 1, at(10, 0), at(13, 0))
            .await;
        assert!(result.is_err());

        // Only the pre-existing lease may remain.
        assert_eq!(locks.held_count(), 1);
        limiter.release(&mut middle).await;
    }

    #[tokio::test]
    async fn backend_error_degrades_to_skipped_context() {
        let limiter = limiter_over(Arc::new(FailingLockService));

        let context = limiter
            .try_acquire(ResourceKind::Vehicle, 1, at(10, 0), at(11, 0))
            .await
            .unwrap();
        assert!(context.is_skipped());
        assert_eq!(context.lease_count(), 0);
    }

    #[tokio::test]
    async fn repeated_backend_errors_open_the_circuit() {
        let limiter = DistributedRateLimiter::new(
            Arc::new(FailingLockService),
            CircuitBreaker::new("test-lock", 3, Duration::from_secs(30)),
        );

        for _ in 0..3 {
            let context = limiter
                .try_acquire(ResourceKind::Vehicle, 1, at(10, 0), at(11, 0))
                .await
                .unwrap();
            assert!(context.is_skipped());
        }
        assert_eq!(limiter.circuit_state(), CircuitState::Open);

        // With the circuit open the backend is not even consulted.
        let context = limiter
            .try_acquire(ResourceKind::Vehicle, 1, at(10, 0), at(11, 0))
            .await
            .unwrap();
        assert!(context.is_skipped());
    }

    #[tokio::test]
    async fn successful_rounds_keep_the_circuit_closed() {
        let locks = Arc::new(InMemoryLockService::new());
        let limiter = limiter_over(locks);

        for _ in 0..5 {
            let mut context = limiter
                .try_acquire(ResourceKind::Vehicle, 1, at(10, 0), at(11, 0))
                .await
                .unwrap();
            limiter.release(&mut context).await;
        }
        assert_eq!(limiter.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn busy_backend_rejects_without_tripping_breaker() {
        let limiter = limiter_over(Arc::new(BusyLockService));

        for _ in 0..10 {
            let result = limiter
                .try_acquire(ResourceKind::Vehicle, 1, at(10, 0), at(11, 0))
                .await;
            assert!(result.is_err());
        }
        assert_eq!(limiter.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn releasing_a_skipped_context_is_a_no_op() {
        let limiter = limiter_over(Arc::new(InMemoryLockService::new()));
        let mut context = LockContext::skipped();
        limiter.release(&mut context).await;
        limiter.release(&mut context).await;
        assert!(context.is_skipped());
    }
}
