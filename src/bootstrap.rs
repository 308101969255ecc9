use crate::api::middleware::AppState;
use crate::config::Config;
use crate::database::Database;
use crate::observability::LOCAL_SLOT_SEMAPHORES;
use crate::services::lock_service::{DatabaseLockService, LockService};
use crate::services::ratelimit::{
    CircuitBreaker, CompositeRateLimiter, DistributedRateLimiter, ResourceRateLimiter,
};
use crate::services::reservation_service::ReservationService;
use crate::services::travel_time::TravelTimeService;
use std::sync::Arc;
use std::time::Duration;

/// Wire every component once at startup and hand the shared state to the
/// router. The permit registry and circuit breaker live here for the whole
/// process lifetime.
pub async fn build_app_state(
    db: Database,
    config: &Config,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let local_limiter = Arc::new(ResourceRateLimiter::new());

    let lock_service: Arc<dyn LockService> = Arc::new(DatabaseLockService::new(
        db.clone(),
        Duration::from_secs(config.lock_ttl_secs),
    ));
    let circuit_breaker = CircuitBreaker::new(
        "distributed-lock",
        config.circuit_failure_threshold,
        Duration::from_secs(config.circuit_open_timeout_secs),
    );
    let distributed_limiter = Arc::new(DistributedRateLimiter::new(lock_service, circuit_breaker));
    tracing::info!("admission layers initialized");

    let composite_limiter = Arc::new(CompositeRateLimiter::new(
        local_limiter.clone(),
        distributed_limiter.clone(),
    ));

    let reservation_service = ReservationService::new(
        db.clone(),
        TravelTimeService::new(),
        composite_limiter,
    );
    tracing::info!("reservation service initialized");

    spawn_slot_janitor(local_limiter.clone(), config.slot_janitor_interval_secs);

    Ok(AppState {
        db,
        reservation_service,
        local_limiter,
        distributed_limiter,
    })
}

/// Periodically drop permit semaphores for past dates so the registry does
/// not grow forever.
fn spawn_slot_janitor(limiter: Arc<ResourceRateLimiter>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let cutoff = chrono::Utc::now().date_naive();
            let removed = limiter.cleanup_expired_slots(cutoff);
            metrics::gauge!(LOCAL_SLOT_SEMAPHORES).set(limiter.active_semaphore_count() as f64);
            if removed > 0 {
                tracing::debug!("janitor removed {} expired slot semaphores", removed);
            }
        }
    });
}
