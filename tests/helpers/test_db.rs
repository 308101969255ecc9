use chrono::{NaiveDate, NaiveDateTime};
use motorpool::database::Database;
use motorpool::models::{Location, UserRole, VehicleStatus};
use motorpool::services::lock_service::DatabaseLockService;
use motorpool::services::ratelimit::{
    CircuitBreaker, CompositeRateLimiter, DistributedRateLimiter, ResourceRateLimiter,
};
use motorpool::services::{LockService, ReservationService, TravelTimeService};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub async fn setup_test_db() -> Database {
    // Install drivers for AnyPool (required for tests)
    sqlx::any::install_default_drivers();

    // File-based SQLite with a unique name per test so tests can run in
    // parallel.
    let temp_file = format!("test_{}.db", Uuid::new_v4());
    let db_url = format!("sqlite://{}?mode=rwc", temp_file);

    let db = Database::connect(&db_url)
        .await
        .expect("Failed to connect to test database");

    db.run_migrations()
        .await
        .expect("Failed to create test schema");

    db
}

/// One operator, one vehicle and one dispatcher, all based at the airport.
/// Returns (operator_id, vehicle_id, dispatcher_id).
pub async fn seed_fleet(db: &Database) -> (i64, i64, i64) {
    let operator = db
        .create_user(UserRole::Operator, "Operator1", Location::Airport)
        .await
        .unwrap();
    let vehicle = db
        .create_vehicle(Location::Airport, VehicleStatus::Idle)
        .await
        .unwrap();
    let dispatcher = db
        .create_user(UserRole::Volunteer, "Dispatcher1", Location::Airport)
        .await
        .unwrap();
    (operator.id, vehicle.id, dispatcher.id)
}

/// Full production wiring over the given store: local semaphores, database
/// lock service, circuit breaker, composite controller.
pub fn reservation_service(db: &Database) -> ReservationService {
    let lock_service: Arc<dyn LockService> = Arc::new(DatabaseLockService::new(
        db.clone(),
        Duration::from_secs(30),
    ));
    build_service(db, lock_service)
}

/// Same wiring but with a caller-supplied lock backend, for degraded-mode
/// and multi-process style tests.
pub fn reservation_service_with_locks(
    db: &Database,
    lock_service: Arc<dyn LockService>,
) -> ReservationService {
    build_service(db, lock_service)
}

fn build_service(db: &Database, lock_service: Arc<dyn LockService>) -> ReservationService {
    let local = Arc::new(ResourceRateLimiter::new());
    let distributed = Arc::new(DistributedRateLimiter::new(
        lock_service,
        CircuitBreaker::new("distributed-lock", 5, Duration::from_secs(30)),
    ));
    let composite = Arc::new(CompositeRateLimiter::new(local, distributed));
    ReservationService::new(db.clone(), TravelTimeService::new(), composite)
}

pub fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}
