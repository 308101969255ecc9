pub mod lock_service;
pub mod ratelimit;
pub mod reservation_service;
pub mod travel_time;

pub use lock_service::{DatabaseLockService, Lease, LockService};
pub use reservation_service::ReservationService;
pub use travel_time::TravelTimeService;
