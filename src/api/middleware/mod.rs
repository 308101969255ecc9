pub mod error;

pub use error::*;

use crate::database::Database;
use crate::services::ratelimit::{DistributedRateLimiter, ResourceRateLimiter};
use crate::services::ReservationService;
use std::sync::Arc;

/// Shared handler state, built once in `bootstrap::build_app_state`.
///
/// The rate-limiter layers are also held here directly (not only inside the
/// reservation service) so the operational endpoints can inspect the circuit
/// breaker and the live permit registry.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub reservation_service: ReservationService,
    pub local_limiter: Arc<ResourceRateLimiter>,
    pub distributed_limiter: Arc<DistributedRateLimiter>,
}
