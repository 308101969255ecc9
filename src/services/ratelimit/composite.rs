use crate::api::middleware::error::ApiResult;
use crate::services::ratelimit::{
    DistributedRateLimiter, LockContext, ResourceKind, ResourceRateLimiter, SlotPermits,
};
use chrono::NaiveDateTime;
use std::sync::Arc;

/// Everything one composite acquisition holds: the merged local permit set
/// and one distributed context per resource.
#[derive(Debug, Default)]
pub struct CompositeContext {
    local_permits: SlotPermits,
    vehicle_lock: LockContext,
    dispatcher_lock: LockContext,
}

/// Layered admission controller.
///
/// Layer 1 is the in-process semaphore registry, layer 2 the distributed
/// leases. Local runs first: it is cheap and filters most contention before
/// the lock backend is touched. Acquisition is all-or-nothing — a failure at
/// any stage unwinds every permit and lease already taken in this call.
pub struct CompositeRateLimiter {
    local: Arc<ResourceRateLimiter>,
    distributed: Arc<DistributedRateLimiter>,
}

impl CompositeRateLimiter {
    pub fn new(local: Arc<ResourceRateLimiter>, distributed: Arc<DistributedRateLimiter>) -> Self {
        Self { local, distributed }
    }

    pub async fn acquire(
        &self,
        vehicle_id: i64,
        dispatcher_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> ApiResult<CompositeContext> {
        let mut context = CompositeContext::default();

        // Layer 1: local semaphores.
        match self
            .local
            .try_acquire(ResourceKind::Vehicle, vehicle_id, start, end)
        {
            Ok(permits) => context.local_permits.merge(permits),
            Err(e) => {
                self.release(&mut context).await;
                return Err(e);
            }
        }
        match self
            .local
            .try_acquire(ResourceKind::Dispatcher, dispatcher_id, start, end)
        {
            Ok(permits) => context.local_permits.merge(permits),
            Err(e) => {
                self.release(&mut context).await;
                return Err(e);
            }
        }

        // Layer 2: distributed leases.
        match self
            .distributed
            .try_acquire(ResourceKind::Vehicle, vehicle_id, start, end)
            .await
        {
            Ok(lock) => context.vehicle_lock = lock,
            Err(e) => {
                self.release(&mut context).await;
                return Err(e);
            }
        }
        match self
            .distributed
            .try_acquire(ResourceKind::Dispatcher, dispatcher_id, start, end)
            .await
        {
            Ok(lock) => context.dispatcher_lock = lock,
            Err(e) => {
                self.release(&mut context).await;
                return Err(e);
            }
        }

        Ok(context)
    }

    /// Unwind both layers, regardless of which one actually admitted. Safe to
    /// call twice.
    pub async fn release(&self, context: &mut CompositeContext) {
        self.local.release(&mut context.local_permits);
        self.distributed.release(&mut context.vehicle_lock).await;
        self.distributed.release(&mut context.dispatcher_lock).await;
    }
}
