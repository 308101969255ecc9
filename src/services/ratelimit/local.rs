use crate::api::middleware::error::{ApiError, ApiResult};
use crate::observability::RATE_LIMIT_REJECTED_TOTAL;
use crate::services::ratelimit::{slot_keys, ResourceKind};
use chrono::{NaiveDate, NaiveDateTime};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Concurrent holders allowed per resource+slot. 1 means full serialization;
/// raising it admits that much concurrency per slot.
const PERMITS_PER_SLOT: usize = 1;

/// Permits acquired for one admission attempt.
///
/// Holds the semaphore permits themselves, so dropping the set (or calling
/// [`ResourceRateLimiter::release`]) frees every slot at once and a second
/// release is a no-op.
#[derive(Debug, Default)]
pub struct SlotPermits {
    keys: HashSet<String>,
    permits: Vec<OwnedSemaphorePermit>,
}

impl SlotPermits {
    pub fn keys(&self) -> &HashSet<String> {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.permits.is_empty()
    }

    /// Fold another acquisition into this one so both release together.
    pub fn merge(&mut self, other: SlotPermits) {
        self.keys.extend(other.keys);
        self.permits.extend(other.permits);
    }
}

/// In-process admission layer: one lazily created counting semaphore per
/// resource+hour slot, held in a sharded concurrent registry.
///
/// Keys look like `VEHICLE_1_2024-01-15_SLOT_10`. Entries survive until the
/// janitor sweep removes slots for dates older than a cutoff; a slot whose
/// permit is currently held is never removed.
pub struct ResourceRateLimiter {
    semaphores: DashMap<String, Arc<Semaphore>>,
}

impl ResourceRateLimiter {
    pub fn new() -> Self {
        Self {
            semaphores: DashMap::new(),
        }
    }

    /// Non-blocking acquisition of every slot the interval touches.
    ///
    /// Fails with `AdmissionRejected` if any slot is busy; nothing stays
    /// acquired on failure.
    pub fn try_acquire(
        &self,
        kind: ResourceKind,
        resource_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> ApiResult<SlotPermits> {
        let mut acquired = SlotPermits::default();

        for key in slot_keys(kind, resource_id, start, end) {
            let semaphore = self
                .semaphores
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Semaphore::new(PERMITS_PER_SLOT)))
                .value()
                .clone();

            match semaphore.try_acquire_owned() {
                Ok(permit) => {
                    acquired.keys.insert(key);
                    acquired.permits.push(permit);
                }
                Err(_) => {
                    // Permits already taken in this call drop with `acquired`.
                    metrics::counter!(RATE_LIMIT_REJECTED_TOTAL, "layer" => "local").increment(1);
                    return Err(ApiError::AdmissionRejected(format!(
                        "{} {} already has a request in flight for this time window",
                        kind, resource_id
                    )));
                }
            }
        }

        Ok(acquired)
    }

    /// Return every permit in the set. Safe to call twice.
    pub fn release(&self, permits: &mut SlotPermits) {
        permits.permits.clear();
        permits.keys.clear();
    }

    /// Diagnostics: live semaphores in the registry.
    pub fn active_semaphore_count(&self) -> usize {
        self.semaphores.len()
    }

    /// Janitor sweep: drop slots for dates before `cutoff`, keeping any slot
    /// whose permit is currently held. Returns how many were removed.
    pub fn cleanup_expired_slots(&self, cutoff: NaiveDate) -> usize {
        let cutoff = cutoff.to_string();
        let before = self.semaphores.len();
        self.semaphores.retain(|key, semaphore| {
            // Key layout: KIND_ID_DATE_SLOT_HH
            let date = key.split('_').nth(2).unwrap_or("");
            date >= cutoff.as_str() || semaphore.available_permits() < PERMITS_PER_SLOT
        });
        before - self.semaphores.len()
    }
}

impl Default for ResourceRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
