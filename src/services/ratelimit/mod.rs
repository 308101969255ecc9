pub mod circuit_breaker;
pub mod composite;
pub mod distributed;
pub mod local;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use composite::{CompositeContext, CompositeRateLimiter};
pub use distributed::{DistributedRateLimiter, LockContext};
pub use local::{ResourceRateLimiter, SlotPermits};

use chrono::{NaiveDateTime, Timelike};
use std::collections::HashSet;
use std::fmt;

/// Which shared resource an admission attempt is serializing on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Vehicle,
    Dispatcher,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Vehicle => f.write_str("VEHICLE"),
            ResourceKind::Dispatcher => f.write_str("DISPATCHER"),
        }
    }
}

/// Break `[start, end)` into hour-granularity slot keys for one resource.
///
/// The start hour is inclusive. The end hour is excluded when the interval
/// ends exactly on the hour, included otherwise: 10:30-12:15 covers slots
/// {10, 11, 12}, while 10:00-12:00 covers {10, 11}. The calendar date comes
/// from the start time.
///
/// This is a throughput approximation for the rate-limit layers only; the
/// store-level overlap query is the source of truth for conflicts.
pub fn slot_keys(
    kind: ResourceKind,
    resource_id: i64,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> HashSet<String> {
    let start_hour = start.hour() as i64;
    let mut end_hour = end.hour() as i64;

    if end.minute() == 0 && end.second() == 0 {
        end_hour -= 1;
    }

    let date = start.date();
    let mut keys = HashSet::new();
    for hour in start_hour..=end_hour {
        keys.insert(format!("{}_{}_{}_SLOT_{:02}", kind, resource_id, date, hour));
    }
    keys
}
