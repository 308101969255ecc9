use crate::models::Location;
use std::collections::HashMap;
use std::sync::Arc;

/// Minimum travel minutes between location pairs.
///
/// Pairs are directed and the table is deliberately sparse: a pair that is
/// not listed cannot be driven, which `required_minutes` reports as an
/// effectively infinite requirement.
#[derive(Clone)]
pub struct TravelTimeService {
    table: Arc<HashMap<(Location, Location), i64>>,
}

impl TravelTimeService {
    pub fn new() -> Self {
        let mut table = HashMap::new();
        table.insert((Location::Airport, Location::Hotel), 60);
        table.insert((Location::Hotel, Location::VenueOne), 30);
        table.insert((Location::VenueOne, Location::VenueTwo), 20);
        Self {
            table: Arc::new(table),
        }
    }

    pub fn required_minutes(&self, from: Location, to: Location) -> i64 {
        self.table.get(&(from, to)).copied().unwrap_or(i64::MAX)
    }
}

impl Default for TravelTimeService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_pairs_have_finite_requirements() {
        let travel = TravelTimeService::new();
        assert_eq!(travel.required_minutes(Location::Airport, Location::Hotel), 60);
        assert_eq!(travel.required_minutes(Location::Hotel, Location::VenueOne), 30);
        assert_eq!(travel.required_minutes(Location::VenueOne, Location::VenueTwo), 20);
    }

    #[test]
    fn unlisted_pairs_are_infeasible() {
        let travel = TravelTimeService::new();
        assert_eq!(travel.required_minutes(Location::Hotel, Location::Airport), i64::MAX);
        assert_eq!(travel.required_minutes(Location::Airport, Location::Airport), i64::MAX);
    }
}
