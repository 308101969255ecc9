use serde::{Deserialize, Serialize};
use std::fmt;

/// Venue locations served by the transportation fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Location {
    Airport,
    Hotel,
    VenueOne,
    VenueTwo,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Airport => "AIRPORT",
            Location::Hotel => "HOTEL",
            Location::VenueOne => "VENUE_ONE",
            Location::VenueTwo => "VENUE_TWO",
        }
    }

    pub fn parse(s: &str) -> Option<Location> {
        match s {
            "AIRPORT" => Some(Location::Airport),
            "HOTEL" => Some(Location::Hotel),
            "VENUE_ONE" => Some(Location::VenueOne),
            "VENUE_TWO" => Some(Location::VenueTwo),
            _ => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
