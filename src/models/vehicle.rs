use crate::models::Location;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    Idle,
    Moving,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Idle => "IDLE",
            VehicleStatus::Moving => "MOVING",
        }
    }

    pub fn parse(s: &str) -> Option<VehicleStatus> {
        match s {
            "IDLE" => Some(VehicleStatus::Idle),
            "MOVING" => Some(VehicleStatus::Moving),
            _ => None,
        }
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fleet vehicle. The base location is where the vehicle sits when it has
/// no reservation history before a given point in time.
#[derive(Debug, Clone, Serialize)]
pub struct Vehicle {
    pub id: i64,
    pub base_location: Location,
    pub status: VehicleStatus,
}
