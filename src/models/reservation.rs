use crate::models::Location;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Created,
    InProgress,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Created => "CREATED",
            ReservationStatus::InProgress => "IN_PROGRESS",
            ReservationStatus::Completed => "COMPLETED",
            ReservationStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<ReservationStatus> {
        match s {
            "CREATED" => Some(ReservationStatus::Created),
            "IN_PROGRESS" => Some(ReservationStatus::InProgress),
            "COMPLETED" => Some(ReservationStatus::Completed),
            "CANCELLED" => Some(ReservationStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A booking of one vehicle and one dispatcher for a half-open time interval
/// `[start_time, end_time)`.
///
/// The id is assigned by the store at insert time and increases monotonically
/// across all inserts; the admission protocol relies on that ordering to
/// decide races. The version column is the optimistic-concurrency token for
/// later mutation.
#[derive(Debug, Clone, Serialize)]
pub struct Reservation {
    pub id: i64,
    pub vehicle_id: i64,
    pub dispatcher_id: i64,
    pub operator_id: i64,
    pub from_location: Location,
    pub to_location: Location,
    pub status: ReservationStatus,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub version: i64,
    pub updated_at: String,
}

/// Everything a caller supplies to create a reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReservationCommand {
    pub operator_id: i64,
    pub vehicle_id: i64,
    pub dispatcher_id: i64,
    pub from_location: Location,
    pub to_location: Location,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}
