use crate::models::Location;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Operator,
    Volunteer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Operator => "OPERATOR",
            UserRole::Volunteer => "VOLUNTEER",
        }
    }

    pub fn parse(s: &str) -> Option<UserRole> {
        match s {
            "OPERATOR" => Some(UserRole::Operator),
            "VOLUNTEER" => Some(UserRole::Volunteer),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operators create reservations; volunteers act as dispatchers riding along
/// with the vehicle.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub role: UserRole,
    pub name: String,
    pub base_location: Location,
}
