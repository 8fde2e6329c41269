use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pii::Masked;

/// A scheduled run of a train over a route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    pub id: i64,
    pub route_id: i64,
    pub train_id: i64,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    /// Base fare in the smallest currency unit
    pub price: i64,
    /// Only decremented when a reservation is paid for or confirmed
    pub available_seats: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wagon {
    pub id: i64,
    pub train_id: i64,
    pub wagon_number: i32,
    pub class_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Seat {
    pub id: i64,
    pub wagon_id: i64,
    pub seat_row: String,
    pub seat_number: i32,
}

impl Seat {
    /// Printed seat label, e.g. `Wagon 3/A-12`.
    pub fn label(&self, wagon: &Wagon) -> String {
        format!("Wagon {}/{}-{}", wagon.wagon_number, self.seat_row, self.seat_number)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Passenger {
    pub id: Uuid,
    /// Owning user account, absent for passengers registered by someone else
    pub user_id: Option<Uuid>,
    pub name: String,
    pub id_number: Masked<String>,
}
