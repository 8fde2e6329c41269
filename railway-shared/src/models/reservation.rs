use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::payment::PaymentStatus;
use crate::pii::Masked;

/// Reservation status in the booking lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Canceled,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Canceled => "canceled",
            ReservationStatus::Expired => "expired",
        }
    }

    /// Active reservations claim their seat.
    pub fn is_active(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Confirmed)
    }

    /// Legal lifecycle moves. Removing a canceled row is not a status change.
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Canceled) | (Pending, Expired) | (Confirmed, Canceled)
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown reservation status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for ReservationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "canceled" => Ok(ReservationStatus::Canceled),
            "expired" => Ok(ReservationStatus::Expired),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A held or booked seat on a scheduled run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reservation {
    pub id: Uuid,
    pub passenger_id: Uuid,
    pub schedule_id: i64,
    pub wagon_id: i64,
    pub seat_id: i64,
    pub discount_id: Option<Uuid>,
    pub price: i64,
    pub status: ReservationStatus,
    pub booking_date: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Pending and past its hold window.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && self.expires_at < now
    }
}

/// Ticket view of a reservation with its passenger, train, seat and latest
/// payment attempt resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservationDetail {
    pub reservation_id: Uuid,
    pub status: ReservationStatus,
    pub passenger_name: String,
    pub passenger_id_number: Masked<String>,
    pub schedule_id: i64,
    pub train_id: i64,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub class_type: String,
    pub seat_label: String,
    pub ticket_price: i64,
    pub booking_date: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub discount_code: Option<String>,
    pub payment_amount: Option<i64>,
    pub payment_method: Option<String>,
    pub payment_status: Option<PaymentStatus>,
}

/// Booking request as parsed by the delivery layer.
///
/// `user_id` comes from the caller's session, never from the body; it is
/// used to find the passenger when `passenger_id` is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub passenger_id: Option<Uuid>,
    #[serde(skip)]
    pub user_id: Option<Uuid>,
    pub schedule_id: i64,
    pub wagon_id: i64,
    pub seat_id: i64,
    pub discount_id: Option<Uuid>,
}
