use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use railway_shared::Reservation;
use serde::{Deserialize, Serialize};

use crate::StoreResult;

/// Identifies one physical seat on one scheduled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatKey {
    pub schedule_id: i64,
    pub wagon_id: i64,
    pub seat_id: i64,
}

impl SeatKey {
    pub fn new(schedule_id: i64, wagon_id: i64, seat_id: i64) -> Self {
        Self {
            schedule_id,
            wagon_id,
            seat_id,
        }
    }

    /// Key used in the lock store
    pub fn lock_key(&self) -> String {
        format!("seat_lock:{}:{}:{}", self.schedule_id, self.wagon_id, self.seat_id)
    }
}

impl fmt::Display for SeatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lock_key())
    }
}

impl From<&Reservation> for SeatKey {
    fn from(reservation: &Reservation) -> Self {
        SeatKey::new(reservation.schedule_id, reservation.wagon_id, reservation.seat_id)
    }
}

/// Short-lived conditional mutual exclusion over a seat.
///
/// There is no ownership token: anyone holding the key can release it, so
/// only the path that just acquired the lock (or the confirming path) may
/// call `release`.
#[async_trait]
pub trait SeatLock: Send + Sync {
    /// Sets the key only if absent. `Ok(false)` means the seat is busy.
    async fn acquire(&self, key: &SeatKey, ttl: Duration) -> StoreResult<bool>;

    /// Deletes the key. Releasing an absent key is not an error.
    async fn release(&self, key: &SeatKey) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key_format() {
        assert_eq!(SeatKey::new(7, 3, 12).lock_key(), "seat_lock:7:3:12");
    }
}
