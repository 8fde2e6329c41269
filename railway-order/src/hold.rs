use std::sync::Arc;
use std::time::Duration;

use railway_core::{SeatKey, SeatLock, StoreResult};
use tracing::{debug, warn};

/// An acquired seat lock that must be either kept or released.
///
/// A hold dropped while still armed (panic, or the request future being
/// cancelled) releases the lock from a spawned task, so a failed booking
/// never blocks the seat for the full TTL.
pub struct SeatHold {
    locks: Arc<dyn SeatLock>,
    key: SeatKey,
    armed: bool,
}

impl SeatHold {
    /// `Ok(None)` when another caller holds the seat.
    pub async fn acquire(
        locks: Arc<dyn SeatLock>,
        key: SeatKey,
        ttl: Duration,
    ) -> StoreResult<Option<Self>> {
        if !locks.acquire(&key, ttl).await? {
            return Ok(None);
        }
        debug!("seat lock acquired: {}", key);
        Ok(Some(Self {
            locks,
            key,
            armed: true,
        }))
    }

    /// Leave the lock in place until payment or TTL.
    pub fn keep(mut self) {
        self.armed = false;
    }

    pub async fn release(mut self) {
        self.armed = false;
        release_seat(self.locks.as_ref(), &self.key).await;
    }
}

impl Drop for SeatHold {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let locks = self.locks.clone();
        let key = self.key;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    release_seat(locks.as_ref(), &key).await;
                });
            }
            Err(_) => warn!("no runtime to release {}, leaving it to the TTL", key),
        }
    }
}

/// Compensating release. Failures are logged; the TTL is the backstop.
pub async fn release_seat(locks: &dyn SeatLock, key: &SeatKey) {
    match locks.release(key).await {
        Ok(()) => debug!("seat lock released: {}", key),
        Err(e) => warn!("failed to release seat lock {}: {}", key, e),
    }
}
