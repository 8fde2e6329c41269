use std::sync::Arc;
use std::time::Duration;

use railway_core::{BookingResult, BookingStore, BookingTx, SeatLock};
use tracing::error;

/// Timing rules for holds and background reconciliation
#[derive(Debug, Clone)]
pub struct BookingPolicy {
    /// TTL of the seat lock taken at admission
    pub seat_lock_ttl: Duration,
    /// How long a pending reservation stays payable. Longer than the lock
    /// TTL so the sweepers still find the row after the lock lapses.
    pub hold_window: chrono::Duration,
    pub sweep_interval: Duration,
    /// Upper bound on one sweeper run, transaction included
    pub sweep_deadline: Duration,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            seat_lock_ttl: Duration::from_secs(5 * 60),
            hold_window: chrono::Duration::minutes(15),
            sweep_interval: Duration::from_secs(5 * 60),
            sweep_deadline: Duration::from_secs(10),
        }
    }
}

/// Dependencies shared by the reservation, payment and sweeper operations.
#[derive(Clone)]
pub struct BookingContext {
    pub store: Arc<dyn BookingStore>,
    pub locks: Arc<dyn SeatLock>,
    pub policy: BookingPolicy,
}

impl BookingContext {
    pub fn new(store: Arc<dyn BookingStore>, locks: Arc<dyn SeatLock>, policy: BookingPolicy) -> Self {
        Self {
            store,
            locks,
            policy,
        }
    }

    pub async fn begin(&self) -> BookingResult<Box<dyn BookingTx>> {
        self.store.begin().await.map_err(|e| {
            error!("failed to begin transaction: {}", e);
            e.into()
        })
    }
}

/// Commit on success, roll back on failure.
pub async fn finish<T>(tx: Box<dyn BookingTx>, result: BookingResult<T>) -> BookingResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                error!("failed to commit transaction: {}", e);
                e
            })?;
            Ok(value)
        }
        Err(err) => {
            rollback(tx).await;
            Err(err)
        }
    }
}

pub async fn rollback(tx: Box<dyn BookingTx>) {
    if let Err(e) = tx.rollback().await {
        error!("rollback failed: {}", e);
    }
}
