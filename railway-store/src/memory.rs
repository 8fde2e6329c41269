//! In-process adapters for the store and lock seams.
//!
//! Used by tests and by `storage.backend = "memory"` for local runs.
//! Transactions read from a snapshot taken at `begin` and queue their
//! writes; `commit` replays them against the latest committed tables and
//! fails the whole batch when a write no longer applies (a second active row
//! for a seat, a deleted reservation). `lock_reservation` and
//! `consume_discount` take per-row locks held until the transaction ends,
//! so only writers of the same row wait on each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use railway_core::{
    BookingStore, BookingTx, NewPayment, NewReservation, SeatKey, SeatLock, StoreError,
    StoreResult,
};
use railway_shared::{
    DiscountCode, Passenger, Payment, Reservation, ReservationStatus, Schedule, Seat, Wagon,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub passengers: HashMap<Uuid, Passenger>,
    pub schedules: HashMap<i64, Schedule>,
    pub wagons: HashMap<i64, Wagon>,
    pub seats: HashMap<i64, Seat>,
    pub discounts: HashMap<Uuid, DiscountCode>,
    pub reservations: HashMap<Uuid, Reservation>,
    /// (reservation_id, discount_id)
    pub reservation_discounts: Vec<(Uuid, Uuid)>,
    pub payments: Vec<Payment>,
}

impl Tables {
    fn active_on(&self, key: &SeatKey) -> impl Iterator<Item = &Reservation> + '_ {
        let key = *key;
        self.reservations.values().filter(move |r| {
            r.status.is_active()
                && r.schedule_id == key.schedule_id
                && r.wagon_id == key.wagon_id
                && r.seat_id == key.seat_id
        })
    }

    fn stale_pending(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        let mut stale: Vec<&Reservation> =
            self.reservations.values().filter(|r| r.is_stale(now)).collect();
        stale.sort_by_key(|r| (r.expires_at, r.id));
        stale.into_iter().map(|r| r.id).collect()
    }

    fn reservation_mut(&mut self, id: Uuid) -> StoreResult<&mut Reservation> {
        self.reservations
            .get_mut(&id)
            .ok_or_else(|| StoreError::RowNotFound(format!("reservation {}", id)))
    }

    fn insert_reservation(&mut self, reservation: Reservation) -> StoreResult<()> {
        let key = SeatKey::from(&reservation);
        if reservation.status.is_active() && self.active_on(&key).next().is_some() {
            return Err(StoreError::DuplicateActive(key.lock_key()));
        }
        self.reservations.insert(reservation.id, reservation);
        Ok(())
    }

    fn set_status(&mut self, id: Uuid, status: ReservationStatus, at: DateTime<Utc>) -> StoreResult<()> {
        let reservation = self.reservation_mut(id)?;
        reservation.status = status;
        reservation.updated_at = at;
        Ok(())
    }

    fn delete_reservation(&mut self, id: Uuid) -> StoreResult<()> {
        if self.reservations.remove(&id).is_none() {
            return Err(StoreError::RowNotFound(format!("reservation {}", id)));
        }
        self.reservation_discounts.retain(|(r, _)| *r != id);
        self.payments.retain(|p| p.reservation_id != id);
        Ok(())
    }

    fn consume_discount(&mut self, reservation_id: Uuid, discount_id: Uuid) -> StoreResult<bool> {
        let Some(code) = self.discounts.get_mut(&discount_id) else {
            return Ok(false);
        };
        if code.remaining_uses <= 0 {
            return Ok(false);
        }
        code.remaining_uses -= 1;
        self.reservation_discounts.push((reservation_id, discount_id));
        Ok(true)
    }

    fn adjust_available_seats(&mut self, schedule_id: i64, delta: i32) -> StoreResult<()> {
        let schedule = self
            .schedules
            .get_mut(&schedule_id)
            .ok_or_else(|| StoreError::RowNotFound(format!("schedule {}", schedule_id)))?;
        schedule.available_seats += delta;
        Ok(())
    }

    fn insert_payment(&mut self, payment: Payment) -> StoreResult<()> {
        if !self.reservations.contains_key(&payment.reservation_id) {
            return Err(StoreError::RowNotFound(format!(
                "reservation {}",
                payment.reservation_id
            )));
        }
        self.payments.push(payment);
        Ok(())
    }
}

/// A queued write, replayed against the committed tables on commit.
#[derive(Debug)]
enum Write {
    InsertReservation(Reservation),
    SetStatus {
        id: Uuid,
        status: ReservationStatus,
        at: DateTime<Utc>,
    },
    DeleteReservation(Uuid),
    ConsumeDiscount {
        reservation_id: Uuid,
        discount_id: Uuid,
    },
    AdjustSeats {
        schedule_id: i64,
        delta: i32,
    },
    InsertPayment(Payment),
}

impl Write {
    fn apply(self, tables: &mut Tables) -> StoreResult<()> {
        match self {
            Write::InsertReservation(reservation) => tables.insert_reservation(reservation),
            Write::SetStatus { id, status, at } => tables.set_status(id, status, at),
            Write::DeleteReservation(id) => tables.delete_reservation(id),
            Write::ConsumeDiscount {
                reservation_id,
                discount_id,
            } => {
                if tables.consume_discount(reservation_id, discount_id)? {
                    Ok(())
                } else {
                    Err(StoreError::Database(
                        format!("discount {} has no remaining uses", discount_id).into(),
                    ))
                }
            }
            Write::AdjustSeats { schedule_id, delta } => {
                tables.adjust_available_seats(schedule_id, delta)
            }
            Write::InsertPayment(payment) => tables.insert_payment(payment),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    rows: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate committed state directly, outside any transaction.
    pub async fn seed<F>(&self, f: F)
    where
        F: FnOnce(&mut Tables),
    {
        let mut tables = self.tables.lock().await;
        f(&mut tables);
    }

    /// Copy of the committed state.
    pub async fn snapshot(&self) -> Tables {
        self.tables.lock().await.clone()
    }

    pub async fn reservation(&self, id: Uuid) -> Option<Reservation> {
        self.tables.lock().await.reservations.get(&id).cloned()
    }

    fn row(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.rows.entry(id).or_default().clone()
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn BookingTx>> {
        let working = self.snapshot().await;
        Ok(Box::new(InMemoryTx {
            store: self.clone(),
            working,
            writes: Vec::new(),
            row_locks: HashMap::new(),
        }))
    }
}

pub struct InMemoryTx {
    store: InMemoryStore,
    working: Tables,
    writes: Vec<Write>,
    row_locks: HashMap<Uuid, OwnedMutexGuard<()>>,
}

impl InMemoryTx {
    /// Wait for the row lock, then refresh the row from committed state.
    async fn lock_row(&mut self, id: Uuid) {
        if self.row_locks.contains_key(&id) {
            return;
        }
        let guard = self.store.row(id).lock_owned().await;
        self.row_locks.insert(id, guard);
        self.refresh(id).await;
    }

    /// Take the row lock only if nobody holds it.
    async fn try_lock_row(&mut self, id: Uuid) -> bool {
        if self.row_locks.contains_key(&id) {
            return true;
        }
        let Ok(guard) = self.store.row(id).try_lock_owned() else {
            return false;
        };
        self.row_locks.insert(id, guard);
        self.refresh(id).await;
        true
    }

    async fn refresh(&mut self, id: Uuid) {
        let tables = self.store.tables.lock().await;
        match tables.reservations.get(&id) {
            Some(r) => {
                self.working.reservations.insert(id, r.clone());
            }
            None => {
                self.working.reservations.remove(&id);
            }
        }
        if let Some(code) = tables.discounts.get(&id) {
            self.working.discounts.insert(id, code.clone());
        }
    }

    /// Stale pending rows, each locked by this transaction and re-checked
    /// against committed state. With `skip_locked` rows held elsewhere are
    /// left for a later run; otherwise the call waits for them.
    async fn lock_stale(&mut self, now: DateTime<Utc>, skip_locked: bool) -> Vec<Uuid> {
        let mut locked = Vec::new();
        for id in self.working.stale_pending(now) {
            if skip_locked {
                if !self.try_lock_row(id).await {
                    continue;
                }
            } else {
                self.lock_row(id).await;
            }
            if self.working.reservations.get(&id).is_some_and(|r| r.is_stale(now)) {
                locked.push(id);
            }
        }
        locked
    }

    fn record(&mut self, write: Write) -> StoreResult<()> {
        match &write {
            Write::InsertReservation(r) => self.working.insert_reservation(r.clone())?,
            Write::SetStatus { id, status, at } => self.working.set_status(*id, *status, *at)?,
            Write::DeleteReservation(id) => self.working.delete_reservation(*id)?,
            Write::ConsumeDiscount { .. } => {}
            Write::AdjustSeats { schedule_id, delta } => {
                self.working.adjust_available_seats(*schedule_id, *delta)?
            }
            Write::InsertPayment(p) => self.working.insert_payment(p.clone())?,
        }
        self.writes.push(write);
        Ok(())
    }
}

#[async_trait]
impl BookingTx for InMemoryTx {
    async fn get_passenger(&mut self, id: Uuid) -> StoreResult<Option<Passenger>> {
        Ok(self.working.passengers.get(&id).cloned())
    }

    async fn get_passenger_by_user(&mut self, user_id: Uuid) -> StoreResult<Option<Passenger>> {
        Ok(self
            .working
            .passengers
            .values()
            .find(|p| p.user_id == Some(user_id))
            .cloned())
    }

    async fn get_schedule(&mut self, id: i64) -> StoreResult<Option<Schedule>> {
        Ok(self.working.schedules.get(&id).cloned())
    }

    async fn get_wagon(&mut self, id: i64) -> StoreResult<Option<Wagon>> {
        Ok(self.working.wagons.get(&id).cloned())
    }

    async fn get_seat(&mut self, id: i64) -> StoreResult<Option<Seat>> {
        Ok(self.working.seats.get(&id).cloned())
    }

    async fn count_active_reservations(&mut self, key: &SeatKey) -> StoreResult<i64> {
        Ok(self.working.active_on(key).count() as i64)
    }

    async fn get_discount(&mut self, id: Uuid) -> StoreResult<Option<DiscountCode>> {
        Ok(self.working.discounts.get(&id).cloned())
    }

    async fn consume_discount(&mut self, reservation_id: Uuid, discount_id: Uuid) -> StoreResult<bool> {
        self.lock_row(discount_id).await;
        if !self.working.consume_discount(reservation_id, discount_id)? {
            return Ok(false);
        }
        self.writes.push(Write::ConsumeDiscount {
            reservation_id,
            discount_id,
        });
        Ok(true)
    }

    async fn insert_reservation(&mut self, new: NewReservation) -> StoreResult<Reservation> {
        let now = Utc::now();
        let reservation = Reservation {
            id: Uuid::new_v4(),
            passenger_id: new.passenger_id,
            schedule_id: new.schedule_id,
            wagon_id: new.wagon_id,
            seat_id: new.seat_id,
            discount_id: new.discount_id,
            price: new.price,
            status: new.status,
            booking_date: new.booking_date,
            expires_at: new.expires_at,
            created_at: now,
            updated_at: now,
        };
        self.record(Write::InsertReservation(reservation.clone()))?;
        Ok(reservation)
    }

    async fn get_reservation(&mut self, id: Uuid) -> StoreResult<Option<Reservation>> {
        Ok(self.working.reservations.get(&id).cloned())
    }

    async fn lock_reservation(&mut self, id: Uuid) -> StoreResult<Option<Reservation>> {
        self.lock_row(id).await;
        Ok(self.working.reservations.get(&id).cloned())
    }

    async fn set_reservation_status(&mut self, id: Uuid, status: ReservationStatus) -> StoreResult<()> {
        self.record(Write::SetStatus {
            id,
            status,
            at: Utc::now(),
        })
    }

    async fn delete_reservation(&mut self, id: Uuid) -> StoreResult<()> {
        self.record(Write::DeleteReservation(id))
    }

    async fn list_reservations(&mut self, limit: i64, offset: i64) -> StoreResult<Vec<Reservation>> {
        let mut all: Vec<Reservation> = self.working.reservations.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_reservations(&mut self) -> StoreResult<i64> {
        Ok(self.working.reservations.len() as i64)
    }

    async fn adjust_available_seats(&mut self, schedule_id: i64, delta: i32) -> StoreResult<()> {
        self.record(Write::AdjustSeats { schedule_id, delta })
    }

    async fn insert_payment(&mut self, new: NewPayment) -> StoreResult<Payment> {
        let payment = Payment {
            id: Uuid::new_v4(),
            reservation_id: new.reservation_id,
            payment_method: new.payment_method,
            status: new.status,
            amount: new.amount,
            gateway_response: new.gateway_response,
            transaction_id: new.transaction_id,
            payment_date: new.payment_date,
        };
        self.record(Write::InsertPayment(payment.clone()))?;
        Ok(payment)
    }

    async fn list_payments(&mut self, reservation_id: Uuid) -> StoreResult<Vec<Payment>> {
        Ok(self
            .working
            .payments
            .iter()
            .filter(|p| p.reservation_id == reservation_id)
            .cloned()
            .collect())
    }

    async fn expire_unpaid_reservations(&mut self, now: DateTime<Utc>) -> StoreResult<u64> {
        let stale = self.lock_stale(now, false).await;
        for id in &stale {
            self.set_reservation_status(*id, ReservationStatus::Expired)
                .await?;
        }
        Ok(stale.len() as u64)
    }

    async fn list_stale_pending(&mut self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        Ok(self.lock_stale(now, true).await)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let InMemoryTx {
            store,
            writes,
            row_locks,
            ..
        } = *self;
        let mut tables = store.tables.lock().await;
        let mut next = tables.clone();
        for write in writes {
            write.apply(&mut next)?;
        }
        *tables = next;
        drop(tables);
        drop(row_locks);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

/// Seat lock held in a concurrent map of key to deadline.
#[derive(Clone, Default)]
pub struct InMemorySeatLock {
    entries: Arc<DashMap<String, Instant>>,
    offline: Arc<AtomicBool>,
}

impl InMemorySeatLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, key: &SeatKey) -> bool {
        self.entries
            .get(&key.lock_key())
            .is_some_and(|deadline| *deadline > Instant::now())
    }

    /// Make every call fail as if the lock store were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Lock("lock store unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SeatLock for InMemorySeatLock {
    async fn acquire(&self, key: &SeatKey, ttl: Duration) -> StoreResult<bool> {
        self.check_online()?;
        let now = Instant::now();
        match self.entries.entry(key.lock_key()) {
            Entry::Occupied(mut held) => {
                if *held.get() > now {
                    return Ok(false);
                }
                held.insert(now + ttl);
                Ok(true)
            }
            Entry::Vacant(slot) => {
                slot.insert(now + ttl);
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &SeatKey) -> StoreResult<()> {
        self.check_online()?;
        self.entries.remove(&key.lock_key());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railway_shared::PaymentStatus;

    fn pending(schedule_id: i64, wagon_id: i64, seat_id: i64) -> NewReservation {
        let now = Utc::now();
        NewReservation {
            passenger_id: Uuid::new_v4(),
            schedule_id,
            wagon_id,
            seat_id,
            discount_id: None,
            price: 50,
            status: ReservationStatus::Pending,
            booking_date: now,
            expires_at: now + chrono::Duration::minutes(15),
        }
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_released() {
        let locks = InMemorySeatLock::new();
        let key = SeatKey::new(7, 3, 12);

        assert!(locks.acquire(&key, Duration::from_secs(300)).await.unwrap());
        assert!(!locks.acquire(&key, Duration::from_secs(300)).await.unwrap());
        assert!(locks.is_locked(&key));

        locks.release(&key).await.unwrap();
        locks.release(&key).await.unwrap();
        assert!(!locks.is_locked(&key));
        assert!(locks.acquire(&key, Duration::from_secs(300)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_lapses_after_ttl() {
        let locks = InMemorySeatLock::new();
        let key = SeatKey::new(1, 1, 1);

        assert!(locks.acquire(&key, Duration::from_secs(5)).await.unwrap());
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(!locks.is_locked(&key));
        assert!(locks.acquire(&key, Duration::from_secs(5)).await.unwrap());
    }

    #[tokio::test]
    async fn test_offline_lock_reports_errors() {
        let locks = InMemorySeatLock::new();
        locks.set_offline(true);
        let err = locks
            .acquire(&SeatKey::new(1, 1, 1), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Lock(_)));
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let store = InMemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_reservation(pending(7, 3, 12)).await.unwrap();
        drop(tx);
        assert!(store.snapshot().await.reservations.is_empty());

        let mut tx = store.begin().await.unwrap();
        let r = tx.insert_reservation(pending(7, 3, 12)).await.unwrap();
        tx.rollback().await.unwrap();
        assert!(store.reservation(r.id).await.is_none());

        let mut tx = store.begin().await.unwrap();
        let r = tx.insert_reservation(pending(7, 3, 12)).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.reservation(r.id).await.unwrap().price, 50);
    }

    #[tokio::test]
    async fn test_second_active_row_for_a_seat_is_rejected() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let first = tx.insert_reservation(pending(7, 3, 12)).await.unwrap();

        let err = tx.insert_reservation(pending(7, 3, 12)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateActive(_)));

        tx.set_reservation_status(first.id, ReservationStatus::Canceled)
            .await
            .unwrap();
        tx.insert_reservation(pending(7, 3, 12)).await.unwrap();
        assert_eq!(tx.count_active_reservations(&SeatKey::new(7, 3, 12)).await.unwrap(), 1);
    }

    async fn committed_pending(store: &InMemoryStore, seat_id: i64) -> Reservation {
        let mut tx = store.begin().await.unwrap();
        let r = tx.insert_reservation(pending(7, 3, seat_id)).await.unwrap();
        tx.commit().await.unwrap();
        r
    }

    #[tokio::test]
    async fn test_open_transaction_does_not_block_other_requests() {
        let store = InMemoryStore::new();
        let held = committed_pending(&store, 12).await;
        let other = committed_pending(&store, 13).await;

        let mut slow = store.begin().await.unwrap();
        slow.lock_reservation(held.id).await.unwrap();

        let read = tokio::time::timeout(Duration::from_secs(1), async {
            let mut tx = store.begin().await.unwrap();
            let row = tx.lock_reservation(other.id).await.unwrap();
            tx.set_reservation_status(other.id, ReservationStatus::Confirmed)
                .await
                .unwrap();
            tx.commit().await.unwrap();
            row
        })
        .await
        .expect("a held row lock blocked an unrelated transaction");
        assert_eq!(read.unwrap().id, other.id);
        assert_eq!(
            store.reservation(other.id).await.unwrap().status,
            ReservationStatus::Confirmed
        );
        slow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_row_lock_waits_for_the_holder_and_sees_its_commit() {
        let store = InMemoryStore::new();
        let r = committed_pending(&store, 12).await;

        let mut first = store.begin().await.unwrap();
        first.lock_reservation(r.id).await.unwrap();

        let contender = store.clone();
        let waiter = tokio::spawn(async move {
            let mut tx = contender.begin().await.unwrap();
            let row = tx.lock_reservation(r.id).await.unwrap();
            tx.rollback().await.unwrap();
            row
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        first
            .set_reservation_status(r.id, ReservationStatus::Confirmed)
            .await
            .unwrap();
        first.commit().await.unwrap();

        let seen = waiter.await.unwrap().unwrap();
        assert_eq!(seen.status, ReservationStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_commit_rejects_a_second_active_row_from_a_concurrent_tx() {
        let store = InMemoryStore::new();
        let mut a = store.begin().await.unwrap();
        let mut b = store.begin().await.unwrap();

        a.insert_reservation(pending(7, 3, 12)).await.unwrap();
        b.insert_reservation(pending(7, 3, 12)).await.unwrap();

        a.commit().await.unwrap();
        let err = b.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateActive(_)));
        assert_eq!(store.snapshot().await.reservations.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_scan_skips_rows_locked_elsewhere() {
        let store = InMemoryStore::new();
        let r = committed_pending(&store, 12).await;
        let later = Utc::now() + chrono::Duration::minutes(16);

        let mut payer = store.begin().await.unwrap();
        payer.lock_reservation(r.id).await.unwrap();

        let mut sweep = store.begin().await.unwrap();
        assert!(sweep.list_stale_pending(later).await.unwrap().is_empty());
        sweep.rollback().await.unwrap();

        payer.rollback().await.unwrap();
        let mut sweep = store.begin().await.unwrap();
        assert_eq!(sweep.list_stale_pending(later).await.unwrap(), vec![r.id]);
    }

    #[tokio::test]
    async fn test_discount_uses_are_taken_one_tx_at_a_time() {
        let store = InMemoryStore::new();
        let code = Uuid::new_v4();
        store
            .seed(|t| {
                t.discounts.insert(
                    code,
                    DiscountCode {
                        id: code,
                        code: "LAST1".into(),
                        discount_percent: 10,
                        expires_at: None,
                        remaining_uses: 1,
                    },
                );
            })
            .await;

        let mut first = store.begin().await.unwrap();
        assert!(first.consume_discount(Uuid::new_v4(), code).await.unwrap());

        let contender = store.clone();
        let second = tokio::spawn(async move {
            let mut tx = contender.begin().await.unwrap();
            tx.consume_discount(Uuid::new_v4(), code).await.unwrap()
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        first.commit().await.unwrap();

        assert!(!second.await.unwrap());
        assert_eq!(store.snapshot().await.discounts[&code].remaining_uses, 0);
    }

    #[tokio::test]
    async fn test_delete_cascades_payments() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let r = tx.insert_reservation(pending(1, 1, 1)).await.unwrap();
        tx.insert_payment(NewPayment {
            reservation_id: r.id,
            payment_method: "card".into(),
            status: PaymentStatus::Failed,
            amount: 50,
            gateway_response: Some("declined".into()),
            transaction_id: Uuid::new_v4(),
            payment_date: Utc::now(),
        })
        .await
        .unwrap();
        tx.delete_reservation(r.id).await.unwrap();

        assert!(tx.list_payments(r.id).await.unwrap().is_empty());
        assert!(matches!(
            tx.delete_reservation(r.id).await,
            Err(StoreError::RowNotFound(_))
        ));
    }
}
