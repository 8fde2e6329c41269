#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use railway_order::{BookingContext, BookingPolicy};
use railway_shared::{DiscountCode, Passenger, ReservationRequest, Schedule, Seat, Wagon};
use railway_store::{InMemorySeatLock, InMemoryStore};
use uuid::Uuid;

pub const SCHEDULE: i64 = 7;
pub const WAGON: i64 = 3;
pub const SEAT: i64 = 12;
/// Second seat in the same wagon
pub const OTHER_SEAT: i64 = 13;
/// Wagon on a different train than `SCHEDULE`
pub const FOREIGN_WAGON: i64 = 4;
pub const FOREIGN_SEAT: i64 = 40;
/// 200-unit schedule on the same train
pub const PREMIUM_SCHEDULE: i64 = 8;

pub const INITIAL_SEATS: i32 = 40;

pub struct Fixture {
    pub store: InMemoryStore,
    pub locks: InMemorySeatLock,
    pub ctx: BookingContext,
    pub passenger_id: Uuid,
    pub user_id: Uuid,
    /// X10: 10 %, 5 uses, no expiry
    pub x10: Uuid,
    /// 10 %, expired yesterday
    pub expired_code: Uuid,
    /// 10 %, no uses left
    pub spent_code: Uuid,
}

pub async fn fixture() -> Fixture {
    fixture_with(BookingPolicy::default()).await
}

pub async fn fixture_with(policy: BookingPolicy) -> Fixture {
    let store = InMemoryStore::new();
    let locks = InMemorySeatLock::new();
    let passenger_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let x10 = Uuid::new_v4();
    let expired_code = Uuid::new_v4();
    let spent_code = Uuid::new_v4();

    store
        .seed(|t| {
            let now = Utc::now();
            for (id, price) in [(SCHEDULE, 50), (PREMIUM_SCHEDULE, 200)] {
                t.schedules.insert(
                    id,
                    Schedule {
                        id,
                        route_id: 1,
                        train_id: 1,
                        departure_time: now + chrono::Duration::days(3),
                        arrival_time: now + chrono::Duration::days(3) + chrono::Duration::hours(4),
                        price,
                        available_seats: INITIAL_SEATS,
                    },
                );
            }
            for (id, train_id, number) in [(WAGON, 1, 3), (FOREIGN_WAGON, 2, 1)] {
                t.wagons.insert(
                    id,
                    Wagon {
                        id,
                        train_id,
                        wagon_number: number,
                        class_type: "economy".to_string(),
                    },
                );
            }
            for (id, wagon_id, number) in [(SEAT, WAGON, 12), (OTHER_SEAT, WAGON, 13), (FOREIGN_SEAT, FOREIGN_WAGON, 1)] {
                t.seats.insert(
                    id,
                    Seat {
                        id,
                        wagon_id,
                        seat_row: "A".to_string(),
                        seat_number: number,
                    },
                );
            }
            t.passengers.insert(
                passenger_id,
                Passenger {
                    id: passenger_id,
                    user_id: Some(user_id),
                    name: "Siti Rahma".to_string(),
                    id_number: "3201010101900001".to_string().into(),
                },
            );
            for (id, code, expires_at, uses) in [
                (x10, "X10", None, 5),
                (expired_code, "OLD10", Some(now - chrono::Duration::days(1)), 5),
                (spent_code, "GONE10", None, 0),
            ] {
                t.discounts.insert(
                    id,
                    DiscountCode {
                        id,
                        code: code.to_string(),
                        discount_percent: 10,
                        expires_at,
                        remaining_uses: uses,
                    },
                );
            }
        })
        .await;

    let ctx = BookingContext::new(Arc::new(store.clone()), Arc::new(locks.clone()), policy);

    Fixture {
        store,
        locks,
        ctx,
        passenger_id,
        user_id,
        x10,
        expired_code,
        spent_code,
    }
}

impl Fixture {
    pub fn request(&self, seat_id: i64) -> ReservationRequest {
        ReservationRequest {
            passenger_id: Some(self.passenger_id),
            schedule_id: SCHEDULE,
            wagon_id: WAGON,
            seat_id,
            ..Default::default()
        }
    }

    pub async fn available_seats(&self, schedule_id: i64) -> i32 {
        self.store.snapshot().await.schedules[&schedule_id].available_seats
    }

    pub async fn remaining_uses(&self, discount_id: Uuid) -> i32 {
        self.store.snapshot().await.discounts[&discount_id].remaining_uses
    }
}

pub fn fast_policy() -> BookingPolicy {
    BookingPolicy {
        sweep_interval: Duration::from_millis(20),
        sweep_deadline: Duration::from_millis(200),
        ..BookingPolicy::default()
    }
}
