use async_trait::async_trait;
use chrono::{DateTime, Utc};
use railway_core::{
    BookingStore, BookingTx, NewPayment, NewReservation, SeatKey, StoreError, StoreResult,
};
use railway_shared::{
    DiscountCode, Passenger, Payment, Reservation, ReservationStatus, Schedule, Seat, Wagon,
};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres, Transaction};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::app_config::BookingRules;

const ACTIVE_SEAT_INDEX: &str = "reservations_active_seat_idx";

const RESERVATION_COLUMNS: &str = "id, passenger_id, schedule_id, wagon_id, seat_id, discount_id, price, status, booking_date, expires_at, created_at, updated_at";

const PAYMENT_COLUMNS: &str =
    "id, reservation_id, payment_method, status, amount, gateway_response, transaction_id, payment_date";

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlay booking rules stored in the `business_rules` table on top of
    /// the file/env configuration. Rows look like `{"value": <number>}`.
    pub async fn fetch_booking_rules(&self, defaults: BookingRules) -> Result<BookingRules, sqlx::Error> {
        let rows: Vec<(String, Value)> =
            sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
                .fetch_all(&self.pool)
                .await?;

        let mut rules = defaults;
        for (key, value) in rows {
            let Some(v) = value.get("value").and_then(Value::as_u64) else {
                continue;
            };
            match key.as_str() {
                "seat_lock_ttl_seconds" => rules.seat_lock_ttl_seconds = v,
                "hold_window_seconds" => rules.hold_window_seconds = v,
                "payment_latency_ms" => rules.payment_latency_ms = v,
                "payment_success_rate" => rules.payment_success_rate = v.min(100) as u8,
                "sweep_interval_seconds" => rules.sweep_interval_seconds = v,
                "sweep_deadline_seconds" => rules.sweep_deadline_seconds = v,
                _ => {}
            }
        }

        Ok(rules)
    }
}

#[async_trait]
impl BookingStore for DbClient {
    async fn begin(&self) -> StoreResult<Box<dyn BookingTx>> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(PgBookingTx { tx }))
    }
}

pub struct PgBookingTx {
    tx: Transaction<'static, Postgres>,
}

fn db_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() && db.constraint() == Some(ACTIVE_SEAT_INDEX) {
            return StoreError::DuplicateActive(db.message().to_string());
        }
    }
    StoreError::Database(Box::new(err))
}

#[derive(sqlx::FromRow)]
struct PassengerRow {
    id: Uuid,
    user_id: Option<Uuid>,
    name: String,
    id_number: String,
}

impl From<PassengerRow> for Passenger {
    fn from(row: PassengerRow) -> Self {
        Passenger {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            id_number: row.id_number.into(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: i64,
    route_id: i64,
    train_id: i64,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    price: i64,
    available_seats: i32,
}

impl From<ScheduleRow> for Schedule {
    fn from(row: ScheduleRow) -> Self {
        Schedule {
            id: row.id,
            route_id: row.route_id,
            train_id: row.train_id,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            price: row.price,
            available_seats: row.available_seats,
        }
    }
}

#[derive(sqlx::FromRow)]
struct WagonRow {
    id: i64,
    train_id: i64,
    wagon_number: i32,
    class_type: String,
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: i64,
    wagon_id: i64,
    seat_row: String,
    seat_number: i32,
}

#[derive(sqlx::FromRow)]
struct DiscountRow {
    id: Uuid,
    code: String,
    discount_percent: i32,
    expires_at: Option<DateTime<Utc>>,
    remaining_uses: i32,
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    passenger_id: Uuid,
    schedule_id: i64,
    wagon_id: i64,
    seat_id: i64,
    discount_id: Option<Uuid>,
    price: i64,
    status: String,
    booking_date: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = StoreError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ReservationStatus>()
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(Reservation {
            id: row.id,
            passenger_id: row.passenger_id,
            schedule_id: row.schedule_id,
            wagon_id: row.wagon_id,
            seat_id: row.seat_id,
            discount_id: row.discount_id,
            price: row.price,
            status,
            booking_date: row.booking_date,
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    reservation_id: Uuid,
    payment_method: String,
    status: String,
    amount: i64,
    gateway_response: Option<String>,
    transaction_id: Uuid,
    payment_date: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            reservation_id: row.reservation_id,
            payment_method: row.payment_method,
            status: row.status.parse().map_err(StoreError::Decode)?,
            amount: row.amount,
            gateway_response: row.gateway_response,
            transaction_id: row.transaction_id,
            payment_date: row.payment_date,
        })
    }
}

impl PgBookingTx {
    async fn fetch_reservation(&mut self, id: Uuid, for_update: bool) -> StoreResult<Option<Reservation>> {
        let sql = format!(
            "SELECT {} FROM reservations WHERE id = $1{}",
            RESERVATION_COLUMNS,
            if for_update { " FOR UPDATE" } else { "" }
        );
        let row = sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.map(Reservation::try_from).transpose()
    }
}

#[async_trait]
impl BookingTx for PgBookingTx {
    async fn get_passenger(&mut self, id: Uuid) -> StoreResult<Option<Passenger>> {
        let row = sqlx::query_as::<_, PassengerRow>(
            "SELECT id, user_id, name, id_number FROM passengers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(row.map(Passenger::from))
    }

    async fn get_passenger_by_user(&mut self, user_id: Uuid) -> StoreResult<Option<Passenger>> {
        let row = sqlx::query_as::<_, PassengerRow>(
            "SELECT id, user_id, name, id_number FROM passengers WHERE user_id = $1 ORDER BY created_at LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(row.map(Passenger::from))
    }

    async fn get_schedule(&mut self, id: i64) -> StoreResult<Option<Schedule>> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            "SELECT id, route_id, train_id, departure_time, arrival_time, price, available_seats FROM schedules WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(row.map(Schedule::from))
    }

    async fn get_wagon(&mut self, id: i64) -> StoreResult<Option<Wagon>> {
        let row = sqlx::query_as::<_, WagonRow>(
            "SELECT id, train_id, wagon_number, class_type FROM wagons WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(row.map(|r| Wagon {
            id: r.id,
            train_id: r.train_id,
            wagon_number: r.wagon_number,
            class_type: r.class_type,
        }))
    }

    async fn get_seat(&mut self, id: i64) -> StoreResult<Option<Seat>> {
        let row = sqlx::query_as::<_, SeatRow>(
            "SELECT id, wagon_id, seat_row, seat_number FROM seats WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(row.map(|r| Seat {
            id: r.id,
            wagon_id: r.wagon_id,
            seat_row: r.seat_row,
            seat_number: r.seat_number,
        }))
    }

    async fn count_active_reservations(&mut self, key: &SeatKey) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM reservations
            WHERE schedule_id = $1 AND wagon_id = $2 AND seat_id = $3
              AND status IN ('pending', 'confirmed')
            "#,
        )
        .bind(key.schedule_id)
        .bind(key.wagon_id)
        .bind(key.seat_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)
    }

    async fn get_discount(&mut self, id: Uuid) -> StoreResult<Option<DiscountCode>> {
        let row = sqlx::query_as::<_, DiscountRow>(
            "SELECT id, code, discount_percent, expires_at, remaining_uses FROM discount_codes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(row.map(|r| DiscountCode {
            id: r.id,
            code: r.code,
            discount_percent: r.discount_percent,
            expires_at: r.expires_at,
            remaining_uses: r.remaining_uses,
        }))
    }

    async fn consume_discount(&mut self, reservation_id: Uuid, discount_id: Uuid) -> StoreResult<bool> {
        let updated = sqlx::query(
            "UPDATE discount_codes SET remaining_uses = remaining_uses - 1 WHERE id = $1 AND remaining_uses > 0",
        )
        .bind(discount_id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("INSERT INTO reservation_discounts (reservation_id, discount_id) VALUES ($1, $2)")
            .bind(reservation_id)
            .bind(discount_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(true)
    }

    async fn insert_reservation(&mut self, new: NewReservation) -> StoreResult<Reservation> {
        let sql = format!(
            r#"
            INSERT INTO reservations (id, passenger_id, schedule_id, wagon_id, seat_id, discount_id, price, status, booking_date, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            RESERVATION_COLUMNS
        );
        let row = sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.passenger_id)
            .bind(new.schedule_id)
            .bind(new.wagon_id)
            .bind(new.seat_id)
            .bind(new.discount_id)
            .bind(new.price)
            .bind(new.status.as_str())
            .bind(new.booking_date)
            .bind(new.expires_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.try_into()
    }

    async fn get_reservation(&mut self, id: Uuid) -> StoreResult<Option<Reservation>> {
        self.fetch_reservation(id, false).await
    }

    async fn lock_reservation(&mut self, id: Uuid) -> StoreResult<Option<Reservation>> {
        self.fetch_reservation(id, true).await
    }

    async fn set_reservation_status(&mut self, id: Uuid, status: ReservationStatus) -> StoreResult<()> {
        let updated = sqlx::query("UPDATE reservations SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!("reservation {}", id)));
        }
        Ok(())
    }

    async fn delete_reservation(&mut self, id: Uuid) -> StoreResult<()> {
        let deleted = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!("reservation {}", id)));
        }
        Ok(())
    }

    async fn list_reservations(&mut self, limit: i64, offset: i64) -> StoreResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {} FROM reservations ORDER BY created_at DESC, id LIMIT $1 OFFSET $2",
            RESERVATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(Reservation::try_from).collect()
    }

    async fn count_reservations(&mut self) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reservations")
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err)
    }

    async fn adjust_available_seats(&mut self, schedule_id: i64, delta: i32) -> StoreResult<()> {
        let updated = sqlx::query("UPDATE schedules SET available_seats = available_seats + $2 WHERE id = $1")
            .bind(schedule_id)
            .bind(delta)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!("schedule {}", schedule_id)));
        }
        Ok(())
    }

    async fn insert_payment(&mut self, new: NewPayment) -> StoreResult<Payment> {
        let sql = format!(
            r#"
            INSERT INTO payments (id, reservation_id, payment_method, status, amount, gateway_response, transaction_id, payment_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.reservation_id)
            .bind(new.payment_method)
            .bind(new.status.as_str())
            .bind(new.amount)
            .bind(new.gateway_response)
            .bind(new.transaction_id)
            .bind(new.payment_date)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.try_into()
    }

    async fn list_payments(&mut self, reservation_id: Uuid) -> StoreResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE reservation_id = $1 ORDER BY payment_date",
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(reservation_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn expire_unpaid_reservations(&mut self, now: DateTime<Utc>) -> StoreResult<u64> {
        let updated = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'expired', updated_at = NOW()
            WHERE status = 'pending' AND expires_at < $1
            "#,
        )
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(updated.rows_affected())
    }

    async fn list_stale_pending(&mut self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        // Rows locked by an in-flight payment are left for the next run.
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM reservations
            WHERE status = 'pending' AND expires_at < $1
            ORDER BY expires_at
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(db_err)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await.map_err(db_err)
    }
}
