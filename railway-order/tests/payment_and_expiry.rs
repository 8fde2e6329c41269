mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::*;
use railway_core::{BookingError, ErrorKind, SeatKey};
use railway_order::{
    spawn_sweepers, FixedGateway, PaymentProcessor, PaymentTimeoutSweep, ReservationManager,
    SimulatedGateway, Sweep, UnpaidReservationSweep,
};
use railway_shared::{PaymentRequest, PaymentStatus, ReservationStatus};
use uuid::Uuid;

fn pay(reservation_id: Uuid, amount: i64) -> PaymentRequest {
    PaymentRequest {
        reservation_id,
        payment_method: "credit_card".to_string(),
        amount,
    }
}

fn after_hold_window() -> chrono::DateTime<Utc> {
    Utc::now() + chrono::Duration::minutes(16)
}

#[tokio::test]
async fn test_approved_payment_confirms_and_releases_the_seat() {
    let fx = fixture().await;
    let manager = ReservationManager::new(fx.ctx.clone());
    let payments = PaymentProcessor::new(fx.ctx.clone(), Arc::new(FixedGateway::approving()));

    let reservation = manager.create_reservation(fx.request(SEAT)).await.unwrap();
    let receipt = payments.process_payment(pay(reservation.id, 50)).await.unwrap();

    assert_eq!(receipt.status, PaymentStatus::Success);
    assert_eq!(receipt.message, "Payment successful!");

    let stored = fx.store.reservation(reservation.id).await.unwrap();
    assert_eq!(stored.status, ReservationStatus::Confirmed);
    assert_eq!(fx.available_seats(SCHEDULE).await, INITIAL_SEATS - 1);
    assert!(!fx.locks.is_locked(&SeatKey::from(&stored)));

    let snapshot = fx.store.snapshot().await;
    assert_eq!(snapshot.payments.len(), 1);
    assert_eq!(snapshot.payments[0].transaction_id, receipt.transaction_id);
    assert_eq!(snapshot.payments[0].amount, 50);

    // Confirmed reservations still own the seat.
    let err = manager.create_reservation(fx.request(SEAT)).await.unwrap_err();
    assert!(matches!(err, BookingError::SeatAlreadyBooked));

    let err = payments.process_payment(pay(reservation.id, 50)).await.unwrap_err();
    assert!(matches!(
        err,
        BookingError::ReservationNotPending(ReservationStatus::Confirmed)
    ));
    assert_eq!(err.kind(), ErrorKind::Client);
    assert_eq!(fx.store.snapshot().await.payments.len(), 1);
}

#[tokio::test]
async fn test_declined_payment_leaves_reservation_pending_until_swept() {
    let fx = fixture().await;
    let manager = ReservationManager::new(fx.ctx.clone());
    let payments = PaymentProcessor::new(
        fx.ctx.clone(),
        Arc::new(FixedGateway::declining("insufficient funds")),
    );

    let reservation = manager.create_reservation(fx.request(SEAT)).await.unwrap();
    let receipt = payments.process_payment(pay(reservation.id, 50)).await.unwrap();

    assert_eq!(receipt.status, PaymentStatus::Failed);
    assert_eq!(receipt.message, "Payment failed!");

    let stored = fx.store.reservation(reservation.id).await.unwrap();
    assert_eq!(stored.status, ReservationStatus::Pending);
    assert_eq!(fx.available_seats(SCHEDULE).await, INITIAL_SEATS);
    // The hold survives a decline so the caller can retry.
    assert!(fx.locks.is_locked(&SeatKey::from(&stored)));

    let snapshot = fx.store.snapshot().await;
    assert_eq!(snapshot.payments[0].status, PaymentStatus::Failed);
    assert_eq!(
        snapshot.payments[0].gateway_response.as_deref(),
        Some("insufficient funds")
    );

    // Not yet stale.
    let sweep = UnpaidReservationSweep::new(fx.ctx.clone());
    assert_eq!(sweep.run_once(Utc::now()).await.unwrap(), 0);

    let now = after_hold_window();
    assert_eq!(sweep.run_once(now).await.unwrap(), 1);
    let first_pass = fx.store.snapshot().await;
    assert_eq!(
        first_pass.reservations[&reservation.id].status,
        ReservationStatus::Expired
    );

    assert_eq!(sweep.run_once(now).await.unwrap(), 0);
    let second_pass = fx.store.snapshot().await;
    assert_eq!(first_pass.reservations, second_pass.reservations);
}

#[tokio::test]
async fn test_payment_validation_and_unknown_reservation() {
    let fx = fixture().await;
    let payments = PaymentProcessor::new(fx.ctx.clone(), Arc::new(FixedGateway::approving()));

    let mut req = pay(Uuid::new_v4(), 50);
    req.payment_method = "  ".to_string();
    assert!(matches!(
        payments.process_payment(req).await,
        Err(BookingError::Validation(_))
    ));

    assert!(matches!(
        payments.process_payment(pay(Uuid::new_v4(), -1)).await,
        Err(BookingError::Validation(_))
    ));

    let missing = Uuid::new_v4();
    let err = payments.process_payment(pay(missing, 50)).await.unwrap_err();
    assert!(matches!(err, BookingError::ReservationNotFound(id) if id == missing));
    assert!(fx.store.snapshot().await.payments.is_empty());
}

#[tokio::test]
async fn test_simulated_gateway_drives_the_processor() {
    let fx = fixture().await;
    let manager = ReservationManager::new(fx.ctx.clone());
    let payments = PaymentProcessor::new(
        fx.ctx.clone(),
        Arc::new(SimulatedGateway::new(Duration::from_millis(5), 100)),
    );

    let reservation = manager.create_reservation(fx.request(SEAT)).await.unwrap();
    let receipt = payments.process_payment(pay(reservation.id, 50)).await.unwrap();
    assert_eq!(receipt.status, PaymentStatus::Success);
}

#[tokio::test]
async fn test_payment_timeout_sweep_cancels_each_stale_row() {
    let fx = fixture().await;
    let manager = ReservationManager::new(fx.ctx.clone());

    let stale = manager.create_reservation(fx.request(SEAT)).await.unwrap();
    let paid = manager.create_reservation(fx.request(OTHER_SEAT)).await.unwrap();
    manager.confirm_reservation(paid.id).await.unwrap();

    let sweep = PaymentTimeoutSweep::new(fx.ctx.clone());
    let now = after_hold_window();
    assert_eq!(sweep.run_once(now).await.unwrap(), 1);
    assert_eq!(sweep.run_once(now).await.unwrap(), 0);

    let snapshot = fx.store.snapshot().await;
    assert_eq!(snapshot.reservations[&stale.id].status, ReservationStatus::Canceled);
    assert_eq!(snapshot.reservations[&paid.id].status, ReservationStatus::Confirmed);

    // The sweep leaves the seat lock to its TTL.
    assert!(fx.locks.is_locked(&SeatKey::from(&stale)));
}

#[tokio::test]
async fn test_sweep_run_is_bounded_by_its_deadline() {
    let fx = fixture_with(fast_policy()).await;
    let manager = ReservationManager::new(fx.ctx.clone());
    let reservation = manager.create_reservation(fx.request(SEAT)).await.unwrap();
    let sweep = UnpaidReservationSweep::new(fx.ctx.clone());

    // An in-flight payment holds the row the sweep needs.
    let mut payment_tx = fx.ctx.begin().await.unwrap();
    payment_tx.lock_reservation(reservation.id).await.unwrap();

    let err = sweep.run_once(after_hold_window()).await.unwrap_err();
    assert!(matches!(err, BookingError::Timeout(_)));
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert_eq!(
        fx.store.reservation(reservation.id).await.unwrap().status,
        ReservationStatus::Pending
    );
    drop(payment_tx);

    assert_eq!(sweep.run_once(after_hold_window()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_payment_timeout_sweep_skips_a_row_being_paid() {
    let fx = fixture().await;
    let manager = ReservationManager::new(fx.ctx.clone());
    let reservation = manager.create_reservation(fx.request(SEAT)).await.unwrap();
    let sweep = PaymentTimeoutSweep::new(fx.ctx.clone());

    let mut payment_tx = fx.ctx.begin().await.unwrap();
    payment_tx.lock_reservation(reservation.id).await.unwrap();
    assert_eq!(sweep.run_once(after_hold_window()).await.unwrap(), 0);
    drop(payment_tx);

    assert_eq!(sweep.run_once(after_hold_window()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_slow_payment_does_not_stall_other_bookings() {
    let fx = fixture().await;
    let manager = Arc::new(ReservationManager::new(fx.ctx.clone()));
    let payments = PaymentProcessor::new(
        fx.ctx.clone(),
        Arc::new(SimulatedGateway::new(Duration::from_millis(500), 100)),
    );
    let reservation = manager.create_reservation(fx.request(SEAT)).await.unwrap();

    let paying = tokio::spawn(async move { payments.process_payment(pay(reservation.id, 50)).await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let other = tokio::time::timeout(
        Duration::from_millis(200),
        manager.create_reservation(fx.request(OTHER_SEAT)),
    )
    .await
    .expect("booking waited on an unrelated payment")
    .unwrap();
    assert_eq!(other.status, ReservationStatus::Pending);

    let receipt = paying.await.unwrap().unwrap();
    assert_eq!(receipt.status, PaymentStatus::Success);
}

#[tokio::test]
async fn test_background_sweepers_reconcile_and_stop() {
    let fx = fixture_with(fast_policy()).await;
    let reservation_id = Uuid::new_v4();
    let now = Utc::now();

    fx.store
        .seed(|t| {
            t.reservations.insert(
                reservation_id,
                railway_shared::Reservation {
                    id: reservation_id,
                    passenger_id: fx.passenger_id,
                    schedule_id: SCHEDULE,
                    wagon_id: WAGON,
                    seat_id: SEAT,
                    discount_id: None,
                    price: 50,
                    status: ReservationStatus::Pending,
                    booking_date: now - chrono::Duration::minutes(30),
                    expires_at: now - chrono::Duration::minutes(15),
                    created_at: now - chrono::Duration::minutes(30),
                    updated_at: now - chrono::Duration::minutes(30),
                },
            );
        })
        .await;

    let handles = spawn_sweepers(&fx.ctx);

    let mut status = ReservationStatus::Pending;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        status = fx.store.reservation(reservation_id).await.unwrap().status;
        if status != ReservationStatus::Pending {
            break;
        }
    }
    // Whichever sweeper ran first decides the terminal state.
    assert!(matches!(
        status,
        ReservationStatus::Expired | ReservationStatus::Canceled
    ));

    tokio::time::timeout(Duration::from_secs(2), handles.shutdown())
        .await
        .expect("sweepers did not stop");
}

#[tokio::test]
async fn test_reservation_detail_follows_the_latest_payment() {
    let fx = fixture().await;
    let manager = ReservationManager::new(fx.ctx.clone());
    let req = railway_shared::ReservationRequest {
        schedule_id: PREMIUM_SCHEDULE,
        discount_id: Some(fx.x10),
        ..fx.request(SEAT)
    };
    let reservation = manager.create_reservation(req).await.unwrap();

    let detail = manager.get_reservation_detail(reservation.id).await.unwrap();
    assert_eq!(detail.status, ReservationStatus::Pending);
    assert_eq!(detail.passenger_name, "Siti Rahma");
    assert_eq!(detail.schedule_id, PREMIUM_SCHEDULE);
    assert_eq!(detail.train_id, 1);
    assert_eq!(detail.seat_label, "Wagon 3/A-12");
    assert_eq!(detail.class_type, "economy");
    assert_eq!(detail.ticket_price, 180);
    assert_eq!(detail.discount_code.as_deref(), Some("X10"));
    assert_eq!(detail.payment_status, None);

    let declining = PaymentProcessor::new(fx.ctx.clone(), Arc::new(FixedGateway::declining("card expired")));
    declining.process_payment(pay(reservation.id, 180)).await.unwrap();
    let detail = manager.get_reservation_detail(reservation.id).await.unwrap();
    assert_eq!(detail.payment_status, Some(PaymentStatus::Failed));

    tokio::time::sleep(Duration::from_millis(2)).await;
    let approving = PaymentProcessor::new(fx.ctx.clone(), Arc::new(FixedGateway::approving()));
    approving.process_payment(pay(reservation.id, 180)).await.unwrap();

    let detail = manager.get_reservation_detail(reservation.id).await.unwrap();
    assert_eq!(detail.status, ReservationStatus::Confirmed);
    assert_eq!(detail.payment_status, Some(PaymentStatus::Success));
    assert_eq!(detail.payment_amount, Some(180));
    assert_eq!(detail.payment_method.as_deref(), Some("credit_card"));

    let missing = Uuid::new_v4();
    assert!(matches!(
        manager.get_reservation_detail(missing).await,
        Err(BookingError::ReservationNotFound(id)) if id == missing
    ));
}
