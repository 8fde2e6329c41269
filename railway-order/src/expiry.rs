use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use railway_core::{BookingError, BookingResult, BookingTx};
use railway_shared::ReservationStatus;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::context::{finish, BookingContext};

/// One periodic reconciliation pass over stale pending reservations.
///
/// Runs are idempotent: the predicate `pending AND expires_at < now` no
/// longer matches a row once a run has handled it.
#[async_trait]
pub trait Sweep: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run_once(&self, now: DateTime<Utc>) -> BookingResult<u64>;
}

/// Moves lapsed pending reservations straight to `expired` in one statement.
pub struct UnpaidReservationSweep {
    ctx: BookingContext,
}

impl UnpaidReservationSweep {
    pub fn new(ctx: BookingContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Sweep for UnpaidReservationSweep {
    fn name(&self) -> &'static str {
        "unpaid-reservation"
    }

    async fn run_once(&self, now: DateTime<Utc>) -> BookingResult<u64> {
        with_deadline(self.ctx.policy.sweep_deadline, async {
            let mut tx = self.ctx.begin().await?;
            let result = tx.expire_unpaid_reservations(now).await.map_err(BookingError::from);
            finish(tx, result).await
        })
        .await
    }
}

/// Cancels reservations whose payment never arrived, one row at a time.
pub struct PaymentTimeoutSweep {
    ctx: BookingContext,
}

impl PaymentTimeoutSweep {
    pub fn new(ctx: BookingContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Sweep for PaymentTimeoutSweep {
    fn name(&self) -> &'static str {
        "payment-timeout"
    }

    async fn run_once(&self, now: DateTime<Utc>) -> BookingResult<u64> {
        with_deadline(self.ctx.policy.sweep_deadline, async {
            let mut tx = self.ctx.begin().await?;
            let result = cancel_unpaid(tx.as_mut(), now).await;
            finish(tx, result).await
        })
        .await
    }
}

async fn cancel_unpaid(tx: &mut dyn BookingTx, now: DateTime<Utc>) -> BookingResult<u64> {
    let stale = tx.list_stale_pending(now).await?;
    for id in &stale {
        tx.set_reservation_status(*id, ReservationStatus::Canceled).await?;
        info!("Auto-canceling expired reservation {}", id);
    }
    Ok(stale.len() as u64)
}

/// Abandons the run (and with it the open transaction) after `deadline`.
async fn with_deadline<T>(
    deadline: Duration,
    run: impl Future<Output = BookingResult<T>>,
) -> BookingResult<T> {
    tokio::time::timeout(deadline, run)
        .await
        .map_err(|_| BookingError::Timeout(deadline))?
}

/// Running sweeper tasks and the signal that stops them.
pub struct SweeperHandles {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SweeperHandles {
    /// Signal every sweeper and wait for the in-flight runs to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("sweeper task ended abnormally: {}", e);
            }
        }
    }
}

/// Start both sweepers on the policy's interval.
pub fn spawn_sweepers(ctx: &BookingContext) -> SweeperHandles {
    let (shutdown, signal) = watch::channel(false);
    let interval = ctx.policy.sweep_interval;

    let tasks = vec![
        spawn_sweep(PaymentTimeoutSweep::new(ctx.clone()), interval, signal.clone()),
        spawn_sweep(UnpaidReservationSweep::new(ctx.clone()), interval, signal),
    ];

    SweeperHandles { shutdown, tasks }
}

pub fn spawn_sweep<S: Sweep>(
    sweep: S,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; the first run waits one interval.
        ticker.tick().await;

        info!("{} sweeper started, every {:?}", sweep.name(), interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match sweep.run_once(Utc::now()).await {
                        Ok(count) => info!("{} sweep handled {} reservations", sweep.name(), count),
                        Err(e) => error!("{} sweep failed: {}", sweep.name(), e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("{} sweeper stopped", sweep.name());
    })
}
