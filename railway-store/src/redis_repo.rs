use async_trait::async_trait;
use railway_core::{SeatKey, SeatLock, StoreError, StoreResult};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

/// Seat lock backed by Redis `SET NX PX`.
#[derive(Clone)]
pub struct RedisSeatLock {
    client: redis::Client,
}

fn lock_err(err: redis::RedisError) -> StoreError {
    StoreError::Lock(Box::new(err))
}

impl RedisSeatLock {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(lock_err)
    }

    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(lock_err)
    }
}

#[async_trait]
impl SeatLock for RedisSeatLock {
    async fn acquire(&self, key: &SeatKey, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.connection().await?;
        let ttl_ms = ttl.as_millis().max(1) as u64;

        // SET NX: only set if the key does not exist
        let result: Option<String> = redis::cmd("SET")
            .arg(key.lock_key())
            .arg("locked")
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(lock_err)?;

        debug!(seat = %key, acquired = result.is_some(), "seat lock attempt");
        Ok(result.is_some())
    }

    async fn release(&self, key: &SeatKey) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key.lock_key()).await.map_err(lock_err)
    }
}
