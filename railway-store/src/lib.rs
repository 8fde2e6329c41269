pub mod app_config;
pub mod database;
pub mod memory;
pub mod redis_repo;

pub use app_config::{BookingRules, Config, StorageBackend};
pub use database::DbClient;
pub use memory::{InMemorySeatLock, InMemoryStore, Tables};
pub use redis_repo::RedisSeatLock;
