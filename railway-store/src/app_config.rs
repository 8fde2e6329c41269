use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub booking: BookingRules,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Timing and payment knobs for the booking flow. Rows in the
/// `business_rules` table override these at startup.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BookingRules {
    #[serde(default = "default_seat_lock_ttl")]
    pub seat_lock_ttl_seconds: u64,
    #[serde(default = "default_hold_window")]
    pub hold_window_seconds: u64,
    #[serde(default = "default_payment_latency")]
    pub payment_latency_ms: u64,
    #[serde(default = "default_success_rate")]
    pub payment_success_rate: u8,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_sweep_deadline")]
    pub sweep_deadline_seconds: u64,
}

fn default_seat_lock_ttl() -> u64 { 300 }
fn default_hold_window() -> u64 { 900 }
fn default_payment_latency() -> u64 { 1500 }
fn default_success_rate() -> u8 { 80 }
fn default_sweep_interval() -> u64 { 300 }
fn default_sweep_deadline() -> u64 { 10 }

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            seat_lock_ttl_seconds: default_seat_lock_ttl(),
            hold_window_seconds: default_hold_window(),
            payment_latency_ms: default_payment_latency(),
            payment_success_rate: default_success_rate(),
            sweep_interval_seconds: default_sweep_interval(),
            sweep_deadline_seconds: default_sweep_deadline(),
        }
    }
}

impl BookingRules {
    /// Rejects values the lock store and the sweeper timers cannot run with.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let durations = [
            ("seat_lock_ttl_seconds", self.seat_lock_ttl_seconds),
            ("hold_window_seconds", self.hold_window_seconds),
            ("sweep_interval_seconds", self.sweep_interval_seconds),
            ("sweep_deadline_seconds", self.sweep_deadline_seconds),
        ];
        for (name, value) in durations {
            if value == 0 {
                return Err(config::ConfigError::Message(format!(
                    "booking.{} must be greater than zero",
                    name
                )));
            }
        }
        if self.hold_window_seconds > i64::MAX as u64 {
            return Err(config::ConfigError::Message(
                "booking.hold_window_seconds is out of range".to_string(),
            ));
        }
        if self.payment_success_rate > 100 {
            return Err(config::ConfigError::Message(
                "booking.payment_success_rate must be at most 100".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `RAILWAY__BOOKING__HOLD_WINDOW_SECONDS=600`
            .add_source(config::Environment::with_prefix("RAILWAY").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.booking.validate()?;
        Ok(config)
    }
}
