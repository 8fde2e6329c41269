use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscountCode {
    pub id: Uuid,
    pub code: String,
    pub discount_percent: i32,
    /// `None` never expires
    pub expires_at: Option<DateTime<Utc>>,
    pub remaining_uses: i32,
}

impl DiscountCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_uses <= 0
    }
}
