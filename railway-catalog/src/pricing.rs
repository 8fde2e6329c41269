use chrono::{DateTime, Utc};
use railway_core::BookingError;
use railway_shared::DiscountCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Final fare for a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub final_price: i64,
    /// Set when a discount code was applied and must be consumed
    pub applied_discount: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Codes above this percentage are rejected
    pub max_discount_percent: i32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            max_discount_percent: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("discount expired")]
    DiscountExpired,
    #[error("discount has no remaining uses")]
    DiscountExhausted,
    #[error("discount percent {0} out of range")]
    InvalidPercent(i32),
    #[error("discounted price of {0} overflows")]
    PriceOverflow(i64),
}

impl From<PricingError> for BookingError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::DiscountExpired => BookingError::DiscountExpired,
            PricingError::DiscountExhausted => BookingError::DiscountExhausted,
            PricingError::InvalidPercent(_) | PricingError::PriceOverflow(_) => {
                BookingError::InvalidDiscount(err.to_string())
            }
        }
    }
}

/// Integer fare calculator. Consuming a code's use is left to the caller's
/// transaction.
#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Price a seat from the schedule's base fare and an optional code.
    pub fn quote(
        &self,
        base_price: i64,
        discount: Option<&DiscountCode>,
        now: DateTime<Utc>,
    ) -> Result<Quote, PricingError> {
        let Some(discount) = discount else {
            return Ok(Quote {
                final_price: base_price,
                applied_discount: None,
            });
        };

        if discount.is_expired(now) {
            return Err(PricingError::DiscountExpired);
        }
        if discount.is_exhausted() {
            return Err(PricingError::DiscountExhausted);
        }

        let percent = discount.discount_percent;
        if !(0..=self.config.max_discount_percent.min(100)).contains(&percent) {
            return Err(PricingError::InvalidPercent(percent));
        }

        Ok(Quote {
            final_price: apply_percent_off(base_price, percent)
                .ok_or(PricingError::PriceOverflow(base_price))?,
            applied_discount: Some(discount.id),
        })
    }
}

/// `base * (100 - percent) / 100`, truncated toward zero. `None` on overflow.
pub fn apply_percent_off(base_price: i64, percent: i32) -> Option<i64> {
    base_price
        .checked_mul(100 - i64::from(percent))
        .map(|scaled| scaled / 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn code(percent: i32, uses: i32, expires_at: Option<DateTime<Utc>>) -> DiscountCode {
        DiscountCode {
            id: Uuid::new_v4(),
            code: "X10".to_string(),
            discount_percent: percent,
            expires_at,
            remaining_uses: uses,
        }
    }

    #[test]
    fn test_no_discount_keeps_base_price() {
        let engine = PricingEngine::default();
        let quote = engine.quote(50, None, Utc::now()).unwrap();
        assert_eq!(quote.final_price, 50);
        assert_eq!(quote.applied_discount, None);
    }

    #[test]
    fn test_ten_percent_truncates() {
        let engine = PricingEngine::default();
        let now = Utc::now();
        let x10 = code(10, 5, Some(now + Duration::days(1)));

        assert_eq!(engine.quote(100, Some(&x10), now).unwrap().final_price, 90);
        assert_eq!(engine.quote(101, Some(&x10), now).unwrap().final_price, 90);
        assert_eq!(engine.quote(109, Some(&x10), now).unwrap().final_price, 98);
        assert_eq!(engine.quote(200, Some(&x10), now).unwrap().final_price, 180);
        assert_eq!(
            engine.quote(200, Some(&x10), now).unwrap().applied_discount,
            Some(x10.id)
        );
    }

    #[test]
    fn test_code_without_expiry_never_expires() {
        let engine = PricingEngine::default();
        let forever = code(25, 1, None);
        let quote = engine.quote(400, Some(&forever), Utc::now()).unwrap();
        assert_eq!(quote.final_price, 300);
    }

    #[test]
    fn test_expired_code_rejected() {
        let engine = PricingEngine::default();
        let now = Utc::now();
        let stale = code(10, 5, Some(now - Duration::minutes(1)));
        assert_eq!(
            engine.quote(100, Some(&stale), now),
            Err(PricingError::DiscountExpired)
        );
    }

    #[test]
    fn test_exhausted_code_rejected() {
        let engine = PricingEngine::default();
        let used_up = code(10, 0, None);
        assert_eq!(
            engine.quote(100, Some(&used_up), Utc::now()),
            Err(PricingError::DiscountExhausted)
        );
    }

    #[test]
    fn test_percent_bounds() {
        let engine = PricingEngine::new(PricingConfig {
            max_discount_percent: 50,
        });
        let now = Utc::now();
        assert_eq!(
            engine.quote(100, Some(&code(60, 1, None)), now),
            Err(PricingError::InvalidPercent(60))
        );
        assert_eq!(
            engine.quote(100, Some(&code(-5, 1, None)), now),
            Err(PricingError::InvalidPercent(-5))
        );
        assert_eq!(engine.quote(100, Some(&code(50, 1, None)), now).unwrap().final_price, 50);
    }

    #[test]
    fn test_huge_base_price_is_rejected_not_wrapped() {
        let engine = PricingEngine::default();
        let x10 = code(10, 5, None);
        assert_eq!(
            engine.quote(i64::MAX, Some(&x10), Utc::now()),
            Err(PricingError::PriceOverflow(i64::MAX))
        );
        assert!(matches!(
            BookingError::from(PricingError::PriceOverflow(i64::MAX)),
            BookingError::InvalidDiscount(_)
        ));

        // No discount means no arithmetic.
        assert_eq!(engine.quote(i64::MAX, None, Utc::now()).unwrap().final_price, i64::MAX);
    }

    #[test]
    fn test_pricing_errors_map_to_booking_errors() {
        assert!(matches!(
            BookingError::from(PricingError::DiscountExpired),
            BookingError::DiscountExpired
        ));
        assert!(matches!(
            BookingError::from(PricingError::InvalidPercent(120)),
            BookingError::InvalidDiscount(_)
        ));
    }
}
