use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::pricing::round_currency;

/// The only coupon the store honours.
pub const WELCOME_COUPON: &str = "BEMVINDO10";
const WELCOME_RATE: Decimal = dec!(0.10);

pub const INVALID_COUPON_REASON: &str = "Invalid coupon";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CouponResult {
    /// `rate` is the fraction of the subtotal taken off.
    Applied { code: String, rate: Decimal },
    Rejected { code: String, reason: String },
}

impl CouponResult {
    /// Discount on `subtotal`, rounded to cents. Shipping is never discounted.
    pub fn discount_amount(&self, subtotal: Decimal) -> Decimal {
        match self {
            CouponResult::Applied { rate, .. } => round_currency(subtotal * *rate),
            CouponResult::Rejected { .. } => Decimal::ZERO,
        }
    }

    pub fn applied_code(&self) -> Option<&str> {
        match self {
            CouponResult::Applied { code, .. } => Some(code),
            CouponResult::Rejected { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CouponValidator;

impl CouponValidator {
    pub fn validate(&self, code: &str) -> CouponResult {
        let normalized = code.trim().to_uppercase();
        if normalized == WELCOME_COUPON {
            CouponResult::Applied {
                code: normalized,
                rate: WELCOME_RATE,
            }
        } else {
            CouponResult::Rejected {
                code: code.trim().to_string(),
                reason: INVALID_COUPON_REASON.to_string(),
            }
        }
    }
}
