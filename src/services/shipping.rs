//! Shipping tiers keyed by postal code.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::PostalCode;

/// Orders at or above this subtotal ship for free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = dec!(299.00);

pub const STANDARD_WINDOW: &str = "7–12 business days";
pub const FREE_WINDOW: &str = "5–7 business days";

struct Tier {
    first: u32,
    last: u32,
    cost: Decimal,
}

const TIERS: [Tier; 3] = [
    Tier {
        first: 1_000_000,
        last: 9_999_999,
        cost: dec!(12.90),
    },
    Tier {
        first: 10_000_000,
        last: 19_999_999,
        cost: dec!(18.90),
    },
    Tier {
        first: 20_000_000,
        last: 29_999_999,
        cost: dec!(22.90),
    },
];

const DEFAULT_COST: Decimal = dec!(29.90);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShippingQuote {
    pub cost: Decimal,
    pub delivery_window: String,
    pub free: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShippingRateResolver;

impl ShippingRateResolver {
    pub fn resolve(&self, postal_code: &PostalCode, subtotal: Decimal) -> ShippingQuote {
        if subtotal >= FREE_SHIPPING_THRESHOLD {
            return ShippingQuote {
                cost: Decimal::ZERO,
                delivery_window: FREE_WINDOW.to_string(),
                free: true,
            };
        }

        ShippingQuote {
            cost: Self::tier_cost(postal_code.numeric()),
            delivery_window: STANDARD_WINDOW.to_string(),
            free: false,
        }
    }

    /// How much more the cart needs before shipping is free; zero once it
    /// qualifies.
    pub fn free_shipping_remaining(&self, subtotal: Decimal) -> Decimal {
        (FREE_SHIPPING_THRESHOLD - subtotal).max(Decimal::ZERO)
    }

    fn tier_cost(n: u32) -> Decimal {
        TIERS
            .iter()
            .find(|tier| (tier.first..=tier.last).contains(&n))
            .map_or(DEFAULT_COST, |tier| tier.cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(cep: &str, subtotal: Decimal) -> ShippingQuote {
        let code = PostalCode::parse(cep).expect("valid cep");
        ShippingRateResolver.resolve(&code, subtotal)
    }

    #[test]
    fn sao_paulo_capital_is_cheapest_tier() {
        let q = quote("01310100", dec!(100.00));
        assert_eq!(q.cost, dec!(12.90));
        assert_eq!(q.delivery_window, "7–12 business days");
        assert!(!q.free);
    }

    #[test]
    fn tier_boundaries_are_inclusive() {
        assert_eq!(quote("01000000", dec!(1)).cost, dec!(12.90));
        assert_eq!(quote("09999999", dec!(1)).cost, dec!(12.90));
        assert_eq!(quote("10000000", dec!(1)).cost, dec!(18.90));
        assert_eq!(quote("19999999", dec!(1)).cost, dec!(18.90));
        assert_eq!(quote("20000000", dec!(1)).cost, dec!(22.90));
        assert_eq!(quote("25000000", dec!(50.00)).cost, dec!(22.90));
        assert_eq!(quote("29999999", dec!(1)).cost, dec!(22.90));
    }

    #[test]
    fn anything_else_falls_into_default_tier() {
        assert_eq!(quote("99999999", dec!(10.00)).cost, dec!(29.90));
        assert_eq!(quote("30000000", dec!(10.00)).cost, dec!(29.90));
        // Below the first tier once leading zeros are dropped.
        assert_eq!(quote("00999999", dec!(10.00)).cost, dec!(29.90));
    }

    #[test]
    fn free_shipping_overrides_every_tier() {
        for cep in ["01310100", "15000000", "25000000", "99999999", "00000000"] {
            let q = quote(cep, dec!(299.00));
            assert_eq!(q.cost, Decimal::ZERO, "cep {cep}");
            assert_eq!(q.delivery_window, "5–7 business days");
            assert!(q.free);
        }
        assert!(!quote("01310100", dec!(298.99)).free);
    }

    #[test]
    fn remaining_for_free_shipping_never_goes_negative() {
        let resolver = ShippingRateResolver;
        assert_eq!(resolver.free_shipping_remaining(Decimal::ZERO), dec!(299.00));
        assert_eq!(resolver.free_shipping_remaining(dec!(119.80)), dec!(179.20));
        assert_eq!(resolver.free_shipping_remaining(dec!(299.00)), Decimal::ZERO);
        assert_eq!(resolver.free_shipping_remaining(dec!(450.10)), Decimal::ZERO);
    }
}
