use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    models::{CartItem, Installments, PaymentSelection},
    services::{coupon::CouponResult, shipping::ShippingQuote},
};

const PIX_RATE: Decimal = dec!(0.05);

/// Rounds a currency amount to cents, halves away from zero.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub coupon_discount: Decimal,
    pub payment_discount: Decimal,
    pub shipping_cost: Decimal,
    pub grand_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InstallmentOption {
    pub count: u8,
    pub amount: Decimal,
}

/// Turns a cart snapshot plus the shopper's choices into a price breakdown.
///
/// Every input is a parameter; the engine keeps nothing between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingEngine;

impl PricingEngine {
    pub fn subtotal(items: &[CartItem]) -> Decimal {
        items.iter().map(CartItem::line_total).sum()
    }

    /// Pix takes 5% off the subtotal; other methods take nothing.
    pub fn payment_discount(subtotal: Decimal, payment: Option<&PaymentSelection>) -> Decimal {
        match payment {
            Some(PaymentSelection::Pix) => round_currency(subtotal * PIX_RATE),
            _ => Decimal::ZERO,
        }
    }

    /// Missing shipping, coupon or payment contribute nothing.
    ///
    /// The Pix discount is part of the grand total that gets persisted, not
    /// only of what is displayed.
    pub fn price(
        &self,
        items: &[CartItem],
        shipping: Option<&ShippingQuote>,
        coupon: Option<&CouponResult>,
        payment: Option<&PaymentSelection>,
    ) -> PriceBreakdown {
        let subtotal = Self::subtotal(items);
        let coupon_discount = coupon.map_or(Decimal::ZERO, |c| c.discount_amount(subtotal));
        let payment_discount = Self::payment_discount(subtotal, payment);
        let shipping_cost = shipping.map_or(Decimal::ZERO, |q| q.cost);

        PriceBreakdown {
            subtotal,
            coupon_discount,
            payment_discount,
            shipping_cost,
            grand_total: subtotal - coupon_discount - payment_discount + shipping_cost,
        }
    }

    /// Interest-free split of the grand total for every allowed installment
    /// count. Display only.
    pub fn installment_plan(&self, breakdown: &PriceBreakdown) -> Vec<InstallmentOption> {
        (1..=Installments::MAX)
            .map(|count| InstallmentOption {
                count,
                amount: round_currency(breakdown.grand_total / Decimal::from(count)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::{
        models::PostalCode,
        services::{coupon::CouponValidator, shipping::ShippingRateResolver},
    };

    fn item(price: Decimal, quantity: u32) -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            product_id: Uuid::new_v4(),
            product_name: "Camiseta".into(),
            product_image: None,
            price,
            quantity,
            size: Some("M".into()),
            color: None,
            created_at: Utc::now(),
        }
    }

    fn quote(subtotal: Decimal) -> ShippingQuote {
        let code = PostalCode::parse("01310100").unwrap();
        ShippingRateResolver.resolve(&code, subtotal)
    }

    #[test]
    fn subtotal_is_order_independent() {
        let mut items = vec![
            item(dec!(49.90), 2),
            item(dec!(0), 5),
            item(dec!(120.00), 1),
            item(dec!(15.35), 3),
        ];
        let forward = PricingEngine::subtotal(&items);
        items.reverse();
        assert_eq!(forward, PricingEngine::subtotal(&items));
        assert_eq!(forward, dec!(265.85));
    }

    #[test]
    fn no_choices_means_subtotal_only() {
        let items = [item(dec!(30.00), 2)];
        let b = PricingEngine.price(&items, None, None, None);
        assert_eq!(b.subtotal, dec!(60.00));
        assert_eq!(b.grand_total, dec!(60.00));
        assert_eq!(b.coupon_discount, Decimal::ZERO);
        assert_eq!(b.payment_discount, Decimal::ZERO);
    }

    #[test]
    fn pix_takes_five_percent_of_subtotal_only() {
        let items = [item(dec!(100.00), 2)];
        let shipping = quote(dec!(200.00));
        let coupon = CouponValidator.validate("BEMVINDO10");

        let boleto = PricingEngine.price(
            &items,
            Some(&shipping),
            Some(&coupon),
            Some(&PaymentSelection::Boleto),
        );
        let pix = PricingEngine.price(
            &items,
            Some(&shipping),
            Some(&coupon),
            Some(&PaymentSelection::Pix),
        );

        assert_eq!(pix.payment_discount, dec!(10.00));
        assert_eq!(boleto.grand_total - pix.grand_total, dec!(10.00));
    }

    #[test]
    fn grand_total_subtracts_both_discounts_before_shipping() {
        let items = [item(dec!(100.00), 2)];
        let shipping = quote(dec!(200.00));
        let coupon = CouponValidator.validate("bemvindo10");
        let b = PricingEngine.price(
            &items,
            Some(&shipping),
            Some(&coupon),
            Some(&PaymentSelection::Pix),
        );

        assert_eq!(b.subtotal, dec!(200.00));
        assert_eq!(b.coupon_discount, dec!(20.00));
        assert_eq!(b.payment_discount, dec!(10.00));
        assert_eq!(b.shipping_cost, dec!(12.90));
        assert_eq!(b.grand_total, dec!(182.90));
    }

    #[test]
    fn rejected_coupon_changes_nothing() {
        let items = [item(dec!(80.00), 1)];
        let rejected = CouponValidator.validate("NOPE");
        let b = PricingEngine.price(&items, None, Some(&rejected), None);
        assert_eq!(b.coupon_discount, Decimal::ZERO);
        assert_eq!(b.grand_total, dec!(80.00));
    }

    #[test]
    fn discounts_are_rounded_to_cents() {
        let items = [item(dec!(33.33), 1)];
        let b = PricingEngine.price(&items, None, None, Some(&PaymentSelection::Pix));
        // 5% of 33.33 is 1.6665
        assert_eq!(b.payment_discount, dec!(1.67));
        assert_eq!(b.grand_total, dec!(31.66));
    }

    #[test]
    fn pricing_is_deterministic() {
        let items = [item(dec!(19.99), 3), item(dec!(5.01), 7)];
        let shipping = quote(dec!(95.04));
        let coupon = CouponValidator.validate("BEMVINDO10");
        let payment = PaymentSelection::CreditCard {
            installments: Installments::new(4).unwrap(),
        };

        let first = PricingEngine.price(&items, Some(&shipping), Some(&coupon), Some(&payment));
        let second = PricingEngine.price(&items, Some(&shipping), Some(&coupon), Some(&payment));
        assert_eq!(first, second);
        assert_eq!(first.grand_total.to_string(), second.grand_total.to_string());
    }

    #[test]
    fn installments_split_without_interest() {
        let items = [item(dec!(100.00), 3)];
        let b = PricingEngine.price(&items, None, None, None);
        let plan = PricingEngine.installment_plan(&b);

        assert_eq!(plan.len(), 10);
        assert_eq!(plan[0].amount, dec!(300.00));
        assert_eq!(plan[2].amount, dec!(100.00));
        assert_eq!(plan[6].count, 7);
        assert_eq!(plan[6].amount, dec!(42.86));
        assert_eq!(b.grand_total, dec!(300.00));
    }
}
