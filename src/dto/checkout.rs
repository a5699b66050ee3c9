use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::{Address, PaymentSelection},
    postal::AddressHint,
    services::{
        checkout_machine::CheckoutStep,
        coupon::CouponResult,
        pricing::{InstallmentOption, PriceBreakdown},
        shipping::ShippingQuote,
    },
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyCouponRequest {
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GoBackRequest {
    pub step: CheckoutStep,
}

/// Current state of the shopper's checkout, priced against the cart as it is
/// right now.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutView {
    pub step: CheckoutStep,
    pub step_number: u8,
    pub furthest_step: CheckoutStep,
    /// Steps the shopper may move to from here.
    pub transitions: Vec<CheckoutStep>,
    pub address: Address,
    pub payment: Option<PaymentSelection>,
    pub coupon: Option<CouponResult>,
    pub shipping: Option<ShippingQuote>,
    pub breakdown: PriceBreakdown,
    /// Filled only while credit card is the selected payment.
    pub installments: Vec<InstallmentOption>,
    pub item_count: u64,
    /// Becomes the order id once the checkout is confirmed.
    pub confirmation_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostalLookupView {
    pub postal_code: String,
    pub found: bool,
    pub address: Option<AddressHint>,
    /// Whether the hint was copied into the checkout address.
    pub applied: bool,
}
