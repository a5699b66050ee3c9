use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{models::CartItem, services::shipping::ShippingQuote};

/// Product snapshot to add to the cart. Each request creates a new line.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_image: Option<String>,
    pub price: Decimal,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartList {
    pub items: Vec<CartItem>,
    /// Over the whole cart, not only this page.
    pub subtotal: Decimal,
    pub item_count: u64,
    /// Left to spend before shipping is free.
    pub free_shipping_remaining: Decimal,
    /// Present only when a postal code was given.
    pub shipping: Option<ShippingQuote>,
}
