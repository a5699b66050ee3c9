//! Turns a reviewed checkout into a persisted order, then clears the cart it
//! was built from.
//!
//! The two stages are not atomic. The order row is written first; cart items
//! are then deleted one at a time and any that could not be removed are
//! reported through [`AppError::CartClearIncomplete`] so the clear alone can be
//! retried with [`OrderFactory::reconcile_cart`].

use anyhow::anyhow;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, PreconditionError},
    middleware::auth::AuthUser,
    models::{Address, CartItem, Order, OrderItem, OrderStatus, PaymentSelection},
    services::{coupon::CouponResult, pricing::PriceBreakdown, pricing::PricingEngine},
    store::{CartStore, CommerceStore, OrderStore, StoreError},
};

/// Everything needed to place one order.
#[derive(Debug, Clone, Copy)]
pub struct OrderRequest<'a> {
    /// Fixed per checkout confirmation; a second insert with the same id is
    /// refused by the store.
    pub order_id: Uuid,
    pub user: &'a AuthUser,
    pub items: &'a [CartItem],
    pub address: &'a Address,
    pub payment: PaymentSelection,
    pub coupon: Option<&'a CouponResult>,
    pub breakdown: &'a PriceBreakdown,
}

pub struct OrderFactory<'a> {
    store: &'a dyn CommerceStore,
}

impl<'a> OrderFactory<'a> {
    pub fn new(store: &'a dyn CommerceStore) -> Self {
        Self { store }
    }

    pub async fn create_order(&self, request: OrderRequest<'_>) -> AppResult<Order> {
        let order = build_order(&request)?;

        match self.store.insert_order(&order).await {
            Ok(()) => {}
            Err(StoreError::Conflict) => {
                return Err(PreconditionError::AlreadyConfirmed { order_id: order.id }.into());
            }
            Err(err) => return Err(err.into()),
        }
        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            items = order.items.len(),
            total = %order.total,
            "order created"
        );

        let source_items: Vec<Uuid> = request.items.iter().map(|item| item.id).collect();
        self.clear_items(order.user_id, order.id, &source_items)
            .await?;

        Ok(order)
    }

    /// Retries deleting the cart items `order_id` was built from. Items that
    /// are already gone count as cleared; returns the ids removed by this call.
    pub async fn reconcile_cart(&self, user_id: Uuid, order_id: Uuid) -> AppResult<Vec<Uuid>> {
        let order = self
            .store
            .get_order(user_id, order_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let source_items: Vec<Uuid> = order.items.iter().map(|item| item.cart_item_id).collect();
        self.clear_items(user_id, order_id, &source_items).await
    }

    async fn clear_items(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        item_ids: &[Uuid],
    ) -> AppResult<Vec<Uuid>> {
        let mut removed = Vec::with_capacity(item_ids.len());
        let mut remaining = Vec::new();

        for item_id in item_ids {
            match self.store.delete_cart_item(user_id, *item_id).await {
                Ok(true) => removed.push(*item_id),
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        %order_id,
                        cart_item_id = %item_id,
                        "failed to remove ordered cart item"
                    );
                    remaining.push(*item_id);
                }
            }
        }

        if remaining.is_empty() {
            Ok(removed)
        } else {
            Err(AppError::CartClearIncomplete {
                order_id,
                remaining,
            })
        }
    }
}

fn build_order(request: &OrderRequest<'_>) -> AppResult<Order> {
    if request.items.is_empty() {
        return Err(PreconditionError::EmptyCart.into());
    }
    request.address.validate()?;

    let user_id = request.user.user_id;
    if let Some(foreign) = request.items.iter().find(|item| item.user_id != user_id) {
        return Err(AppError::Internal(anyhow!(
            "cart item {} does not belong to user {user_id}",
            foreign.id
        )));
    }

    let breakdown = request.breakdown;
    let subtotal = PricingEngine::subtotal(request.items);
    let coupon_discount = request
        .coupon
        .map_or(Decimal::ZERO, |coupon| coupon.discount_amount(subtotal));
    let payment_discount = PricingEngine::payment_discount(subtotal, Some(&request.payment));
    let consistent = breakdown.subtotal == subtotal
        && breakdown.coupon_discount == coupon_discount
        && breakdown.payment_discount == payment_discount
        && breakdown.grand_total
            == breakdown.subtotal - breakdown.coupon_discount - breakdown.payment_discount
                + breakdown.shipping_cost;
    if !consistent {
        return Err(PreconditionError::StaleBreakdown.into());
    }

    Ok(Order {
        id: request.order_id,
        user_id,
        items: request.items.iter().map(OrderItem::from).collect(),
        subtotal: breakdown.subtotal,
        coupon_code: request
            .coupon
            .and_then(CouponResult::applied_code)
            .map(str::to_string),
        coupon_discount: breakdown.coupon_discount,
        payment_discount: breakdown.payment_discount,
        shipping_cost: breakdown.shipping_cost,
        total: breakdown.grand_total,
        status: OrderStatus::INITIAL,
        shipping_address: request.address.clone(),
        payment: request.payment,
        created_at: Utc::now(),
    })
}
