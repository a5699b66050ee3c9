//! Persistence capability consumed by the checkout core.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CartItem, Order, OrderStatus};

pub mod database;
pub mod memory;

pub use database::SeaOrmStore;
pub use memory::MemoryStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,

    #[error("store timed out")]
    Timeout,

    #[error("stored record is invalid: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFilter {
    /// Exact match; `None` lists every status.
    pub status: Option<OrderStatus>,
    pub newest_first: bool,
    pub limit: u64,
    pub offset: u64,
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn list_cart_items(&self, user_id: Uuid) -> Result<Vec<CartItem>, StoreError>;

    async fn insert_cart_item(&self, item: &CartItem) -> Result<(), StoreError>;

    /// `None` when the item does not exist or belongs to someone else.
    async fn update_cart_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: u32,
    ) -> Result<Option<CartItem>, StoreError>;

    /// `false` when there was nothing to delete.
    async fn delete_cart_item(&self, user_id: Uuid, item_id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts the order with all of its items, or nothing. Fails with
    /// [`StoreError::Conflict`] when the id is taken.
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn get_order(&self, user_id: Uuid, order_id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Returns one page of orders and the total matching the filter.
    async fn list_orders(
        &self,
        user_id: Uuid,
        filter: &OrderFilter,
    ) -> Result<(Vec<Order>, u64), StoreError>;
}

pub trait CommerceStore: CartStore + OrderStore {}

impl<T: CartStore + OrderStore> CommerceStore for T {}
