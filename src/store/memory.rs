use async_trait::async_trait;
use dashmap::{DashMap, DashSet, mapref::entry::Entry};
use uuid::Uuid;

use super::{CartStore, OrderFilter, OrderStore, StoreError};
use crate::models::{CartItem, Order};

/// In-process store backed by concurrent maps.
///
/// Deletions of specific cart items can be made to fail, which is how the
/// partial cart-clear path gets exercised without a database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    cart_items: DashMap<Uuid, CartItem>,
    orders: DashMap<Uuid, Order>,
    failing_deletes: DashSet<Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_deletes_of(&self, item_id: Uuid) {
        self.failing_deletes.insert(item_id);
    }

    pub fn restore_deletes(&self) {
        self.failing_deletes.clear();
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn list_cart_items(&self, user_id: Uuid) -> Result<Vec<CartItem>, StoreError> {
        let mut items: Vec<CartItem> = self
            .cart_items
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn insert_cart_item(&self, item: &CartItem) -> Result<(), StoreError> {
        match self.cart_items.entry(item.id) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(item.clone());
                Ok(())
            }
        }
    }

    async fn update_cart_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: u32,
    ) -> Result<Option<CartItem>, StoreError> {
        Ok(self
            .cart_items
            .get_mut(&item_id)
            .filter(|item| item.user_id == user_id)
            .map(|mut item| {
                item.quantity = quantity;
                item.clone()
            }))
    }

    async fn delete_cart_item(&self, user_id: Uuid, item_id: Uuid) -> Result<bool, StoreError> {
        if self.failing_deletes.contains(&item_id) {
            return Err(StoreError::Unavailable(format!(
                "delete of cart item {item_id} refused"
            )));
        }
        Ok(self
            .cart_items
            .remove_if(&item_id, |_, item| item.user_id == user_id)
            .is_some())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        match self.orders.entry(order.id) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(order.clone());
                Ok(())
            }
        }
    }

    async fn get_order(&self, user_id: Uuid, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self
            .orders
            .get(&order_id)
            .filter(|order| order.user_id == user_id)
            .map(|order| order.value().clone()))
    }

    async fn list_orders(
        &self,
        user_id: Uuid,
        filter: &OrderFilter,
    ) -> Result<(Vec<Order>, u64), StoreError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .filter(|entry| filter.status.is_none_or(|status| entry.status == status))
            .map(|entry| entry.value().clone())
            .collect();

        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        if filter.newest_first {
            orders.reverse();
        }

        let total = orders.len() as u64;
        let page = orders
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect();
        Ok((page, total))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::{Address, OrderStatus, PaymentSelection};

    async fn page_ids(store: &MemoryStore, user_id: Uuid, newest_first: bool) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for offset in 0..3 {
            let filter = OrderFilter {
                status: None,
                newest_first,
                limit: 1,
                offset,
            };
            let (page, total) = store.list_orders(user_id, &filter).await.unwrap();
            assert_eq!(total, 3);
            ids.extend(page.iter().map(|order| order.id));
        }
        ids
    }

    #[tokio::test]
    async fn orders_placed_at_the_same_instant_page_in_id_order() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let created_at = Utc::now();
        let mut ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            let order = Order {
                id: *id,
                user_id,
                items: Vec::new(),
                subtotal: Decimal::ZERO,
                coupon_code: None,
                coupon_discount: Decimal::ZERO,
                payment_discount: Decimal::ZERO,
                shipping_cost: Decimal::ZERO,
                total: Decimal::ZERO,
                status: OrderStatus::INITIAL,
                shipping_address: Address::default(),
                payment: PaymentSelection::Boleto,
                created_at,
            };
            store.insert_order(&order).await.unwrap();
        }
        ids.sort();

        assert_eq!(page_ids(&store, user_id, false).await, ids);
        ids.reverse();
        assert_eq!(page_ids(&store, user_id, true).await, ids);
    }
}
