use std::{collections::HashMap, str::FromStr};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnAcquireErr, Condition, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RuntimeErr, Set, SqlErr,
    TransactionTrait,
};
use uuid::Uuid;

use super::{CartStore, OrderFilter, OrderStore, StoreError};
use crate::{
    db::QUERY_CANCELED,
    entity::{
        cart_items::{ActiveModel as CartActive, Column as CartCol, Entity as CartItems, Model as CartModel},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    models::{Address, CartItem, Installments, Order, OrderItem, OrderStatus, PaymentSelection},
};

fn sqlstate(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(db)))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(db)))
        | DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::Database(db))) => {
            db.code().map(|code| code.into_owned())
        }
        _ => None,
    }
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(_)) = err.sql_err() {
            return StoreError::Conflict;
        }
        if sqlstate(&err).as_deref() == Some(QUERY_CANCELED) {
            return StoreError::Timeout;
        }
        match err {
            DbErr::ConnectionAcquire(ConnAcquireErr::Timeout) => StoreError::Timeout,
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Postgres-backed store built on the sea-orm entities.
#[derive(Debug, Clone)]
pub struct SeaOrmStore {
    conn: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    async fn items_for(&self, order_ids: Vec<Uuid>) -> Result<HashMap<Uuid, Vec<OrderItem>>, StoreError> {
        let rows = OrderItems::find()
            .filter(OrderItemCol::OrderId.is_in(order_ids))
            .order_by_asc(OrderItemCol::Position)
            .all(&self.conn)
            .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let order_id = row.order_id;
            grouped
                .entry(order_id)
                .or_default()
                .push(order_item_from_entity(row)?);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl CartStore for SeaOrmStore {
    async fn list_cart_items(&self, user_id: Uuid) -> Result<Vec<CartItem>, StoreError> {
        CartItems::find()
            .filter(CartCol::UserId.eq(user_id))
            .order_by_asc(CartCol::CreatedAt)
            .order_by_asc(CartCol::Id)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(cart_item_from_entity)
            .collect()
    }

    async fn insert_cart_item(&self, item: &CartItem) -> Result<(), StoreError> {
        CartActive {
            id: Set(item.id),
            user_id: Set(item.user_id),
            product_id: Set(item.product_id),
            product_name: Set(item.product_name.clone()),
            product_image: Set(item.product_image.clone()),
            price: Set(item.price),
            quantity: Set(to_db_quantity(item.quantity)?),
            size: Set(item.size.clone()),
            color: Set(item.color.clone()),
            created_at: Set(item.created_at.into()),
        }
        .insert(&self.conn)
        .await?;
        Ok(())
    }

    async fn update_cart_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: u32,
    ) -> Result<Option<CartItem>, StoreError> {
        let existing = CartItems::find()
            .filter(
                Condition::all()
                    .add(CartCol::Id.eq(item_id))
                    .add(CartCol::UserId.eq(user_id)),
            )
            .one(&self.conn)
            .await?;
        let Some(existing) = existing else {
            return Ok(None);
        };

        let mut active: CartActive = existing.into();
        active.quantity = Set(to_db_quantity(quantity)?);
        let updated = active.update(&self.conn).await?;
        cart_item_from_entity(updated).map(Some)
    }

    async fn delete_cart_item(&self, user_id: Uuid, item_id: Uuid) -> Result<bool, StoreError> {
        let result = CartItems::delete_many()
            .filter(CartCol::Id.eq(item_id))
            .filter(CartCol::UserId.eq(user_id))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl OrderStore for SeaOrmStore {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let address = serde_json::to_value(&order.shipping_address)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;

        let txn = self.conn.begin().await?;

        OrderActive {
            id: Set(order.id),
            user_id: Set(order.user_id),
            subtotal: Set(order.subtotal),
            coupon_code: Set(order.coupon_code.clone()),
            coupon_discount: Set(order.coupon_discount),
            payment_discount: Set(order.payment_discount),
            shipping_cost: Set(order.shipping_cost),
            total: Set(order.total),
            status: Set(order.status.to_string()),
            payment_method: Set(order.payment.method_name().to_string()),
            installments: Set(order.payment.installments().map(|n| i16::from(n.get()))),
            shipping_address: Set(address),
            created_at: Set(order.created_at.into()),
        }
        .insert(&txn)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            OrderItemActive {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                position: Set(position as i32),
                cart_item_id: Set(item.cart_item_id),
                product_id: Set(item.product_id),
                product_name: Set(item.product_name.clone()),
                price: Set(item.price),
                quantity: Set(to_db_quantity(item.quantity)?),
                size: Set(item.size.clone()),
                color: Set(item.color.clone()),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn get_order(&self, user_id: Uuid, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        let order = Orders::find()
            .filter(
                Condition::all()
                    .add(OrderCol::UserId.eq(user_id))
                    .add(OrderCol::Id.eq(order_id)),
            )
            .one(&self.conn)
            .await?;
        let Some(order) = order else {
            return Ok(None);
        };

        let mut items = self.items_for(vec![order.id]).await?;
        let items = items.remove(&order.id).unwrap_or_default();
        order_from_entity(order, items).map(Some)
    }

    async fn list_orders(
        &self,
        user_id: Uuid,
        filter: &OrderFilter,
    ) -> Result<(Vec<Order>, u64), StoreError> {
        let mut condition = Condition::all().add(OrderCol::UserId.eq(user_id));
        if let Some(status) = filter.status {
            condition = condition.add(OrderCol::Status.eq(status.as_ref()));
        }

        let mut finder = Orders::find().filter(condition);
        finder = if filter.newest_first {
            finder
                .order_by_desc(OrderCol::CreatedAt)
                .order_by_desc(OrderCol::Id)
        } else {
            finder
                .order_by_asc(OrderCol::CreatedAt)
                .order_by_asc(OrderCol::Id)
        };

        let total = finder.clone().count(&self.conn).await?;

        let models = finder
            .limit(filter.limit)
            .offset(filter.offset)
            .all(&self.conn)
            .await?;

        let mut items = self.items_for(models.iter().map(|m| m.id).collect()).await?;
        let orders = models
            .into_iter()
            .map(|model| {
                let lines = items.remove(&model.id).unwrap_or_default();
                order_from_entity(model, lines)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((orders, total))
    }
}

fn to_db_quantity(quantity: u32) -> Result<i32, StoreError> {
    i32::try_from(quantity).map_err(|_| StoreError::Corrupt(format!("quantity {quantity} too large")))
}

fn from_db_quantity(quantity: i32) -> Result<u32, StoreError> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| StoreError::Corrupt(format!("quantity {quantity} is not positive")))
}

fn cart_item_from_entity(model: CartModel) -> Result<CartItem, StoreError> {
    Ok(CartItem {
        id: model.id,
        user_id: model.user_id,
        product_id: model.product_id,
        product_name: model.product_name,
        product_image: model.product_image,
        price: model.price,
        quantity: from_db_quantity(model.quantity)?,
        size: model.size,
        color: model.color,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn order_item_from_entity(model: OrderItemModel) -> Result<OrderItem, StoreError> {
    Ok(OrderItem {
        product_id: model.product_id,
        product_name: model.product_name,
        price: model.price,
        quantity: from_db_quantity(model.quantity)?,
        size: model.size,
        color: model.color,
        cart_item_id: model.cart_item_id,
    })
}

fn order_from_entity(model: OrderModel, items: Vec<OrderItem>) -> Result<Order, StoreError> {
    let status = OrderStatus::from_str(&model.status)
        .map_err(|_| StoreError::Corrupt(format!("unknown order status {:?}", model.status)))?;

    let installments = model
        .installments
        .map(|n| {
            u8::try_from(n)
                .ok()
                .and_then(|n| Installments::new(n).ok())
                .map(Installments::get)
                .ok_or_else(|| StoreError::Corrupt(format!("invalid installments {n}")))
        })
        .transpose()?;
    let payment = PaymentSelection::from_parts(&model.payment_method, installments).ok_or_else(|| {
        StoreError::Corrupt(format!("unknown payment method {:?}", model.payment_method))
    })?;

    let shipping_address: Address = serde_json::from_value(model.shipping_address)
        .map_err(|err| StoreError::Corrupt(format!("shipping address: {err}")))?;

    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        items,
        subtotal: model.subtotal,
        coupon_code: model.coupon_code,
        coupon_discount: model.coupon_discount,
        payment_discount: model.payment_discount,
        shipping_cost: model.shipping_cost,
        total: model.total,
        status,
        shipping_address,
        payment,
        created_at: model.created_at.with_timezone(&Utc),
    })
}
