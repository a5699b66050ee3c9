use uuid::Uuid;

use crate::{
    dto::orders::{OrderList, ReconcileResult},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Order,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::order_factory::OrderFactory,
    store::{CommerceStore, OrderFilter, OrderStore},
};

pub async fn list_orders(
    store: &dyn CommerceStore,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, per_page, offset) = query.pagination().normalize();
    let filter = OrderFilter {
        status: query.status,
        newest_first: matches!(query.sort_order.unwrap_or(SortOrder::Desc), SortOrder::Desc),
        limit: per_page,
        offset,
    };

    let (items, total) = store.list_orders(user.user_id, &filter).await?;

    let meta = Meta::new(page, per_page, total);
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    store: &dyn CommerceStore,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let order = store
        .get_order(user.user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

pub async fn reconcile_cart(
    store: &dyn CommerceStore,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<ReconcileResult>> {
    let removed = OrderFactory::new(store)
        .reconcile_cart(user.user_id, id)
        .await?;
    tracing::info!(user_id = %user.user_id, order_id = %id, removed = removed.len(), "cart reconciled");

    Ok(ApiResponse::success(
        "Cart cleared",
        ReconcileResult {
            order_id: id,
            removed,
        },
        Some(Meta::empty()),
    ))
}
