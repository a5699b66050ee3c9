use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{OrderList, ReconcileResult},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/{id}", get(get_order))
        .route("/{id}/reconcile-cart", post(reconcile_cart))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "List own orders", body = ApiResponse<OrderList>),
        (status = 401, description = "Unauthenticated"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(state.store.as_ref(), &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<Order>),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::get_order(state.store.as_ref(), &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/reconcile-cart",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Cart items of the order removed", body = ApiResponse<ReconcileResult>),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Some cart items still could not be removed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn reconcile_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ReconcileResult>>> {
    let resp = order_service::reconcile_cart(state.store.as_ref(), &user, id).await?;
    // The checkout that produced this order has nothing left to confirm.
    state.sessions.release(user.user_id, id);

    if let Some(data) = resp.data.as_ref() {
        audit::record(
            &state.pool,
            user.user_id,
            "cart_reconcile",
            "cart_items",
            serde_json::json!({ "order_id": id, "removed": data.removed }),
        )
        .await;
    }

    Ok(Json(resp))
}
