use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartList, UpdateQuantityRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::CartItem,
    response::ApiResponse,
    routes::params::CartQuery,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cart_list).post(add_to_cart))
        .route("/{id}", patch(update_quantity).delete(remove_from_cart))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    params(CartQuery),
    responses(
        (status = 200, description = "List cart items for current user", body = ApiResponse<CartList>),
        (status = 401, description = "Unauthenticated"),
        (status = 422, description = "Postal code must have exactly 8 digits"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CartQuery>,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::list_cart(state.store.as_ref(), &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Cart item added", body = ApiResponse<CartItem>),
        (status = 422, description = "Invalid product snapshot"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let resp = cart_service::add_to_cart(state.store.as_ref(), &user, payload).await?;
    if let Some(item) = resp.data.as_ref() {
        audit::record(
            &state.pool,
            user.user_id,
            "cart_add",
            "cart_items",
            serde_json::json!({ "cart_item_id": item.id, "product_id": item.product_id, "quantity": item.quantity }),
        )
        .await;
    }
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/cart/{id}",
    params(("id" = Uuid, Path, description = "Cart item ID")),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Quantity updated", body = ApiResponse<CartItem>),
        (status = 404, description = "Cart item not found"),
        (status = 422, description = "Quantity must be at least 1"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_quantity(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let resp = cart_service::update_quantity(state.store.as_ref(), &user, id, payload).await?;
    audit::record(
        &state.pool,
        user.user_id,
        "cart_update",
        "cart_items",
        serde_json::json!({ "cart_item_id": id, "quantity": payload.quantity }),
    )
    .await;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{id}",
    params(("id" = Uuid, Path, description = "Cart item ID")),
    responses(
        (status = 200, description = "OK", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::remove_from_cart(state.store.as_ref(), &user, id).await?;
    audit::record(
        &state.pool,
        user.user_id,
        "cart_remove",
        "cart_items",
        serde_json::json!({ "cart_item_id": id }),
    )
    .await;
    Ok(Json(resp))
}
