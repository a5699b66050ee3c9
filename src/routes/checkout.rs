use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};

use crate::{
    audit,
    dto::checkout::{ApplyCouponRequest, CheckoutView, GoBackRequest, PostalLookupView},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Address, Order, PaymentSelection},
    response::ApiResponse,
    services::checkout_service::CheckoutService,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout_view))
        .route("/address", put(set_address))
        .route("/postal-code/{code}", get(lookup_postal_code))
        .route("/payment", put(select_payment))
        .route("/coupon", post(apply_coupon).delete(remove_coupon))
        .route("/advance", post(advance))
        .route("/back", post(go_back))
        .route("/confirm", post(confirm))
}

#[utoipa::path(
    get,
    path = "/api/checkout",
    responses(
        (status = 200, description = "Current checkout step, legal transitions and price breakdown", body = ApiResponse<CheckoutView>),
        (status = 401, description = "Unauthenticated"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn checkout_view(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CheckoutView>>> {
    let resp = CheckoutService::from_state(&state).view(&user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/checkout/address",
    request_body = Address,
    responses(
        (status = 200, description = "Address saved", body = ApiResponse<CheckoutView>),
        (status = 422, description = "Checkout is past the address step"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn set_address(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<Address>,
) -> AppResult<Json<ApiResponse<CheckoutView>>> {
    let resp = CheckoutService::from_state(&state)
        .set_address(&user, payload)
        .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/checkout/postal-code/{code}",
    params(("code" = String, Path, description = "Postal code (CEP), punctuation ignored")),
    responses(
        (status = 200, description = "Lookup result; the address is prefilled when found", body = ApiResponse<PostalLookupView>),
        (status = 422, description = "Postal code does not have 8 digits"),
        (status = 502, description = "Postal directory failed"),
        (status = 503, description = "Postal directory timed out"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn lookup_postal_code(
    State(state): State<AppState>,
    user: AuthUser,
    Path(code): Path<String>,
) -> AppResult<Json<ApiResponse<PostalLookupView>>> {
    let resp = CheckoutService::from_state(&state)
        .prefill_postal_code(&user, &code)
        .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/checkout/payment",
    request_body = PaymentSelection,
    responses(
        (status = 200, description = "Payment selected", body = ApiResponse<CheckoutView>),
        (status = 422, description = "Checkout is not on the payment step, or installments out of range"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn select_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PaymentSelection>,
) -> AppResult<Json<ApiResponse<CheckoutView>>> {
    let resp = CheckoutService::from_state(&state)
        .select_payment(&user, payload)
        .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/checkout/coupon",
    request_body = ApplyCouponRequest,
    responses(
        (status = 200, description = "Coupon applied", body = ApiResponse<CheckoutView>),
        (status = 422, description = "Invalid coupon"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn apply_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ApplyCouponRequest>,
) -> AppResult<Json<ApiResponse<CheckoutView>>> {
    let resp = CheckoutService::from_state(&state)
        .apply_coupon(&user, &payload.code)
        .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/checkout/coupon",
    responses(
        (status = 200, description = "Coupon removed", body = ApiResponse<CheckoutView>),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn remove_coupon(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CheckoutView>>> {
    let resp = CheckoutService::from_state(&state)
        .remove_coupon(&user)
        .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/checkout/advance",
    responses(
        (status = 200, description = "Moved to the next step", body = ApiResponse<CheckoutView>),
        (status = 409, description = "Cart is empty or already on the last step"),
        (status = 422, description = "Current step is incomplete"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn advance(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CheckoutView>>> {
    let resp = CheckoutService::from_state(&state).advance(&user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/checkout/back",
    request_body = GoBackRequest,
    responses(
        (status = 200, description = "Moved back; entered data is kept", body = ApiResponse<CheckoutView>),
        (status = 409, description = "Target step is not behind the current one"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn go_back(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<GoBackRequest>,
) -> AppResult<Json<ApiResponse<CheckoutView>>> {
    let resp = CheckoutService::from_state(&state)
        .go_back(&user, payload.step)
        .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/checkout/confirm",
    responses(
        (status = 200, description = "Order placed and cart cleared", body = ApiResponse<Order>),
        (status = 409, description = "Not on review step, empty cart, already confirmed, or cart only partially cleared"),
        (status = 422, description = "Checkout data incomplete"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn confirm(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Order>>> {
    let result = CheckoutService::from_state(&state).confirm(&user).await;

    match &result {
        Ok(resp) => {
            if let Some(order) = resp.data.as_ref() {
                audit::record(
                    &state.pool,
                    user.user_id,
                    "checkout",
                    "orders",
                    serde_json::json!({ "order_id": order.id, "total": order.total }),
                )
                .await;
            }
        }
        Err(AppError::CartClearIncomplete {
            order_id,
            remaining,
        }) => {
            audit::record(
                &state.pool,
                user.user_id,
                "cart_clear_incomplete",
                "cart_items",
                serde_json::json!({ "order_id": order_id, "remaining": remaining }),
            )
            .await;
        }
        Err(_) => {}
    }

    Ok(Json(result?))
}
