use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartList, UpdateQuantityRequest},
    error::{AppError, AppResult, ValidationError},
    middleware::auth::AuthUser,
    models::{CartItem, PostalCode},
    response::{ApiResponse, Meta},
    routes::params::CartQuery,
    services::{pricing::PricingEngine, shipping::ShippingRateResolver},
    store::{CartStore, CommerceStore},
};

/// Prices are stored as NUMERIC(12,2).
const PRICE_LIMIT: Decimal = dec!(10000000000);
const MAX_QUANTITY: u32 = i32::MAX as u32;

pub async fn list_cart(
    store: &dyn CommerceStore,
    user: &AuthUser,
    query: CartQuery,
) -> AppResult<ApiResponse<CartList>> {
    let postal_code = query
        .postal_code
        .as_deref()
        .map(|raw| PostalCode::parse(raw).ok_or(ValidationError::InvalidPostalCode))
        .transpose()?;
    let (page, per_page, offset) = query.pagination().normalize();
    let items = store.list_cart_items(user.user_id).await?;

    let subtotal = PricingEngine::subtotal(&items);
    let free_shipping_remaining = ShippingRateResolver.free_shipping_remaining(subtotal);
    let shipping = postal_code.map(|code| ShippingRateResolver.resolve(&code, subtotal));
    let item_count = items.iter().map(|item| u64::from(item.quantity)).sum();
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(offset as usize)
        .take(per_page as usize)
        .collect();

    let meta = Meta::new(page, per_page, total);
    Ok(ApiResponse::success(
        "OK",
        CartList {
            items,
            subtotal,
            item_count,
            free_shipping_remaining,
            shipping,
        },
        Some(meta),
    ))
}

pub async fn add_to_cart(
    store: &dyn CommerceStore,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    let product_name = payload.product_name.trim();
    if product_name.is_empty() {
        return Err(invalid("product_name", "must not be empty"));
    }
    if payload.price.is_sign_negative() {
        return Err(invalid("price", "must not be negative"));
    }
    if payload.price.normalize().scale() > 2 {
        return Err(invalid("price", "must have at most 2 decimal places"));
    }
    if payload.price >= PRICE_LIMIT {
        return Err(invalid("price", "must be below 10000000000"));
    }
    check_quantity(payload.quantity)?;

    let item = CartItem {
        id: Uuid::new_v4(),
        user_id: user.user_id,
        product_id: payload.product_id,
        product_name: product_name.to_string(),
        product_image: payload.product_image,
        price: payload.price,
        quantity: payload.quantity,
        size: payload.size,
        color: payload.color,
        created_at: Utc::now(),
    };
    store.insert_cart_item(&item).await?;
    tracing::debug!(user_id = %user.user_id, cart_item_id = %item.id, "cart item added");

    Ok(ApiResponse::success("Added to cart", item, None))
}

pub async fn update_quantity(
    store: &dyn CommerceStore,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateQuantityRequest,
) -> AppResult<ApiResponse<CartItem>> {
    check_quantity(payload.quantity)?;

    let item = store
        .update_cart_quantity(user.user_id, item_id, payload.quantity)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success("OK", item, None))
}

pub async fn remove_from_cart(
    store: &dyn CommerceStore,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if !store.delete_cart_item(user.user_id, item_id).await? {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn check_quantity(quantity: u32) -> AppResult<()> {
    if quantity == 0 {
        return Err(invalid("quantity", "must be greater than 0"));
    }
    if quantity > MAX_QUANTITY {
        return Err(invalid("quantity", "must be at most 2147483647"));
    }
    Ok(())
}

fn invalid(field: &'static str, message: &'static str) -> AppError {
    ValidationError::InvalidField { field, message }.into()
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::store::MemoryStore;

    fn shopper() -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            email: "bia@example.com".into(),
            name: "Bia".into(),
        }
    }

    fn request(price: rust_decimal::Decimal, quantity: u32) -> AddToCartRequest {
        AddToCartRequest {
            product_id: Uuid::new_v4(),
            product_name: "Blusa de Linho".into(),
            product_image: Some("https://cdn.example.com/blusa.jpg".into()),
            price,
            quantity,
            size: Some("P".into()),
            color: None,
        }
    }

    #[tokio::test]
    async fn same_product_twice_makes_two_lines() {
        let store = MemoryStore::new();
        let user = shopper();
        let payload = request(dec!(59.90), 1);

        add_to_cart(&store, &user, payload.clone()).await.unwrap();
        add_to_cart(&store, &user, payload).await.unwrap();

        let list = list_cart(&store, &user, CartQuery::default())
            .await
            .unwrap()
            .into_data()
            .unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.subtotal, dec!(119.80));
        assert_eq!(list.item_count, 2);
        assert_eq!(list.free_shipping_remaining, dec!(179.20));
        assert!(list.shipping.is_none());
    }

    #[tokio::test]
    async fn listing_with_postal_code_quotes_shipping() {
        let store = MemoryStore::new();
        let user = shopper();
        add_to_cart(&store, &user, request(dec!(100.00), 1)).await.unwrap();
        let query = |code: &str| CartQuery {
            postal_code: Some(code.into()),
            ..CartQuery::default()
        };

        let list = list_cart(&store, &user, query("20040-002"))
            .await
            .unwrap()
            .into_data()
            .unwrap();
        let quote = list.shipping.expect("quote for a valid cep");
        assert_eq!(quote.cost, dec!(22.90));
        assert!(!quote.free);
        assert_eq!(list.free_shipping_remaining, dec!(199.00));

        add_to_cart(&store, &user, request(dec!(250.00), 1)).await.unwrap();
        let list = list_cart(&store, &user, query("20040002"))
            .await
            .unwrap()
            .into_data()
            .unwrap();
        assert!(list.shipping.expect("quote").free);
        assert_eq!(list.free_shipping_remaining, Decimal::ZERO);

        let bad = list_cart(&store, &user, query("2004")).await;
        assert!(matches!(
            bad,
            Err(AppError::Validation(ValidationError::InvalidPostalCode))
        ));
    }

    #[tokio::test]
    async fn rejects_values_the_database_cannot_hold() {
        let store = MemoryStore::new();
        let user = shopper();
        let field_of = |result: AppResult<ApiResponse<CartItem>>| match result {
            Err(AppError::Validation(ValidationError::InvalidField { field, .. })) => field,
            other => panic!("expected a field error, got {other:?}"),
        };

        assert_eq!(
            field_of(add_to_cart(&store, &user, request(dec!(19.999), 1)).await),
            "price"
        );
        assert_eq!(
            field_of(add_to_cart(&store, &user, request(dec!(10000000000.00), 1)).await),
            "price"
        );
        assert_eq!(
            field_of(add_to_cart(&store, &user, request(Decimal::MAX, 1)).await),
            "price"
        );
        assert_eq!(
            field_of(add_to_cart(&store, &user, request(dec!(10), u32::MAX)).await),
            "quantity"
        );

        let trailing_zeros = add_to_cart(&store, &user, request(dec!(19.9000), 1)).await;
        assert!(trailing_zeros.is_ok());
        let largest = add_to_cart(&store, &user, request(dec!(9999999999.99), MAX_QUANTITY))
            .await
            .unwrap()
            .into_data()
            .unwrap();

        assert_eq!(
            field_of(
                update_quantity(
                    &store,
                    &user,
                    largest.id,
                    UpdateQuantityRequest {
                        quantity: MAX_QUANTITY + 1
                    },
                )
                .await
            ),
            "quantity"
        );
        assert_eq!(store.list_cart_items(user.user_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rejects_bad_snapshots() {
        let store = MemoryStore::new();
        let user = shopper();

        let zero = add_to_cart(&store, &user, request(dec!(10), 0)).await;
        assert!(matches!(zero, Err(AppError::Validation(_))));

        let negative = add_to_cart(&store, &user, request(dec!(-1), 1)).await;
        assert!(matches!(negative, Err(AppError::Validation(_))));

        let mut unnamed = request(dec!(10), 1);
        unnamed.product_name = "   ".into();
        assert!(matches!(
            add_to_cart(&store, &user, unnamed).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn other_users_items_are_not_found() {
        let store = MemoryStore::new();
        let owner = shopper();
        let stranger = shopper();
        let item = add_to_cart(&store, &owner, request(dec!(25), 1))
            .await
            .unwrap()
            .into_data()
            .unwrap();

        let update = update_quantity(
            &store,
            &stranger,
            item.id,
            UpdateQuantityRequest { quantity: 4 },
        )
        .await;
        assert!(matches!(update, Err(AppError::NotFound)));
        assert!(matches!(
            remove_from_cart(&store, &stranger, item.id).await,
            Err(AppError::NotFound)
        ));

        let updated = update_quantity(&store, &owner, item.id, UpdateQuantityRequest { quantity: 4 })
            .await
            .unwrap()
            .into_data()
            .unwrap();
        assert_eq!(updated.quantity, 4);
        remove_from_cart(&store, &owner, item.id).await.unwrap();
    }
}
