use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, CartList, UpdateQuantityRequest},
        checkout::{ApplyCouponRequest, CheckoutView, GoBackRequest, PostalLookupView},
        orders::{OrderList, ReconcileResult},
    },
    models::{Address, AddressField, CartItem, Installments, Order, OrderItem, OrderStatus, PaymentSelection},
    postal::AddressHint,
    response::{ApiResponse, Meta},
    routes::{cart, checkout, health, orders, params},
    services::{
        checkout_machine::CheckoutStep,
        coupon::CouponResult,
        pricing::{InstallmentOption, PriceBreakdown},
        shipping::ShippingQuote,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_quantity,
        cart::remove_from_cart,
        checkout::checkout_view,
        checkout::set_address,
        checkout::lookup_postal_code,
        checkout::select_payment,
        checkout::apply_coupon,
        checkout::remove_coupon,
        checkout::advance,
        checkout::go_back,
        checkout::confirm,
        orders::list_orders,
        orders::get_order,
        orders::reconcile_cart
    ),
    components(
        schemas(
            CartItem,
            Order,
            OrderItem,
            OrderStatus,
            Address,
            AddressField,
            AddressHint,
            PaymentSelection,
            Installments,
            CheckoutStep,
            CouponResult,
            ShippingQuote,
            PriceBreakdown,
            InstallmentOption,
            AddToCartRequest,
            UpdateQuantityRequest,
            CartList,
            ApplyCouponRequest,
            GoBackRequest,
            CheckoutView,
            PostalLookupView,
            OrderList,
            ReconcileResult,
            params::Pagination,
            params::CartQuery,
            params::SortOrder,
            params::OrderListQuery,
            Meta,
            ApiResponse<CartList>,
            ApiResponse<CheckoutView>,
            ApiResponse<Order>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Checkout", description = "Checkout flow endpoints"),
        (name = "Orders", description = "Order endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
