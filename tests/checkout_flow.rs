use async_trait::async_trait;
use checkout_api::{
    dto::{cart::AddToCartRequest, checkout::CheckoutView},
    error::{AppError, CollaboratorFailure, PreconditionError, ValidationError},
    middleware::auth::AuthUser,
    models::{Address, AddressField, Installments, OrderStatus, PaymentSelection, PostalCode},
    postal::{AddressHint, PostalDirectory},
    routes::params::{CartQuery, OrderListQuery},
    services::{
        cart_service,
        checkout_machine::CheckoutStep,
        checkout_service::{CheckoutService, CheckoutSessions},
        order_service,
    },
    store::{CartStore, MemoryStore},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

struct StubDirectory;

#[async_trait]
impl PostalDirectory for StubDirectory {
    async fn lookup(
        &self,
        postal_code: &PostalCode,
    ) -> Result<Option<AddressHint>, CollaboratorFailure> {
        match postal_code.as_str() {
            "01310100" => Ok(Some(AddressHint {
                street: "Avenida Paulista".into(),
                neighborhood: "Bela Vista".into(),
                city: "São Paulo".into(),
                state: "SP".into(),
            })),
            "99999999" => Err(CollaboratorFailure::PostalLookupTimeout),
            _ => Ok(None),
        }
    }
}

fn shopper() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        email: "carla@example.com".into(),
        name: "Carla".into(),
    }
}

async fn add(store: &MemoryStore, user: &AuthUser, name: &str, price: Decimal, quantity: u32) -> Uuid {
    cart_service::add_to_cart(
        store,
        user,
        AddToCartRequest {
            product_id: Uuid::new_v4(),
            product_name: name.into(),
            product_image: None,
            price,
            quantity,
            size: Some("M".into()),
            color: None,
        },
    )
    .await
    .unwrap()
    .into_data()
    .unwrap()
    .id
}

fn address(postal_code: &str) -> Address {
    Address {
        postal_code: postal_code.into(),
        street: "Rua Augusta".into(),
        number: "500".into(),
        complement: None,
        neighborhood: "Consolação".into(),
        city: "São Paulo".into(),
        state: "SP".into(),
    }
}

async fn reach_review(svc: &CheckoutService<'_>, user: &AuthUser, payment: PaymentSelection) -> CheckoutView {
    svc.set_address(user, address("01310-100")).await.unwrap();
    svc.advance(user).await.unwrap();
    svc.select_payment(user, payment).await.unwrap();
    svc.advance(user).await.unwrap().into_data().unwrap()
}

#[tokio::test]
async fn full_checkout_places_order_and_empties_cart() {
    let store = MemoryStore::new();
    let sessions = CheckoutSessions::new();
    let svc = CheckoutService::new(&store, &StubDirectory, &sessions);
    let user = shopper();

    add(&store, &user, "Vestido Midi", dec!(120.00), 1).await;
    add(&store, &user, "Cinto de Couro", dec!(40.00), 2).await;

    let view = svc.view(&user).await.unwrap().into_data().unwrap();
    assert_eq!(view.step, CheckoutStep::Address);
    assert!(view.transitions.is_empty());
    assert_eq!(view.breakdown.subtotal, dec!(200.00));
    assert_eq!(view.breakdown.grand_total, dec!(200.00));
    assert_eq!(view.item_count, 3);

    match svc.advance(&user).await {
        Err(AppError::Validation(ValidationError::IncompleteAddress { missing })) => {
            assert!(missing.contains(&AddressField::Street));
            assert!(missing.contains(&AddressField::Number));
        }
        other => panic!("expected incomplete address, got {other:?}"),
    }

    let lookup = svc
        .prefill_postal_code(&user, "01310-100")
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert!(lookup.found && lookup.applied);

    let mut filled = svc.view(&user).await.unwrap().into_data().unwrap().address;
    assert_eq!(filled.street, "Avenida Paulista");
    assert_eq!(filled.postal_code, "01310100");
    filled.number = "1578".into();
    svc.set_address(&user, filled).await.unwrap();

    let view = svc.advance(&user).await.unwrap().into_data().unwrap();
    assert_eq!(view.step, CheckoutStep::Payment);
    let shipping = view.shipping.expect("quote attached");
    assert_eq!(shipping.cost, dec!(12.90));
    assert_eq!(shipping.delivery_window, "7–12 business days");

    assert!(matches!(
        svc.set_address(&user, address("20000-000")).await,
        Err(AppError::Validation(ValidationError::StepLocked { .. }))
    ));
    assert!(matches!(
        svc.advance(&user).await,
        Err(AppError::Validation(ValidationError::MissingPaymentSelection))
    ));

    assert!(matches!(
        svc.apply_coupon(&user, "FRETEGRATIS").await,
        Err(AppError::Validation(ValidationError::InvalidCoupon { .. }))
    ));
    let view = svc
        .apply_coupon(&user, " bemvindo10 ")
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(view.breakdown.coupon_discount, dec!(20.00));

    let card = PaymentSelection::CreditCard {
        installments: Installments::new(3).unwrap(),
    };
    let view = svc.select_payment(&user, card).await.unwrap().into_data().unwrap();
    assert_eq!(view.installments.len(), 10);
    assert_eq!(view.breakdown.grand_total, dec!(192.90));
    assert_eq!(view.installments[2].amount, dec!(64.30));

    let view = svc
        .select_payment(&user, PaymentSelection::Pix)
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert!(view.installments.is_empty());
    assert_eq!(view.breakdown.payment_discount, dec!(10.00));
    assert_eq!(view.breakdown.grand_total, dec!(182.90));

    let view = svc.advance(&user).await.unwrap().into_data().unwrap();
    assert_eq!(view.step, CheckoutStep::Review);
    let confirmation_id = view.confirmation_id;

    let order = svc.confirm(&user).await.unwrap().into_data().unwrap();
    assert_eq!(order.id, confirmation_id);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.total, dec!(182.90));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.coupon_code.as_deref(), Some("BEMVINDO10"));
    assert!(store.list_cart_items(user.user_id).await.unwrap().is_empty());
    assert!(sessions.is_empty());

    let pending = order_service::list_orders(
        &store,
        &user,
        OrderListQuery {
            status: Some(OrderStatus::Pending),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(pending.meta.as_ref().and_then(|m| m.total), Some(1));
    let delivered = order_service::list_orders(
        &store,
        &user,
        OrderListQuery {
            status: Some(OrderStatus::Delivered),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .into_data()
    .unwrap();
    assert!(delivered.items.is_empty());

    assert!(matches!(
        svc.confirm(&user).await,
        Err(AppError::Precondition(PreconditionError::NotOnReviewStep))
    ));
}

#[tokio::test]
async fn going_back_keeps_data_and_requote_follows_cart() {
    let store = MemoryStore::new();
    let sessions = CheckoutSessions::new();
    let svc = CheckoutService::new(&store, &StubDirectory, &sessions);
    let user = shopper();
    add(&store, &user, "Saia Plissada", dec!(150.00), 1).await;

    let review = reach_review(&svc, &user, PaymentSelection::Boleto).await;
    assert_eq!(
        review.transitions,
        vec![CheckoutStep::Address, CheckoutStep::Payment]
    );
    assert!(!review.shipping.as_ref().unwrap().free);

    add(&store, &user, "Jaqueta Jeans", dec!(160.00), 1).await;
    let view = svc.view(&user).await.unwrap().into_data().unwrap();
    let shipping = view.shipping.unwrap();
    assert!(shipping.free);
    assert_eq!(view.breakdown.shipping_cost, Decimal::ZERO);
    assert_eq!(view.breakdown.grand_total, dec!(310.00));

    let back = svc
        .go_back(&user, CheckoutStep::Address)
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(back.step, CheckoutStep::Address);
    assert_eq!(back.furthest_step, CheckoutStep::Review);
    assert_eq!(back.address, address("01310-100"));
    assert_eq!(back.payment, Some(PaymentSelection::Boleto));

    assert!(matches!(
        svc.go_back(&user, CheckoutStep::Review).await,
        Err(AppError::Precondition(PreconditionError::IllegalTransition { .. }))
    ));
    assert!(matches!(
        svc.confirm(&user).await,
        Err(AppError::Precondition(PreconditionError::NotOnReviewStep))
    ));
}

#[tokio::test]
async fn partial_clear_is_retried_without_a_second_order() {
    let store = MemoryStore::new();
    let sessions = CheckoutSessions::new();
    let svc = CheckoutService::new(&store, &StubDirectory, &sessions);
    let user = shopper();

    add(&store, &user, "Camisa Social", dec!(99.90), 1).await;
    let stuck = add(&store, &user, "Gravata", dec!(49.90), 1).await;
    reach_review(&svc, &user, PaymentSelection::Pix).await;

    store.fail_deletes_of(stuck);
    let order_id = match svc.confirm(&user).await {
        Err(AppError::CartClearIncomplete {
            order_id,
            remaining,
        }) => {
            assert_eq!(remaining, vec![stuck]);
            order_id
        }
        other => panic!("expected incomplete clear, got {other:?}"),
    };

    // An item added after the order was taken is not part of it.
    let later = add(&store, &user, "Meias", dec!(19.90), 2).await;

    match svc.confirm(&user).await {
        Err(AppError::Precondition(PreconditionError::AlreadyConfirmed { order_id: existing })) => {
            assert_eq!(existing, order_id);
        }
        other => panic!("expected the existing order, got {other:?}"),
    }

    store.restore_deletes();
    let reconciled = order_service::reconcile_cart(&store, &user, order_id)
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(reconciled.removed, vec![stuck]);

    let cart = store.list_cart_items(user.user_id).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].id, later);

    let orders = order_service::list_orders(&store, &user, OrderListQuery::default())
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(orders.items.len(), 1);
    assert_eq!(orders.items[0].items.len(), 2);

    let order = order_service::get_order(&store, &user, order_id)
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(order.subtotal, dec!(149.80));
}

#[tokio::test]
async fn postal_lookup_never_blocks_manual_entry() {
    let store = MemoryStore::new();
    let sessions = CheckoutSessions::new();
    let svc = CheckoutService::new(&store, &StubDirectory, &sessions);
    let user = shopper();
    add(&store, &user, "Bolsa", dec!(80.00), 1).await;

    assert!(matches!(
        svc.prefill_postal_code(&user, "123").await,
        Err(AppError::Validation(ValidationError::InvalidPostalCode))
    ));

    let err = svc.prefill_postal_code(&user, "99999-999").await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Collaborator(CollaboratorFailure::PostalLookupTimeout)
    ));

    let unknown = svc
        .prefill_postal_code(&user, "25000-000")
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert!(!unknown.found && !unknown.applied);

    svc.set_address(&user, address("99999-999")).await.unwrap();
    let view = svc.advance(&user).await.unwrap().into_data().unwrap();
    assert_eq!(view.step, CheckoutStep::Payment);
    assert_eq!(view.shipping.unwrap().cost, dec!(29.90));
}

#[tokio::test]
async fn empty_cart_cannot_start_checkout() {
    let store = MemoryStore::new();
    let sessions = CheckoutSessions::new();
    let svc = CheckoutService::new(&store, &StubDirectory, &sessions);
    let user = shopper();

    svc.set_address(&user, address("01310-100")).await.unwrap();
    assert!(matches!(
        svc.advance(&user).await,
        Err(AppError::Precondition(PreconditionError::EmptyCart))
    ));

    let cart = cart_service::list_cart(&store, &user, CartQuery::default())
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.subtotal, Decimal::ZERO);
}
