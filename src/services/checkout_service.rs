//! Per-user checkout sessions and the operations that drive them.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::{
    dto::checkout::{CheckoutView, PostalLookupView},
    error::{AppError, AppResult, PreconditionError, ValidationError},
    middleware::auth::AuthUser,
    models::{Address, CartItem, Order, PaymentSelection, PostalCode},
    postal::PostalDirectory,
    response::{ApiResponse, Meta},
    services::{
        checkout_machine::{CheckoutContext, CheckoutStateMachine, CheckoutStep},
        coupon::{CouponResult, CouponValidator},
        order_factory::{OrderFactory, OrderRequest},
        pricing::PricingEngine,
        shipping::ShippingRateResolver,
    },
    state::AppState,
    store::{CartStore, CommerceStore},
};

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub confirmation_id: Uuid,
    pub machine: CheckoutStateMachine,
    pub context: CheckoutContext,
}

impl Default for CheckoutSession {
    fn default() -> Self {
        Self {
            confirmation_id: Uuid::new_v4(),
            machine: CheckoutStateMachine::new(),
            context: CheckoutContext::default(),
        }
    }
}

/// In-progress checkouts keyed by user id. Sessions are created on first use.
///
/// Map guards are never held across an `.await`; callers read a snapshot or
/// mutate through [`CheckoutSessions::update`].
#[derive(Debug, Clone, Default)]
pub struct CheckoutSessions {
    inner: Arc<DashMap<Uuid, CheckoutSession>>,
}

impl CheckoutSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, user_id: Uuid) -> CheckoutSession {
        self.inner.entry(user_id).or_default().clone()
    }

    pub fn update<R>(&self, user_id: Uuid, f: impl FnOnce(&mut CheckoutSession) -> R) -> R {
        let mut session = self.inner.entry(user_id).or_default();
        f(&mut session)
    }

    /// Drops the session only if it is still the one that produced
    /// `confirmation_id`.
    pub fn release(&self, user_id: Uuid, confirmation_id: Uuid) -> bool {
        self.inner
            .remove_if(&user_id, |_, session| session.confirmation_id == confirmation_id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

pub struct CheckoutService<'a> {
    store: &'a dyn CommerceStore,
    postal: &'a dyn PostalDirectory,
    sessions: &'a CheckoutSessions,
}

impl<'a> CheckoutService<'a> {
    pub fn new(
        store: &'a dyn CommerceStore,
        postal: &'a dyn PostalDirectory,
        sessions: &'a CheckoutSessions,
    ) -> Self {
        Self {
            store,
            postal,
            sessions,
        }
    }

    pub fn from_state(state: &'a AppState) -> Self {
        Self::new(state.store.as_ref(), state.postal.as_ref(), &state.sessions)
    }

    pub async fn view(&self, user: &AuthUser) -> AppResult<ApiResponse<CheckoutView>> {
        let items = self.store.list_cart_items(user.user_id).await?;
        let view = self.sessions.update(user.user_id, |session| {
            session
                .context
                .refresh_quote(&ShippingRateResolver, PricingEngine::subtotal(&items));
            view_of(session, &items)
        });
        Ok(ApiResponse::success("OK", view, Some(Meta::empty())))
    }

    pub async fn set_address(
        &self,
        user: &AuthUser,
        address: Address,
    ) -> AppResult<ApiResponse<CheckoutView>> {
        self.sessions.update(user.user_id, |session| {
            session.machine.ensure_at(CheckoutStep::Address)?;
            session.context.address = address;
            Ok::<_, ValidationError>(())
        })?;
        self.view(user).await
    }

    /// Looks the postal code up and, when found while the address step is
    /// active, overwrites street, neighborhood, city and state with it.
    pub async fn prefill_postal_code(
        &self,
        user: &AuthUser,
        raw: &str,
    ) -> AppResult<ApiResponse<PostalLookupView>> {
        let postal_code = PostalCode::parse(raw).ok_or(ValidationError::InvalidPostalCode)?;
        let hint = self.postal.lookup(&postal_code).await?;

        let applied = match &hint {
            Some(hint) => self.sessions.update(user.user_id, |session| {
                if session.machine.ensure_at(CheckoutStep::Address).is_err() {
                    return false;
                }
                let address = &mut session.context.address;
                address.postal_code = postal_code.to_string();
                address.street = hint.street.clone();
                address.neighborhood = hint.neighborhood.clone();
                address.city = hint.city.clone();
                address.state = hint.state.clone();
                true
            }),
            None => false,
        };
        tracing::debug!(user_id = %user.user_id, %postal_code, found = hint.is_some(), applied, "postal code lookup");

        Ok(ApiResponse::success(
            if hint.is_some() { "OK" } else { "Postal code not found" },
            PostalLookupView {
                postal_code: postal_code.to_string(),
                found: hint.is_some(),
                address: hint,
                applied,
            },
            Some(Meta::empty()),
        ))
    }

    pub async fn select_payment(
        &self,
        user: &AuthUser,
        payment: PaymentSelection,
    ) -> AppResult<ApiResponse<CheckoutView>> {
        self.sessions.update(user.user_id, |session| {
            session.machine.ensure_at(CheckoutStep::Payment)?;
            session.context.payment = Some(payment);
            Ok::<_, ValidationError>(())
        })?;
        self.view(user).await
    }

    /// A rejected code replaces any coupon applied before and is reported as a
    /// validation error.
    pub async fn apply_coupon(
        &self,
        user: &AuthUser,
        code: &str,
    ) -> AppResult<ApiResponse<CheckoutView>> {
        let result = CouponValidator.validate(code);
        let rejection = match &result {
            CouponResult::Applied { .. } => None,
            CouponResult::Rejected { reason, .. } => Some(ValidationError::InvalidCoupon {
                reason: reason.clone(),
            }),
        };
        self.sessions
            .update(user.user_id, |session| session.context.coupon = Some(result));

        if let Some(rejection) = rejection {
            return Err(rejection.into());
        }
        self.view(user).await
    }

    pub async fn remove_coupon(&self, user: &AuthUser) -> AppResult<ApiResponse<CheckoutView>> {
        self.sessions
            .update(user.user_id, |session| session.context.coupon = None);
        self.view(user).await
    }

    pub async fn advance(&self, user: &AuthUser) -> AppResult<ApiResponse<CheckoutView>> {
        let items = self.store.list_cart_items(user.user_id).await?;
        if items.is_empty() {
            return Err(PreconditionError::EmptyCart.into());
        }
        let subtotal = PricingEngine::subtotal(&items);

        let step = self.sessions.update(user.user_id, |session| {
            session
                .machine
                .advance(&mut session.context, &ShippingRateResolver, subtotal)
        })?;
        tracing::debug!(user_id = %user.user_id, %step, "checkout advanced");

        self.view(user).await
    }

    pub async fn go_back(
        &self,
        user: &AuthUser,
        target: CheckoutStep,
    ) -> AppResult<ApiResponse<CheckoutView>> {
        let step = self
            .sessions
            .update(user.user_id, |session| session.machine.go_back(target))?;
        tracing::debug!(user_id = %user.user_id, %step, "checkout moved back");

        self.view(user).await
    }

    /// Places the order from the review step. The session is discarded on
    /// success and kept when only the cart clear failed, so a retry reports
    /// the existing order instead of creating another.
    pub async fn confirm(&self, user: &AuthUser) -> AppResult<ApiResponse<Order>> {
        let session = self.sessions.snapshot(user.user_id);
        if session.machine.step() != CheckoutStep::Review {
            return Err(PreconditionError::NotOnReviewStep.into());
        }
        let payment = session
            .context
            .payment
            .ok_or(ValidationError::MissingPaymentSelection)?;

        let items = self.store.list_cart_items(user.user_id).await?;
        let mut context = session.context.clone();
        context.refresh_quote(&ShippingRateResolver, PricingEngine::subtotal(&items));
        let breakdown = PricingEngine.price(
            &items,
            context.quote(),
            context.coupon.as_ref(),
            Some(&payment),
        );

        let result = OrderFactory::new(self.store)
            .create_order(OrderRequest {
                order_id: session.confirmation_id,
                user,
                items: &items,
                address: &context.address,
                payment,
                coupon: context.coupon.as_ref(),
                breakdown: &breakdown,
            })
            .await;

        let order = match result {
            Ok(order) => order,
            Err(err) => {
                if let AppError::CartClearIncomplete { order_id, remaining } = &err {
                    tracing::warn!(
                        user_id = %user.user_id,
                        %order_id,
                        remaining = remaining.len(),
                        "order placed but cart not fully cleared"
                    );
                }
                return Err(err);
            }
        };

        self.sessions.release(user.user_id, session.confirmation_id);
        Ok(ApiResponse::success("Order placed", order, Some(Meta::empty())))
    }
}

fn view_of(session: &CheckoutSession, items: &[CartItem]) -> CheckoutView {
    let ctx = &session.context;
    let breakdown = PricingEngine.price(items, ctx.quote(), ctx.coupon.as_ref(), ctx.payment.as_ref());
    let installments = match ctx.payment {
        Some(PaymentSelection::CreditCard { .. }) => PricingEngine.installment_plan(&breakdown),
        _ => Vec::new(),
    };

    CheckoutView {
        step: session.machine.step(),
        step_number: session.machine.step().ordinal(),
        furthest_step: session.machine.furthest_visited(),
        transitions: session.machine.legal_transitions(ctx),
        address: ctx.address.clone(),
        payment: ctx.payment,
        coupon: ctx.coupon.clone(),
        shipping: ctx.quote().cloned(),
        breakdown,
        installments,
        item_count: items.iter().map(|item| u64::from(item.quantity)).sum(),
        confirmation_id: session.confirmation_id,
    }
}
