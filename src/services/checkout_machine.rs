//! Ordered checkout steps with per-step validation gates.
//!
//! The machine owns only the step cursor. Everything the shopper entered lives
//! in [`CheckoutContext`], which is never cleared by moving backwards.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    error::ValidationError,
    models::{Address, PaymentSelection, PostalCode},
    services::{
        coupon::CouponResult,
        shipping::{ShippingQuote, ShippingRateResolver},
    },
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckoutStep {
    Address,
    Payment,
    Review,
}

impl CheckoutStep {
    pub const ALL: [CheckoutStep; 3] = [
        CheckoutStep::Address,
        CheckoutStep::Payment,
        CheckoutStep::Review,
    ];

    pub fn ordinal(self) -> u8 {
        match self {
            CheckoutStep::Address => 1,
            CheckoutStep::Payment => 2,
            CheckoutStep::Review => 3,
        }
    }

    pub fn next(self) -> Option<CheckoutStep> {
        match self {
            CheckoutStep::Address => Some(CheckoutStep::Payment),
            CheckoutStep::Payment => Some(CheckoutStep::Review),
            CheckoutStep::Review => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error(transparent)]
    Blocked(#[from] ValidationError),

    #[error("Cannot move checkout from {from} to {to}")]
    NotPermitted { from: CheckoutStep, to: CheckoutStep },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QuotedShipping {
    postal_code: PostalCode,
    subtotal: Decimal,
    quote: ShippingQuote,
}

/// Data entered during checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutContext {
    pub address: Address,
    pub payment: Option<PaymentSelection>,
    pub coupon: Option<CouponResult>,
    shipping: Option<QuotedShipping>,
}

impl CheckoutContext {
    pub fn quote(&self) -> Option<&ShippingQuote> {
        self.shipping.as_ref().map(|s| &s.quote)
    }

    fn attach_quote(
        &mut self,
        resolver: &ShippingRateResolver,
        postal_code: PostalCode,
        subtotal: Decimal,
    ) {
        let quote = resolver.resolve(&postal_code, subtotal);
        self.shipping = Some(QuotedShipping {
            postal_code,
            subtotal,
            quote,
        });
    }

    /// Re-resolves the attached quote when the subtotal moved since it was
    /// computed. Does nothing before the address step has been passed.
    pub fn refresh_quote(&mut self, resolver: &ShippingRateResolver, subtotal: Decimal) {
        let stale = match &self.shipping {
            Some(quoted) if quoted.subtotal != subtotal => Some(quoted.postal_code.clone()),
            _ => None,
        };
        if let Some(postal_code) = stale {
            self.attach_quote(resolver, postal_code, subtotal);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutStateMachine {
    step: CheckoutStep,
    furthest: CheckoutStep,
}

impl Default for CheckoutStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckoutStateMachine {
    pub fn new() -> Self {
        Self {
            step: CheckoutStep::Address,
            furthest: CheckoutStep::Address,
        }
    }

    pub fn step(&self) -> CheckoutStep {
        self.step
    }

    pub fn furthest_visited(&self) -> CheckoutStep {
        self.furthest
    }

    /// Errors unless the cursor sits on `step`; used to keep each step's data
    /// editable only while that step is active.
    pub fn ensure_at(&self, step: CheckoutStep) -> Result<(), ValidationError> {
        if self.step == step {
            Ok(())
        } else {
            Err(ValidationError::StepLocked { step })
        }
    }

    /// Validation that must pass to leave the current step forwards.
    pub fn forward_gate(&self, ctx: &CheckoutContext) -> Result<(), ValidationError> {
        match self.step {
            CheckoutStep::Address => ctx.address.validate().map(|_| ()),
            CheckoutStep::Payment => ctx
                .payment
                .map(|_| ())
                .ok_or(ValidationError::MissingPaymentSelection),
            CheckoutStep::Review => Ok(()),
        }
    }

    /// Steps reachable from here with the data currently entered.
    pub fn legal_transitions(&self, ctx: &CheckoutContext) -> Vec<CheckoutStep> {
        let mut steps: Vec<_> = CheckoutStep::ALL
            .into_iter()
            .filter(|s| *s < self.step)
            .collect();
        if let Some(next) = self.step.next() {
            if self.forward_gate(ctx).is_ok() {
                steps.push(next);
            }
        }
        steps
    }

    /// Moves one step forward. Leaving the address step attaches a shipping
    /// quote for `subtotal` to the context.
    pub fn advance(
        &mut self,
        ctx: &mut CheckoutContext,
        resolver: &ShippingRateResolver,
        subtotal: Decimal,
    ) -> Result<CheckoutStep, TransitionError> {
        let next = self.step.next().ok_or(TransitionError::NotPermitted {
            from: self.step,
            to: self.step,
        })?;

        if self.step == CheckoutStep::Address {
            let postal_code = ctx.address.validate()?;
            ctx.attach_quote(resolver, postal_code, subtotal);
        } else {
            self.forward_gate(ctx)?;
        }

        self.step = next;
        self.furthest = self.furthest.max(next);
        Ok(next)
    }

    pub fn go_back(&mut self, target: CheckoutStep) -> Result<CheckoutStep, TransitionError> {
        if target >= self.step || target > self.furthest {
            return Err(TransitionError::NotPermitted {
                from: self.step,
                to: target,
            });
        }
        self.step = target;
        Ok(target)
    }
}
