use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::AddressField,
    response::{ApiResponse, Meta},
    services::checkout_machine::{CheckoutStep, TransitionError},
    store::StoreError,
};

/// User-correctable input problems. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Incomplete address, missing: {}", field_list(.missing))]
    IncompleteAddress { missing: Vec<AddressField> },

    #[error("Postal code must have exactly 8 digits")]
    InvalidPostalCode,

    #[error("{reason}")]
    InvalidCoupon { reason: String },

    #[error("Select a payment method")]
    MissingPaymentSelection,

    #[error("Installments must be between 1 and {max}")]
    InvalidInstallments { max: u8 },

    #[error("Go back to the {step} step to change this")]
    StepLocked { step: CheckoutStep },

    #[error("{field} {message}")]
    InvalidField {
        field: &'static str,
        message: &'static str,
    },
}

/// The caller skipped something that had to happen first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Price breakdown does not match the cart; price it again")]
    StaleBreakdown,

    #[error("Cannot move checkout from {from} to {to}")]
    IllegalTransition { from: CheckoutStep, to: CheckoutStep },

    #[error("Checkout must be on the review step to place the order")]
    NotOnReviewStep,

    #[error("Checkout was already placed as order {order_id}")]
    AlreadyConfirmed { order_id: Uuid },
}

/// Failures of the services this crate depends on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorFailure {
    #[error("Postal code lookup timed out")]
    PostalLookupTimeout,

    #[error("Postal code lookup failed: {0}")]
    PostalLookup(String),

    #[error("Persistence timed out")]
    PersistenceTimeout,

    #[error("Persistence failure: {0}")]
    Persistence(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorFailure),

    #[error("Order {order_id} was placed but {} cart item(s) could not be removed", .remaining.len())]
    CartClearIncomplete { order_id: Uuid, remaining: Vec<Uuid> },

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let failure = match err {
            StoreError::Timeout => CollaboratorFailure::PersistenceTimeout,
            other => CollaboratorFailure::Persistence(other.to_string()),
        };
        AppError::Collaborator(failure)
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Blocked(validation) => AppError::Validation(validation),
            TransitionError::NotPermitted { from, to } => {
                AppError::Precondition(PreconditionError::IllegalTransition { from, to })
            }
        }
    }
}

fn field_list(fields: &[AddressField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing_fields: Option<Vec<AddressField>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining_cart_items: Option<Vec<Uuid>>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Precondition(PreconditionError::Unauthenticated) => StatusCode::UNAUTHORIZED,
            AppError::Precondition(_) => StatusCode::CONFLICT,
            AppError::Collaborator(
                CollaboratorFailure::PostalLookupTimeout | CollaboratorFailure::PersistenceTimeout,
            ) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Collaborator(_) => StatusCode::BAD_GATEWAY,
            AppError::CartClearIncomplete { .. } => StatusCode::CONFLICT,
            AppError::DbError(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn data(&self) -> ErrorData {
        let mut data = ErrorData {
            error: self.to_string(),
            missing_fields: None,
            order_id: None,
            remaining_cart_items: None,
        };
        match self {
            AppError::Validation(ValidationError::IncompleteAddress { missing }) => {
                data.missing_fields = Some(missing.clone());
            }
            AppError::Precondition(PreconditionError::AlreadyConfirmed { order_id }) => {
                data.order_id = Some(*order_id);
            }
            AppError::CartClearIncomplete {
                order_id,
                remaining,
            } => {
                data.order_id = Some(*order_id);
                data.remaining_cart_items = Some(remaining.clone());
            }
            _ => {}
        }
        data
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(self.data()),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
