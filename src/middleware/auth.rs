use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::{
    dto::auth::Claims,
    error::{AppError, PreconditionError},
    state::AppState,
};

/// The shopper behind the request, as vouched for by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
}

impl AuthUser {
    pub fn from_token(token: &str, secret: &str) -> Result<Self, AppError> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|err| {
            tracing::debug!(error = %err, "rejected bearer token");
            PreconditionError::Unauthenticated
        })?;

        let user_id =
            Uuid::parse_str(&decoded.claims.sub).map_err(|_| PreconditionError::Unauthenticated)?;

        Ok(AuthUser {
            user_id,
            email: decoded.claims.email,
            name: decoded.claims.name,
        })
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(PreconditionError::Unauthenticated)?;

        AuthUser::from_token(token, &state.config.jwt_secret)
    }
}
