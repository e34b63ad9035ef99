//! Request authentication.
//!
//! `Session` resolves the bearer token to a live principal; `AdminSession`
//! additionally requires the admin role. Both hand the resolved principal to
//! the handler, and a rejection means the handler never runs.

use super::error::{ApiError, AuthFailure};
use super::metrics;
use super::state::ServerState;
use super::store_call::call_store;
use super::token::TokenError;
use crate::library::Principal;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Session {
    pub principal: Principal,
}

#[derive(Debug, Clone)]
pub struct AdminSession {
    pub principal: Principal,
}

/// Reads the token from an `Authorization: <scheme> <token>` header.
///
/// The header must split into exactly two space-separated parts. The scheme
/// word itself is not checked.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AuthFailure> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthFailure::MissingToken)?
        .to_str()
        .map_err(|_| AuthFailure::BadTokenFormat)?;

    if value.is_empty() {
        return Err(AuthFailure::MissingToken);
    }

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        [_scheme, token] => Ok(token.to_string()),
        _ => Err(AuthFailure::BadTokenFormat),
    }
}

fn reject(failure: AuthFailure) -> ApiError {
    debug!("Rejecting request: {}", failure.reason());
    metrics::record_auth_failure(failure.reason());
    ApiError::Authentication(failure)
}

async fn resolve_principal(parts: &Parts, state: &ServerState) -> Result<Principal, ApiError> {
    let token = extract_bearer_token(&parts.headers).map_err(reject)?;

    let user_id = state.token_codec.verify(&token).map_err(|err| match err {
        TokenError::Expired => reject(AuthFailure::TokenExpired),
        TokenError::MalformedOrForged | TokenError::Signing(_) => {
            reject(AuthFailure::InvalidToken)
        }
    })?;

    let principal = call_store(
        state,
        "get_principal",
        "Failed to authenticate request",
        move |store| store.get_principal(user_id),
    )
    .await?;

    match principal {
        Some(principal) => {
            debug!("Resolved session for user_id={}", principal.id);
            Ok(principal)
        }
        None => {
            debug!("Token for user_id={} no longer resolves to a user", user_id);
            Err(reject(AuthFailure::PrincipalGone))
        }
    }
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let principal = resolve_principal(parts, state).await?;
        Ok(Session { principal })
    }
}

impl FromRequestParts<ServerState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let principal = resolve_principal(parts, state).await?;
        if !principal.is_admin() {
            debug!("user_id={} is not an admin", principal.id);
            metrics::record_auth_failure("insufficient_role");
            return Err(ApiError::InsufficientRole);
        }
        Ok(AdminSession { principal })
    }
}
