use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::library::{ConflictKind, StoreError};

use super::metrics;

/// Why a request could not be authenticated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthFailure {
    MissingToken,
    BadTokenFormat,
    TokenExpired,
    InvalidToken,
    PrincipalGone,
    /// Login with an unknown login or a wrong password. Never says which.
    InvalidCredentials,
}

impl AuthFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "token_missing",
            AuthFailure::BadTokenFormat => "bad_token_format",
            AuthFailure::TokenExpired => "token_expired",
            AuthFailure::InvalidToken => "invalid_token",
            AuthFailure::PrincipalGone => "principal_gone",
            AuthFailure::InvalidCredentials => "invalid_credentials",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "Token is missing",
            AuthFailure::BadTokenFormat => "Wrong token format",
            AuthFailure::TokenExpired => "Token has expired",
            AuthFailure::InvalidToken => "Invalid token",
            AuthFailure::PrincipalGone => "User no longer exists",
            AuthFailure::InvalidCredentials => "Invalid login or password",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("authentication failed: {}", .0.reason())]
    Authentication(AuthFailure),

    #[error("admin access required")]
    InsufficientRole,

    #[error("ownership violation: {0}")]
    OwnershipViolation(&'static str),

    #[error("conflict: {0:?}")]
    Conflict(ConflictKind),

    /// The data layer ran the operation but reported it did not apply.
    #[error("rejected: {0}")]
    Rejected(&'static str),

    /// Detail is logged where the failure is caught; only the message leaves.
    #[error("data layer failure: {0}")]
    DataLayer(&'static str),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) | ApiError::Conflict(_) | ApiError::Rejected(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::InsufficientRole | ApiError::OwnershipViolation(_) => StatusCode::FORBIDDEN,
            ApiError::DataLayer(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::Authentication(failure) => failure.reason(),
            ApiError::InsufficientRole => "insufficient_role",
            ApiError::OwnershipViolation(_) => "forbidden",
            ApiError::Conflict(ConflictKind::Login) => "conflict_login",
            ApiError::Conflict(ConflictKind::Email) => "conflict_email",
            ApiError::Conflict(ConflictKind::ArtistName) => "conflict_artist_name",
            ApiError::Conflict(ConflictKind::Other) => "conflict",
            ApiError::Rejected(_) => "rejected",
            ApiError::DataLayer(_) => "internal_error",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::InvalidInput(message) => message.clone(),
            ApiError::Authentication(failure) => failure.message().to_string(),
            ApiError::InsufficientRole => "Admin access required".to_string(),
            ApiError::OwnershipViolation(message)
            | ApiError::Rejected(message)
            | ApiError::DataLayer(message) => message.to_string(),
            ApiError::Conflict(ConflictKind::Login) => {
                "A user with this login already exists".to_string()
            }
            ApiError::Conflict(ConflictKind::Email) => {
                "A user with this email already exists".to_string()
            }
            ApiError::Conflict(ConflictKind::ArtistName) => {
                "You already have an artist with this name".to_string()
            }
            ApiError::Conflict(ConflictKind::Other) => {
                "A record with these details already exists".to_string()
            }
        }
    }

    /// Translates a data-layer error for the client. Conflicts keep their kind;
    /// everything else is logged here and replaced by `user_message`.
    pub fn from_store(operation: &'static str, user_message: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::Conflict(kind) => ApiError::Conflict(kind),
            other => {
                error!("{} failed: {:#}", operation, other);
                metrics::record_store_failure(operation);
                ApiError::DataLayer(user_message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "message": self.message(),
            "reason": self.reason(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}
