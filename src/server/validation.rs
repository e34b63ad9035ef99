//! Input rules applied by handlers before any ownership or data-layer work.

use super::error::ApiError;
use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::debug;

pub const LOGIN_MIN_LEN: usize = 3;
pub const LOGIN_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 255;
pub const PERSON_NAME_MAX_LEN: usize = 100;
pub const EMAIL_MAX_LEN: usize = 100;
pub const ENTITY_NAME_MAX_LEN: usize = 100;
pub const TRACK_TITLE_MAX_LEN: usize = 200;
pub const AVATAR_URL_MAX_LEN: usize = 500;
pub const BPM_RANGE: (i64, i64) = (1, 999);
pub const DURATION_SEC_RANGE: (i64, i64) = (1, 86_400);

lazy_static! {
    static ref LOGIN_PATTERN: Regex =
        Regex::new(r"^[a-zA-Z0-9_]+$").expect("Invalid login pattern");
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email pattern");
}

fn invalid(message: &str) -> ApiError {
    ApiError::InvalidInput(message.to_string())
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// Trims the value and fails with `missing` when nothing is left.
pub fn require_text(value: Option<&str>, missing: &str) -> Result<String, ApiError> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(invalid(missing)),
    }
}

pub fn check_max_len(value: &str, max: usize, message: &str) -> Result<(), ApiError> {
    if char_len(value) > max {
        return Err(invalid(message));
    }
    Ok(())
}

pub fn validate_login(login: Option<&str>) -> Result<String, ApiError> {
    let login = require_text(login, "Login is required")?;
    let len = char_len(&login);
    if !(LOGIN_MIN_LEN..=LOGIN_MAX_LEN).contains(&len) {
        return Err(invalid("Login must be between 3 and 50 characters"));
    }
    if !LOGIN_PATTERN.is_match(&login) {
        return Err(invalid(
            "Login may only contain letters, digits and underscores",
        ));
    }
    Ok(login)
}

pub fn validate_password(password: Option<&str>) -> Result<String, ApiError> {
    let password = require_text(password, "Password is required")?;
    let len = char_len(&password);
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(invalid("Password must be between 6 and 255 characters"));
    }
    Ok(password)
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    check_max_len(email, EMAIL_MAX_LEN, "Email must not exceed 100 characters")?;
    if !EMAIL_PATTERN.is_match(email) {
        return Err(invalid("Enter a valid email address"));
    }
    Ok(())
}

pub fn validate_entity_name(name: Option<&str>, missing: &str, too_long: &str) -> Result<String, ApiError> {
    let name = require_text(name, missing)?;
    check_max_len(&name, ENTITY_NAME_MAX_LEN, too_long)?;
    Ok(name)
}

pub fn validate_optional_range(
    value: Option<i64>,
    (min, max): (i64, i64),
    message: &str,
) -> Result<(), ApiError> {
    match value {
        Some(v) if v < min || v > max => Err(invalid(message)),
        _ => Ok(()),
    }
}

/// JSON body extractor whose rejection uses the API's error format.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                debug!("Rejected request body: {}", rejection.body_text());
                Err(invalid("Request body must be a valid JSON object"))
            }
        }
    }
}

/// Query string extractor whose rejection uses the API's error format.
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(QueryParams(value)),
            Err(rejection) => {
                debug!("Rejected query string: {}", rejection.body_text());
                Err(invalid("Invalid query parameters"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(err: ApiError) -> String {
        match err {
            ApiError::InvalidInput(message) => message,
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn login_rules() {
        assert_eq!(validate_login(Some("  alice1 ")).unwrap(), "alice1");
        assert_eq!(
            message(validate_login(None).unwrap_err()),
            "Login is required"
        );
        assert_eq!(
            message(validate_login(Some("   ")).unwrap_err()),
            "Login is required"
        );
        assert!(validate_login(Some("ab")).is_err());
        assert!(validate_login(Some("abc")).is_ok());
        assert!(validate_login(Some("a".repeat(50).as_str())).is_ok());
        assert!(validate_login(Some("a".repeat(51).as_str())).is_err());
        assert_eq!(
            message(validate_login(Some("alice-1")).unwrap_err()),
            "Login may only contain letters, digits and underscores"
        );
    }

    #[test]
    fn password_rules() {
        assert!(validate_password(Some("12345")).is_err());
        assert_eq!(validate_password(Some(" secret1 ")).unwrap(), "secret1");
        assert!(validate_password(Some("p".repeat(255).as_str())).is_ok());
        assert!(validate_password(Some("p".repeat(256).as_str())).is_err());
        assert!(validate_password(None).is_err());
    }

    #[test]
    fn email_rules() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice@example").is_err());
        assert!(validate_email("al ice@example.com").is_err());
        assert!(validate_email("@example.com").is_err());
        let long = format!("{}@example.com", "a".repeat(90));
        assert!(validate_email(&long).is_err());
    }

    #[test]
    fn names_count_characters_not_bytes() {
        let name = "é".repeat(100);
        assert!(validate_entity_name(Some(name.as_str()), "missing", "too long").is_ok());
        let name = "é".repeat(101);
        assert_eq!(
            message(validate_entity_name(Some(name.as_str()), "missing", "too long").unwrap_err()),
            "too long"
        );
    }

    #[test]
    fn optional_ranges() {
        assert!(validate_optional_range(None, BPM_RANGE, "bad").is_ok());
        assert!(validate_optional_range(Some(1), BPM_RANGE, "bad").is_ok());
        assert!(validate_optional_range(Some(999), BPM_RANGE, "bad").is_ok());
        assert!(validate_optional_range(Some(0), BPM_RANGE, "bad").is_err());
        assert!(validate_optional_range(Some(86_401), DURATION_SEC_RANGE, "bad").is_err());
    }
}
