use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::error::{ApiError, AuthFailure};
use super::metrics;
use super::state::ServerState;
use super::store_call::call_store;
use super::validation::{
    check_max_len, require_text, validate_email, validate_login, validate_password, JsonBody,
    PERSON_NAME_MAX_LEN,
};
use crate::library::{NewPrincipal, Principal};

#[derive(Deserialize)]
struct LoginBody {
    login: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct RegisterBody {
    login: Option<String>,
    password: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
}

#[derive(Serialize)]
struct AuthSuccessResponse {
    token: String,
    user: Principal,
}

impl RegisterBody {
    fn validate(self) -> Result<NewPrincipal, ApiError> {
        // Every field must be present before any format rule runs.
        let login = require_text(self.login.as_deref(), "Login is required")?;
        let password = require_text(self.password.as_deref(), "Password is required")?;
        let first_name = require_text(self.first_name.as_deref(), "First name is required")?;
        let last_name = require_text(self.last_name.as_deref(), "Last name is required")?;
        let email = require_text(self.email.as_deref(), "Email is required")?;

        let login = validate_login(Some(login.as_str()))?;
        let password = validate_password(Some(password.as_str()))?;
        check_max_len(
            &first_name,
            PERSON_NAME_MAX_LEN,
            "First name must not exceed 100 characters",
        )?;
        check_max_len(
            &last_name,
            PERSON_NAME_MAX_LEN,
            "Last name must not exceed 100 characters",
        )?;
        validate_email(&email)?;

        Ok(NewPrincipal {
            login,
            password,
            first_name,
            last_name,
            email,
        })
    }
}

fn issue_token(state: &ServerState, principal: &Principal) -> Result<String, ApiError> {
    state.token_codec.issue(principal.id).map_err(|err| {
        error!("Failed to issue token for user_id={}: {}", principal.id, err);
        ApiError::DataLayer("Authentication failed. Please try again later.")
    })
}

async fn login(
    State(state): State<ServerState>,
    JsonBody(body): JsonBody<LoginBody>,
) -> Result<Response, ApiError> {
    let login = validate_login(body.login.as_deref())?;
    let password = validate_password(body.password.as_deref())?;
    debug!("login() called for {}", login);

    let authenticated = call_store(
        &state,
        "authenticate",
        "Authentication failed. Please try again later.",
        move |store| store.authenticate(&login, &password),
    )
    .await;

    let principal = match authenticated {
        Ok(Some(principal)) => principal,
        Ok(None) => {
            metrics::record_login_attempt("invalid_credentials");
            return Err(ApiError::Authentication(AuthFailure::InvalidCredentials));
        }
        Err(err) => {
            metrics::record_login_attempt("error");
            return Err(err);
        }
    };

    let token = issue_token(&state, &principal)?;
    metrics::record_login_attempt("success");
    info!("User {} logged in", principal.login);

    Ok((
        StatusCode::OK,
        Json(AuthSuccessResponse {
            token,
            user: principal,
        }),
    )
        .into_response())
}

async fn register(
    State(state): State<ServerState>,
    JsonBody(body): JsonBody<RegisterBody>,
) -> Result<Response, ApiError> {
    let new_principal = body.validate()?;

    let principal = call_store(
        &state,
        "register",
        "Registration failed. Please try again later.",
        move |store| store.register(&new_principal),
    )
    .await?;

    let token = issue_token(&state, &principal)?;
    info!("Registered user {} (user_id={})", principal.login, principal.id);

    Ok((
        StatusCode::CREATED,
        Json(AuthSuccessResponse {
            token,
            user: principal,
        }),
    )
        .into_response())
}

pub fn make_auth_routes(state: ServerState) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .with_state(state)
}
