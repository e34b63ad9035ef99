use axum::{extract::State, routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::{ApiError, AuthFailure};
use super::session::Session;
use super::state::ServerState;
use super::store_call::call_store;
use super::validation::{
    check_max_len, require_text, validate_email, JsonBody, AVATAR_URL_MAX_LEN,
    PERSON_NAME_MAX_LEN,
};
use crate::library::{Profile, ProfileUpdate};

#[derive(Deserialize)]
struct UpdateProfileBody {
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

impl UpdateProfileBody {
    /// Absent fields are left as they are; present ones follow the
    /// registration rules.
    fn validate(self) -> Result<ProfileUpdate, ApiError> {
        let first_name = match self.first_name {
            Some(name) => {
                let name = require_text(Some(name.as_str()), "First name must not be empty")?;
                check_max_len(
                    &name,
                    PERSON_NAME_MAX_LEN,
                    "First name must not exceed 100 characters",
                )?;
                Some(name)
            }
            None => None,
        };
        let last_name = match self.last_name {
            Some(name) => {
                let name = require_text(Some(name.as_str()), "Last name must not be empty")?;
                check_max_len(
                    &name,
                    PERSON_NAME_MAX_LEN,
                    "Last name must not exceed 100 characters",
                )?;
                Some(name)
            }
            None => None,
        };
        let email = match self.email {
            Some(email) => {
                let email = email.trim().to_string();
                validate_email(&email)?;
                Some(email)
            }
            None => None,
        };
        let avatar_url = match self.avatar_url {
            Some(url) => {
                let url = url.trim().to_string();
                check_max_len(
                    &url,
                    AVATAR_URL_MAX_LEN,
                    "Avatar URL must not exceed 500 characters",
                )?;
                Some(url)
            }
            None => None,
        };
        Ok(ProfileUpdate {
            first_name,
            last_name,
            email,
            avatar_url,
        })
    }
}

async fn get_profile(
    session: Session,
    State(state): State<ServerState>,
) -> Result<Json<Profile>, ApiError> {
    let user_id = session.principal.id;
    let profile = call_store(&state, "get_profile", "Failed to get profile", move |store| {
        store.get_profile(user_id)
    })
    .await?;

    profile
        .map(Json)
        .ok_or(ApiError::Authentication(AuthFailure::PrincipalGone))
}

async fn update_profile(
    session: Session,
    State(state): State<ServerState>,
    JsonBody(body): JsonBody<UpdateProfileBody>,
) -> Result<Json<Value>, ApiError> {
    let update = body.validate()?;
    let user_id = session.principal.id;

    let updated = call_store(
        &state,
        "update_profile",
        "Failed to update profile",
        move |store| store.update_profile(user_id, &update),
    )
    .await?;

    if !updated {
        return Err(ApiError::Rejected("Failed to update profile"));
    }
    Ok(Json(json!({ "message": "Profile updated" })))
}

pub fn make_profile_routes(state: ServerState) -> Router {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .with_state(state)
}
