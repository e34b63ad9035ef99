use axum::{extract::State, routing::get, Json, Router};
use serde::Deserialize;
use tracing::debug;

use super::error::ApiError;
use super::session::AdminSession;
use super::state::ServerState;
use super::store_call::call_store;
use super::validation::QueryParams;
use crate::library::{AuditEntry, Track, TrackFilter, UserSummary};

pub const DEFAULT_AUDIT_LIMIT: usize = 100;
pub const MAX_AUDIT_LIMIT: usize = 1000;

#[derive(Deserialize, Default)]
struct AuditQuery {
    limit: Option<usize>,
}

impl AuditQuery {
    fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_AUDIT_LIMIT)
            .clamp(1, MAX_AUDIT_LIMIT)
    }
}

async fn get_users(
    session: AdminSession,
    State(state): State<ServerState>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    debug!("Admin user_id={} lists users", session.principal.id);
    let users = call_store(&state, "list_users", "Failed to get users", |store| {
        store.list_users()
    })
    .await?;
    Ok(Json(users))
}

async fn get_all_tracks(
    _session: AdminSession,
    State(state): State<ServerState>,
) -> Result<Json<Vec<Track>>, ApiError> {
    let tracks = call_store(&state, "list_all_tracks", "Failed to get tracks", |store| {
        store.list_tracks(&TrackFilter::default())
    })
    .await?;
    Ok(Json(tracks))
}

async fn get_audit_log(
    _session: AdminSession,
    State(state): State<ServerState>,
    QueryParams(query): QueryParams<AuditQuery>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    let limit = query.limit();
    let entries = call_store(&state, "audit_log", "Failed to get audit log", move |store| {
        store.audit_log(limit)
    })
    .await?;
    Ok(Json(entries))
}

pub fn make_admin_routes(state: ServerState) -> Router {
    Router::new()
        .route("/admin/users", get(get_users))
        .route("/admin/tracks", get(get_all_tracks))
        .route("/admin/audit", get(get_audit_log))
        .with_state(state)
}
