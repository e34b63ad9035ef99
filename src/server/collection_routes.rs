use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::ownership::{Operation, OwnershipGuard};
use super::session::Session;
use super::state::ServerState;
use super::store_call::call_store;
use super::validation::{validate_entity_name, JsonBody};
use crate::library::{Collection, ResourceKind, Track};

#[derive(Deserialize)]
struct CreateCollectionBody {
    name: Option<String>,
    #[serde(default)]
    is_favorite: bool,
}

#[derive(Deserialize)]
struct UpdateCollectionBody {
    name: Option<String>,
    is_favorite: Option<bool>,
}

#[derive(Deserialize)]
struct AddCollectionTrackBody {
    track_id: Option<i64>,
}

fn validate_collection_name(name: Option<&str>) -> Result<String, ApiError> {
    validate_entity_name(
        name,
        "Collection name is required",
        "Collection name must not exceed 100 characters",
    )
}

fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

async fn get_collections(
    session: Session,
    State(state): State<ServerState>,
) -> Result<Json<Vec<Collection>>, ApiError> {
    let owner = session.principal.id;
    let collections = call_store(
        &state,
        "list_collections",
        "Failed to get collections",
        move |store| store.list_collections(owner),
    )
    .await?;
    Ok(Json(collections))
}

async fn create_collection(
    session: Session,
    State(state): State<ServerState>,
    JsonBody(body): JsonBody<CreateCollectionBody>,
) -> Result<Response, ApiError> {
    let name = validate_collection_name(body.name.as_deref())?;
    let owner = session.principal.id;
    let is_favorite = body.is_favorite;

    let collection = call_store(
        &state,
        "create_collection",
        "Failed to create collection",
        move |store| store.create_collection(owner, &name, is_favorite),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(collection)).into_response())
}

async fn update_collection(
    session: Session,
    State(state): State<ServerState>,
    Path(collection_id): Path<i64>,
    JsonBody(body): JsonBody<UpdateCollectionBody>,
) -> Result<Json<Value>, ApiError> {
    let name = validate_collection_name(body.name.as_deref())?;
    let is_favorite = body.is_favorite;
    let scope = OwnershipGuard::new(&state)
        .assert_ownership(
            &session.principal,
            ResourceKind::Collection,
            Operation::Update,
            collection_id,
        )
        .await?;

    let updated = call_store(
        &state,
        "update_collection",
        "Failed to update collection",
        move |store| store.update_collection(scope, collection_id, &name, is_favorite),
    )
    .await?;

    if !updated {
        return Err(ApiError::Rejected("Failed to update collection"));
    }
    Ok(message("Collection updated"))
}

async fn delete_collection(
    session: Session,
    State(state): State<ServerState>,
    Path(collection_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let scope = OwnershipGuard::new(&state)
        .assert_ownership(
            &session.principal,
            ResourceKind::Collection,
            Operation::Delete,
            collection_id,
        )
        .await?;

    let deleted = call_store(
        &state,
        "delete_collection",
        "Failed to delete collection",
        move |store| store.delete_collection(scope, collection_id),
    )
    .await?;

    if !deleted {
        return Err(ApiError::Rejected("Failed to delete collection"));
    }
    Ok(message("Collection deleted"))
}

async fn get_collection_tracks(
    session: Session,
    State(state): State<ServerState>,
    Path(collection_id): Path<i64>,
) -> Result<Json<Vec<Track>>, ApiError> {
    OwnershipGuard::new(&state)
        .assert_ownership(
            &session.principal,
            ResourceKind::Collection,
            Operation::Read,
            collection_id,
        )
        .await?;

    let tracks = call_store(
        &state,
        "collection_tracks",
        "Failed to get collection tracks",
        move |store| store.collection_tracks(collection_id),
    )
    .await?;
    Ok(Json(tracks))
}

async fn add_collection_track(
    session: Session,
    State(state): State<ServerState>,
    Path(collection_id): Path<i64>,
    JsonBody(body): JsonBody<AddCollectionTrackBody>,
) -> Result<Json<Value>, ApiError> {
    let track_id = body
        .track_id
        .ok_or_else(|| ApiError::InvalidInput("Track ID is required".to_string()))?;

    let (collection_scope, track_scope) = OwnershipGuard::new(&state)
        .assert_membership_change(
            &session.principal,
            Operation::AddMember,
            collection_id,
            track_id,
        )
        .await?;

    let added = call_store(
        &state,
        "add_collection_track",
        "Failed to add track to collection",
        move |store| {
            store.add_collection_track(collection_scope, collection_id, track_scope, track_id)
        },
    )
    .await?;

    if !added {
        return Err(ApiError::Rejected("Failed to add track to collection"));
    }
    Ok(message("Track added to collection"))
}

async fn remove_collection_track(
    session: Session,
    State(state): State<ServerState>,
    Path((collection_id, track_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, ApiError> {
    let (collection_scope, _) = OwnershipGuard::new(&state)
        .assert_membership_change(
            &session.principal,
            Operation::RemoveMember,
            collection_id,
            track_id,
        )
        .await?;

    let removed = call_store(
        &state,
        "remove_collection_track",
        "Failed to remove track from collection",
        move |store| store.remove_collection_track(collection_scope, collection_id, track_id),
    )
    .await?;

    if !removed {
        return Err(ApiError::Rejected("Failed to remove track from collection"));
    }
    Ok(message("Track removed from collection"))
}

pub fn make_collection_routes(state: ServerState) -> Router {
    Router::new()
        .route("/collections", get(get_collections).post(create_collection))
        .route(
            "/collections/{id}",
            put(update_collection).delete(delete_collection),
        )
        .route(
            "/collections/{id}/tracks",
            get(get_collection_tracks).post(add_collection_track),
        )
        .route(
            "/collections/{id}/tracks/{track_id}",
            delete(remove_collection_track),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{LibraryStore, Role};
    use crate::server::test_store::{principal, CountingStore};
    use crate::server::token::TokenCodec;
    use crate::server::ServerConfig;
    use axum::{body::Body, http::Request};
    use std::sync::Arc;
    use tower::ServiceExt;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn app(store: Arc<CountingStore>) -> Router {
        let store: Arc<dyn LibraryStore> = store;
        make_collection_routes(ServerState::new(
            ServerConfig::default(),
            store,
            TokenCodec::new(SECRET),
        ))
    }

    fn add_track_request(user_id: i64, collection_id: i64, track_id: i64) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/collections/{}/tracks", collection_id))
            .header(
                "Authorization",
                format!("Bearer {}", TokenCodec::new(SECRET).issue(user_id).unwrap()),
            )
            .header("Content-Type", "application/json")
            .body(Body::from(format!(r#"{{"track_id": {}}}"#, track_id)))
            .unwrap()
    }

    #[tokio::test]
    async fn own_collection_and_track() {
        let store = Arc::new(
            CountingStore::new()
                .with_principal(principal(1, "alice1", Role::Standard))
                .with_resource(ResourceKind::Collection, 5, 1)
                .with_resource(ResourceKind::Track, 7, 1),
        );
        let response = app(store.clone())
            .oneshot(add_track_request(1, 5, 7))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        // Principal, collection owner, track owner, mutation.
        assert_eq!(store.calls(), 4);
    }

    #[tokio::test]
    async fn foreign_track_is_forbidden_without_mutation() {
        let store = Arc::new(
            CountingStore::new()
                .with_principal(principal(1, "alice1", Role::Standard))
                .with_resource(ResourceKind::Collection, 5, 1)
                .with_resource(ResourceKind::Track, 7, 2),
        );
        let response = app(store.clone())
            .oneshot(add_track_request(1, 5, 7))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(store.calls(), 3);
    }

    #[tokio::test]
    async fn admin_may_add_foreign_track_to_own_collection() {
        let store = Arc::new(
            CountingStore::new()
                .with_principal(principal(3, "root", Role::Admin))
                .with_resource(ResourceKind::Collection, 5, 3)
                .with_resource(ResourceKind::Track, 7, 1),
        );
        let response = app(store.clone())
            .oneshot(add_track_request(3, 5, 7))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_track_id_is_invalid_input() {
        let store = Arc::new(
            CountingStore::new().with_principal(principal(1, "alice1", Role::Standard)),
        );
        let request = Request::builder()
            .method("POST")
            .uri("/collections/5/tracks")
            .header(
                "Authorization",
                format!("Bearer {}", TokenCodec::new(SECRET).issue(1).unwrap()),
            )
            .header("Content-Type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = app(store.clone()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.calls(), 1);
    }
}
