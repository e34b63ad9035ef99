//! Genres, artists, tracks and track search.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::error::ApiError;
use super::ownership::{Operation, OwnershipGuard};
use super::session::Session;
use super::state::ServerState;
use super::store_call::call_store;
use super::validation::{
    check_max_len, require_text, validate_entity_name, validate_optional_range, JsonBody,
    QueryParams, BPM_RANGE, DURATION_SEC_RANGE, TRACK_TITLE_MAX_LEN,
};
use crate::library::{Artist, Genre, Principal, ResourceKind, Track, TrackFilter, TrackInput};

#[derive(Deserialize)]
struct ArtistBody {
    name: Option<String>,
}

impl ArtistBody {
    fn validate(self) -> Result<String, ApiError> {
        validate_entity_name(
            self.name.as_deref(),
            "Artist name is required",
            "Artist name must not exceed 100 characters",
        )
    }
}

#[derive(Deserialize)]
struct TrackBody {
    title: Option<String>,
    artist_id: Option<i64>,
    genre_id: Option<i64>,
    bpm: Option<i64>,
    duration_sec: Option<i64>,
}

impl TrackBody {
    fn validate(self) -> Result<TrackInput, ApiError> {
        const MISSING: &str = "Title, artist and genre are required";
        let title = require_text(self.title.as_deref(), MISSING)?;
        let (artist_id, genre_id) = match (self.artist_id, self.genre_id) {
            (Some(artist_id), Some(genre_id)) => (artist_id, genre_id),
            _ => return Err(ApiError::InvalidInput(MISSING.to_string())),
        };
        check_max_len(
            &title,
            TRACK_TITLE_MAX_LEN,
            "Track title must not exceed 200 characters",
        )?;
        validate_optional_range(self.bpm, BPM_RANGE, "BPM must be between 1 and 999")?;
        validate_optional_range(
            self.duration_sec,
            DURATION_SEC_RANGE,
            "Duration must be between 1 and 86400 seconds",
        )?;
        Ok(TrackInput {
            title,
            artist_id,
            genre_id,
            bpm: self.bpm,
            duration_sec: self.duration_sec,
        })
    }
}

#[derive(Deserialize, Default)]
struct TrackQuery {
    title: Option<String>,
    artist: Option<String>,
    genre_id: Option<i64>,
    bpm: Option<i64>,
    duration: Option<i64>,
}

impl TrackQuery {
    /// Admins see every principal's tracks, everyone else only their own.
    fn into_filter(self, principal: &Principal) -> TrackFilter {
        let non_blank = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        TrackFilter {
            owner: if principal.is_admin() {
                None
            } else {
                Some(principal.id)
            },
            title: non_blank(self.title),
            artist: non_blank(self.artist),
            genre_id: self.genre_id,
            bpm: self.bpm,
            duration_sec: self.duration,
        }
    }
}

fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

async fn get_genres(
    _session: Session,
    State(state): State<ServerState>,
) -> Result<Json<Vec<Genre>>, ApiError> {
    let genres = call_store(&state, "list_genres", "Failed to get genres", |store| {
        store.list_genres()
    })
    .await?;
    Ok(Json(genres))
}

async fn get_artists(
    session: Session,
    State(state): State<ServerState>,
) -> Result<Json<Vec<Artist>>, ApiError> {
    let owner = session.principal.id;
    let artists = call_store(&state, "list_artists", "Failed to get artists", move |store| {
        store.list_artists(owner)
    })
    .await?;
    Ok(Json(artists))
}

async fn add_artist(
    session: Session,
    State(state): State<ServerState>,
    JsonBody(body): JsonBody<ArtistBody>,
) -> Result<Response, ApiError> {
    let name = body.validate()?;
    let owner = session.principal.id;

    let artist = call_store(&state, "add_artist", "Failed to add artist", move |store| {
        store.add_artist(owner, &name)
    })
    .await?;

    debug!("user_id={} added artist {}", owner, artist.artist_id);
    Ok((StatusCode::CREATED, Json(artist)).into_response())
}

async fn update_artist(
    session: Session,
    State(state): State<ServerState>,
    Path(artist_id): Path<i64>,
    JsonBody(body): JsonBody<ArtistBody>,
) -> Result<Json<Value>, ApiError> {
    let name = body.validate()?;
    let scope = OwnershipGuard::new(&state)
        .assert_ownership(
            &session.principal,
            ResourceKind::Artist,
            Operation::Update,
            artist_id,
        )
        .await?;

    let updated = call_store(
        &state,
        "update_artist",
        "Failed to update artist",
        move |store| store.update_artist(scope, artist_id, &name),
    )
    .await?;

    if !updated {
        return Err(ApiError::Rejected("Failed to update artist"));
    }
    Ok(message("Artist updated"))
}

async fn delete_artist(
    session: Session,
    State(state): State<ServerState>,
    Path(artist_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let scope = OwnershipGuard::new(&state)
        .assert_ownership(
            &session.principal,
            ResourceKind::Artist,
            Operation::Delete,
            artist_id,
        )
        .await?;

    let deleted = call_store(
        &state,
        "delete_artist",
        "Failed to delete artist",
        move |store| store.delete_artist(scope, artist_id),
    )
    .await?;

    if !deleted {
        return Err(ApiError::Rejected("Failed to delete artist"));
    }
    Ok(message("Artist and all of its tracks deleted"))
}

async fn get_artist_tracks_count(
    session: Session,
    State(state): State<ServerState>,
    Path(artist_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    OwnershipGuard::new(&state)
        .assert_ownership(
            &session.principal,
            ResourceKind::Artist,
            Operation::Read,
            artist_id,
        )
        .await?;

    let tracks_count = call_store(
        &state,
        "artist_tracks_count",
        "Failed to count tracks",
        move |store| store.artist_tracks_count(artist_id),
    )
    .await?;

    Ok(Json(json!({ "tracks_count": tracks_count })))
}

async fn list_filtered_tracks(
    state: &ServerState,
    principal: &Principal,
    query: TrackQuery,
    operation: &'static str,
    user_message: &'static str,
) -> Result<Json<Vec<Track>>, ApiError> {
    let filter = query.into_filter(principal);
    let tracks = call_store(state, operation, user_message, move |store| {
        store.list_tracks(&filter)
    })
    .await?;
    Ok(Json(tracks))
}

async fn get_tracks(
    session: Session,
    State(state): State<ServerState>,
    QueryParams(query): QueryParams<TrackQuery>,
) -> Result<Json<Vec<Track>>, ApiError> {
    list_filtered_tracks(
        &state,
        &session.principal,
        query,
        "list_tracks",
        "Failed to get tracks",
    )
    .await
}

async fn search_tracks(
    session: Session,
    State(state): State<ServerState>,
    QueryParams(query): QueryParams<TrackQuery>,
) -> Result<Json<Vec<Track>>, ApiError> {
    list_filtered_tracks(
        &state,
        &session.principal,
        query,
        "search_tracks",
        "Search failed",
    )
    .await
}

async fn add_track(
    session: Session,
    State(state): State<ServerState>,
    JsonBody(body): JsonBody<TrackBody>,
) -> Result<Response, ApiError> {
    let input = body.validate()?;
    let owner = session.principal.id;

    let track = call_store(&state, "add_track", "Failed to add track", move |store| {
        store.add_track(owner, &input)
    })
    .await?;

    match track {
        Some(track) => Ok((StatusCode::CREATED, Json(track)).into_response()),
        None => Err(ApiError::Rejected(
            "Failed to add track. Make sure the selected artist belongs to you.",
        )),
    }
}

async fn update_track(
    session: Session,
    State(state): State<ServerState>,
    Path(track_id): Path<i64>,
    JsonBody(body): JsonBody<TrackBody>,
) -> Result<Json<Value>, ApiError> {
    let input = body.validate()?;
    let scope = OwnershipGuard::new(&state)
        .assert_ownership(
            &session.principal,
            ResourceKind::Track,
            Operation::Update,
            track_id,
        )
        .await?;

    let updated = call_store(
        &state,
        "update_track",
        "Failed to update track",
        move |store| store.update_track(scope, track_id, &input),
    )
    .await?;

    if !updated {
        return Err(ApiError::Rejected("Failed to update track"));
    }
    Ok(message("Track updated"))
}

async fn delete_track(
    session: Session,
    State(state): State<ServerState>,
    Path(track_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let scope = OwnershipGuard::new(&state)
        .assert_ownership(
            &session.principal,
            ResourceKind::Track,
            Operation::Delete,
            track_id,
        )
        .await?;

    let deleted = call_store(
        &state,
        "delete_track",
        "Failed to delete track",
        move |store| store.delete_track(scope, track_id),
    )
    .await?;

    if !deleted {
        return Err(ApiError::Rejected("Failed to delete track"));
    }
    Ok(message("Track deleted"))
}

pub fn make_library_routes(state: ServerState) -> Router {
    Router::new()
        .route("/genres", get(get_genres))
        .route("/artists", get(get_artists).post(add_artist))
        .route("/artists/{id}", put(update_artist).delete(delete_artist))
        .route("/artists/{id}/tracks-count", get(get_artist_tracks_count))
        .route("/tracks", get(get_tracks).post(add_track))
        .route("/tracks/{id}", put(update_track).delete(delete_track))
        .route("/search/tracks", get(search_tracks))
        .with_state(state)
}
