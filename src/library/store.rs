use super::models::*;

/// Which uniqueness rule a write ran into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictKind {
    Login,
    Email,
    ArtistName,
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("uniqueness conflict: {0:?}")]
    Conflict(ConflictKind),

    #[error("data layer call timed out")]
    Timeout,

    #[error(transparent)]
    Failure(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref code, _) = err {
            if code.code == rusqlite::ErrorCode::ConstraintViolation
                && code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            {
                return StoreError::Conflict(ConflictKind::Other);
            }
        }
        StoreError::Failure(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The stored operations the web layer delegates to.
///
/// Every method is atomic: it either fully applies or leaves the store as it
/// was. Methods taking an [`OwnerScope`] re-check ownership inside their own
/// transaction and report `Ok(false)` when no row matched.
pub trait LibraryStore: Send + Sync {
    /// Returns Ok(None) if the login is unknown or the password is wrong.
    fn authenticate(&self, login: &str, password: &str) -> StoreResult<Option<Principal>>;

    /// Creates a principal with the standard role.
    /// Returns Err(Conflict(Login|Email)) if either is already taken.
    fn register(&self, new_principal: &NewPrincipal) -> StoreResult<Principal>;

    /// Returns Ok(None) if no principal has this id.
    fn get_principal(&self, id: PrincipalId) -> StoreResult<Option<Principal>>;

    fn get_profile(&self, id: PrincipalId) -> StoreResult<Option<Profile>>;

    /// Returns Err(Conflict(Email)) if the new email belongs to someone else.
    fn update_profile(&self, id: PrincipalId, update: &ProfileUpdate) -> StoreResult<bool>;

    fn list_genres(&self) -> StoreResult<Vec<Genre>>;

    /// Point query for the ownership check. Ok(None) if the resource doesn't exist.
    fn owner_of(&self, kind: ResourceKind, id: i64) -> StoreResult<Option<PrincipalId>>;

    fn list_artists(&self, owner: PrincipalId) -> StoreResult<Vec<Artist>>;

    /// Returns Err(Conflict(ArtistName)) if the owner already has an artist with this name.
    fn add_artist(&self, owner: PrincipalId, name: &str) -> StoreResult<Artist>;

    fn update_artist(&self, scope: OwnerScope, artist_id: i64, name: &str) -> StoreResult<bool>;

    /// Also removes the artist's tracks and their collection memberships.
    fn delete_artist(&self, scope: OwnerScope, artist_id: i64) -> StoreResult<bool>;

    fn artist_tracks_count(&self, artist_id: i64) -> StoreResult<i64>;

    fn list_tracks(&self, filter: &TrackFilter) -> StoreResult<Vec<Track>>;

    /// Returns Ok(None) if the artist isn't the owner's or the genre is unknown.
    fn add_track(&self, owner: PrincipalId, track: &TrackInput) -> StoreResult<Option<Track>>;

    /// The artist must belong to whoever owns the track.
    fn update_track(&self, scope: OwnerScope, track_id: i64, track: &TrackInput)
        -> StoreResult<bool>;

    fn delete_track(&self, scope: OwnerScope, track_id: i64) -> StoreResult<bool>;

    fn list_collections(&self, owner: PrincipalId) -> StoreResult<Vec<Collection>>;

    fn create_collection(
        &self,
        owner: PrincipalId,
        name: &str,
        is_favorite: bool,
    ) -> StoreResult<Collection>;

    /// `is_favorite == None` keeps the current flag.
    fn update_collection(
        &self,
        scope: OwnerScope,
        collection_id: i64,
        name: &str,
        is_favorite: Option<bool>,
    ) -> StoreResult<bool>;

    fn delete_collection(&self, scope: OwnerScope, collection_id: i64) -> StoreResult<bool>;

    /// Returns Ok(false) if either side fails its scope or the track is already a member.
    fn add_collection_track(
        &self,
        collection_scope: OwnerScope,
        collection_id: i64,
        track_scope: OwnerScope,
        track_id: i64,
    ) -> StoreResult<bool>;

    /// Returns Ok(false) if the collection fails its scope or the track isn't a member.
    fn remove_collection_track(
        &self,
        collection_scope: OwnerScope,
        collection_id: i64,
        track_id: i64,
    ) -> StoreResult<bool>;

    fn collection_tracks(&self, collection_id: i64) -> StoreResult<Vec<Track>>;

    fn list_users(&self) -> StoreResult<Vec<UserSummary>>;

    /// Newest first.
    fn audit_log(&self, limit: usize) -> StoreResult<Vec<AuditEntry>>;

    /// Returns Ok(false) if the principal doesn't exist.
    fn set_role(&self, id: PrincipalId, role: Role) -> StoreResult<bool>;
}
