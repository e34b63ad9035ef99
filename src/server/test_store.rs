//! In-memory `LibraryStore` for router and guard tests. Counts every call so
//! tests can assert that a request never reached the data layer.

use crate::library::*;
use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct CountingStore {
    principals: Vec<Principal>,
    owners: HashMap<(ResourceKind, i64), PrincipalId>,
    calls: AtomicUsize,
    failing: bool,
}

pub fn principal(id: PrincipalId, login: &str, role: Role) -> Principal {
    Principal {
        id,
        login: login.to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        email: format!("{}@example.com", login),
        avatar_url: None,
        role,
    }
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principals.push(principal);
        self
    }

    pub fn with_resource(mut self, kind: ResourceKind, id: i64, owner: PrincipalId) -> Self {
        self.owners.insert((kind, id), owner);
        self
    }

    /// Every call fails with a data-layer error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(StoreError::Failure(anyhow!("connection refused")));
        }
        Ok(())
    }

    fn in_scope(&self, kind: ResourceKind, id: i64, scope: OwnerScope) -> bool {
        match (self.owners.get(&(kind, id)), scope.required_owner()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(owner), Some(required)) => *owner == required,
        }
    }
}

impl LibraryStore for CountingStore {
    fn authenticate(&self, login: &str, _password: &str) -> StoreResult<Option<Principal>> {
        self.hit()?;
        Ok(self.principals.iter().find(|p| p.login == login).cloned())
    }

    fn register(&self, new_principal: &NewPrincipal) -> StoreResult<Principal> {
        self.hit()?;
        if self.principals.iter().any(|p| p.login == new_principal.login) {
            return Err(StoreError::Conflict(ConflictKind::Login));
        }
        Ok(principal(100, &new_principal.login, Role::Standard))
    }

    fn get_principal(&self, id: PrincipalId) -> StoreResult<Option<Principal>> {
        self.hit()?;
        Ok(self.principals.iter().find(|p| p.id == id).cloned())
    }

    fn get_profile(&self, _id: PrincipalId) -> StoreResult<Option<Profile>> {
        self.hit()?;
        Ok(None)
    }

    fn update_profile(&self, _id: PrincipalId, _update: &ProfileUpdate) -> StoreResult<bool> {
        self.hit()?;
        Ok(true)
    }

    fn list_genres(&self) -> StoreResult<Vec<Genre>> {
        self.hit()?;
        Ok(vec![])
    }

    fn owner_of(&self, kind: ResourceKind, id: i64) -> StoreResult<Option<PrincipalId>> {
        self.hit()?;
        Ok(self.owners.get(&(kind, id)).copied())
    }

    fn list_artists(&self, _owner: PrincipalId) -> StoreResult<Vec<Artist>> {
        self.hit()?;
        Ok(vec![])
    }

    fn add_artist(&self, owner: PrincipalId, name: &str) -> StoreResult<Artist> {
        self.hit()?;
        Ok(Artist {
            artist_id: 1,
            name: name.to_string(),
            owner_id: owner,
            tracks_count: 0,
        })
    }

    fn update_artist(&self, scope: OwnerScope, artist_id: i64, _name: &str) -> StoreResult<bool> {
        self.hit()?;
        Ok(self.in_scope(ResourceKind::Artist, artist_id, scope))
    }

    fn delete_artist(&self, scope: OwnerScope, artist_id: i64) -> StoreResult<bool> {
        self.hit()?;
        Ok(self.in_scope(ResourceKind::Artist, artist_id, scope))
    }

    fn artist_tracks_count(&self, _artist_id: i64) -> StoreResult<i64> {
        self.hit()?;
        Ok(0)
    }

    fn list_tracks(&self, _filter: &TrackFilter) -> StoreResult<Vec<Track>> {
        self.hit()?;
        Ok(vec![])
    }

    fn add_track(&self, _owner: PrincipalId, _track: &TrackInput) -> StoreResult<Option<Track>> {
        self.hit()?;
        Ok(None)
    }

    fn update_track(
        &self,
        scope: OwnerScope,
        track_id: i64,
        _track: &TrackInput,
    ) -> StoreResult<bool> {
        self.hit()?;
        Ok(self.in_scope(ResourceKind::Track, track_id, scope))
    }

    fn delete_track(&self, scope: OwnerScope, track_id: i64) -> StoreResult<bool> {
        self.hit()?;
        Ok(self.in_scope(ResourceKind::Track, track_id, scope))
    }

    fn list_collections(&self, _owner: PrincipalId) -> StoreResult<Vec<Collection>> {
        self.hit()?;
        Ok(vec![])
    }

    fn create_collection(
        &self,
        owner: PrincipalId,
        name: &str,
        is_favorite: bool,
    ) -> StoreResult<Collection> {
        self.hit()?;
        Ok(Collection {
            collection_id: 1,
            name: name.to_string(),
            is_favorite,
            owner_id: owner,
            tracks_count: 0,
        })
    }

    fn update_collection(
        &self,
        scope: OwnerScope,
        collection_id: i64,
        _name: &str,
        _is_favorite: Option<bool>,
    ) -> StoreResult<bool> {
        self.hit()?;
        Ok(self.in_scope(ResourceKind::Collection, collection_id, scope))
    }

    fn delete_collection(&self, scope: OwnerScope, collection_id: i64) -> StoreResult<bool> {
        self.hit()?;
        Ok(self.in_scope(ResourceKind::Collection, collection_id, scope))
    }

    fn add_collection_track(
        &self,
        collection_scope: OwnerScope,
        collection_id: i64,
        track_scope: OwnerScope,
        track_id: i64,
    ) -> StoreResult<bool> {
        self.hit()?;
        Ok(self.in_scope(ResourceKind::Collection, collection_id, collection_scope)
            && self.in_scope(ResourceKind::Track, track_id, track_scope))
    }

    fn remove_collection_track(
        &self,
        collection_scope: OwnerScope,
        collection_id: i64,
        _track_id: i64,
    ) -> StoreResult<bool> {
        self.hit()?;
        Ok(self.in_scope(ResourceKind::Collection, collection_id, collection_scope))
    }

    fn collection_tracks(&self, _collection_id: i64) -> StoreResult<Vec<Track>> {
        self.hit()?;
        Ok(vec![])
    }

    fn list_users(&self) -> StoreResult<Vec<UserSummary>> {
        self.hit()?;
        Ok(vec![])
    }

    fn audit_log(&self, _limit: usize) -> StoreResult<Vec<AuditEntry>> {
        self.hit()?;
        Ok(vec![])
    }

    fn set_role(&self, _id: PrincipalId, _role: Role) -> StoreResult<bool> {
        self.hit()?;
        Ok(false)
    }
}
