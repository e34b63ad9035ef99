//! Per-resource ownership checks for resource-scoped requests.
//!
//! The guard looks up the current owner with a point query on every call and
//! never caches. On success it returns the [`OwnerScope`] the data-layer call
//! must run under, so the store re-checks the same rule inside its transaction.

use super::error::ApiError;
use super::metrics;
use super::state::ServerState;
use super::store_call::call_store;
use crate::library::{OwnerScope, Principal, ResourceKind};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Read,
    Update,
    Delete,
    AddMember,
    RemoveMember,
}

/// Operations on which an admin may act on resources owned by someone else.
/// Anything missing from this table requires ownership, admin or not.
pub const ADMIN_BYPASS: &[(ResourceKind, Operation)] = &[
    (ResourceKind::Track, Operation::Update),
    (ResourceKind::Track, Operation::Delete),
    (ResourceKind::Track, Operation::AddMember),
    (ResourceKind::Track, Operation::RemoveMember),
];

pub fn admin_bypass(kind: ResourceKind, operation: Operation) -> bool {
    ADMIN_BYPASS.contains(&(kind, operation))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Denial {
    NotOwner,
    NotFound,
}

impl Denial {
    pub fn as_str(&self) -> &'static str {
        match self {
            Denial::NotOwner => "not_owner",
            Denial::NotFound => "not_found",
        }
    }
}

/// Pure decision given the owner the store reported.
pub fn decide(
    principal: &Principal,
    kind: ResourceKind,
    operation: Operation,
    owner: Option<i64>,
) -> Result<OwnerScope, Denial> {
    match owner {
        None => Err(Denial::NotFound),
        Some(owner) if owner == principal.id => Ok(OwnerScope::Owner(principal.id)),
        Some(_) if principal.is_admin() && admin_bypass(kind, operation) => {
            Ok(OwnerScope::Bypass(principal.id))
        }
        Some(_) => Err(Denial::NotOwner),
    }
}

/// Message returned to the client. Not-found and not-owner share it.
fn denial_message(kind: ResourceKind, operation: Operation) -> &'static str {
    match (kind, operation) {
        (ResourceKind::Artist, Operation::Read) => "No permission to view this artist",
        (ResourceKind::Artist, Operation::Delete) => "No permission to delete this artist",
        (ResourceKind::Artist, _) => "No permission to modify this artist",
        (ResourceKind::Track, Operation::Delete) => "No permission to delete this track",
        (ResourceKind::Track, Operation::AddMember) => {
            "No permission to add this track to a collection"
        }
        (ResourceKind::Track, Operation::RemoveMember) => {
            "No permission to remove this track from a collection"
        }
        (ResourceKind::Track, _) => "No permission to modify this track",
        (ResourceKind::Collection, Operation::Read) => "No permission to view this collection",
        (ResourceKind::Collection, Operation::Delete) => {
            "No permission to delete this collection"
        }
        (ResourceKind::Collection, _) => "No permission to modify this collection",
    }
}

pub struct OwnershipGuard<'a> {
    state: &'a ServerState,
}

impl<'a> OwnershipGuard<'a> {
    pub fn new(state: &'a ServerState) -> Self {
        OwnershipGuard { state }
    }

    pub async fn check(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        operation: Operation,
        resource_id: i64,
    ) -> Result<Result<OwnerScope, Denial>, ApiError> {
        let owner = call_store(
            self.state,
            "owner_of",
            "Failed to check permissions",
            move |store| store.owner_of(kind, resource_id),
        )
        .await?;
        Ok(decide(principal, kind, operation, owner))
    }

    /// Allows the operation or fails with an ownership violation.
    pub async fn assert_ownership(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        operation: Operation,
        resource_id: i64,
    ) -> Result<OwnerScope, ApiError> {
        match self.check(principal, kind, operation, resource_id).await? {
            Ok(scope) => {
                if let OwnerScope::Bypass(_) = scope {
                    debug!(
                        "Admin user_id={} bypasses ownership of {} {} for {:?}",
                        principal.id,
                        kind.as_str(),
                        resource_id,
                        operation
                    );
                }
                Ok(scope)
            }
            Err(denial) => {
                debug!(
                    "Denied {:?} on {} {} for user_id={}: {}",
                    operation,
                    kind.as_str(),
                    resource_id,
                    principal.id,
                    denial.as_str()
                );
                metrics::record_ownership_denial(kind.as_str(), denial.as_str());
                Err(ApiError::OwnershipViolation(denial_message(kind, operation)))
            }
        }
    }

    /// Checks the collection first and the track second; the first denial
    /// stops the check. Returns the scopes for the collection and the track.
    pub async fn assert_membership_change(
        &self,
        principal: &Principal,
        operation: Operation,
        collection_id: i64,
        track_id: i64,
    ) -> Result<(OwnerScope, OwnerScope), ApiError> {
        let collection_scope = self
            .assert_ownership(principal, ResourceKind::Collection, operation, collection_id)
            .await?;
        let track_scope = self
            .assert_ownership(principal, ResourceKind::Track, operation, track_id)
            .await?;
        Ok((collection_scope, track_scope))
    }
}
