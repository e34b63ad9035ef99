use serde::{Deserialize, Serialize};

pub type PrincipalId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Standard,
    Admin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin {
            Role::Admin
        } else {
            Role::Standard
        }
    }
}

/// A registered user, as seen by the request pipeline.
///
/// The JSON form is the principal summary returned by login and registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub id: PrincipalId,
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[derive(Serialize, Deserialize)]
struct PrincipalSummary {
    user_id: PrincipalId,
    login: String,
    first_name: String,
    last_name: String,
    email: String,
    avatar_url: Option<String>,
    is_admin: bool,
}

impl Serialize for Principal {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PrincipalSummary {
            user_id: self.id,
            login: self.login.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            avatar_url: self.avatar_url.clone(),
            is_admin: self.is_admin(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let summary = PrincipalSummary::deserialize(deserializer)?;
        Ok(Principal {
            id: summary.user_id,
            login: summary.login,
            first_name: summary.first_name,
            last_name: summary.last_name,
            email: summary.email,
            avatar_url: summary.avatar_url,
            role: Role::from_admin_flag(summary.is_admin),
        })
    }
}

#[derive(Clone, Debug)]
pub struct NewPrincipal {
    pub login: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FavoriteGenre {
    pub genre_id: i64,
    pub name: String,
    pub tracks_count: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct FavoriteArtist {
    pub artist_id: i64,
    pub name: String,
    pub tracks_count: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub principal: Principal,
    pub created_at: i64,
    pub favorite_genres: Vec<FavoriteGenre>,
    pub favorite_artists: Vec<FavoriteArtist>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Genre {
    pub genre_id: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Artist {
    pub artist_id: i64,
    pub name: String,
    pub owner_id: PrincipalId,
    pub tracks_count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Track {
    pub track_id: i64,
    pub title: String,
    pub artist_id: i64,
    pub artist_name: String,
    pub genre_id: i64,
    pub genre_name: String,
    pub bpm: Option<i64>,
    pub duration_sec: Option<i64>,
    pub owner_id: PrincipalId,
    pub owner_login: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackInput {
    pub title: String,
    pub artist_id: i64,
    pub genre_id: i64,
    pub bpm: Option<i64>,
    pub duration_sec: Option<i64>,
}

/// Filters for track listings. `owner == None` lists every principal's tracks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackFilter {
    pub owner: Option<PrincipalId>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub genre_id: Option<i64>,
    pub bpm: Option<i64>,
    pub duration_sec: Option<i64>,
}

impl TrackFilter {
    pub fn owned_by(owner: PrincipalId) -> Self {
        TrackFilter {
            owner: Some(owner),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Collection {
    pub collection_id: i64,
    pub name: String,
    pub is_favorite: bool,
    pub owner_id: PrincipalId,
    pub tracks_count: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub principal: Principal,
    pub created_at: i64,
    pub artists_count: i64,
    pub tracks_count: i64,
    pub collections_count: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct AuditEntry {
    pub audit_id: i64,
    pub user_id: Option<PrincipalId>,
    pub action: String,
    pub entity_kind: String,
    pub entity_id: Option<i64>,
    pub details: Option<String>,
    pub created_at: i64,
}

/// Kinds of owned resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Artist,
    Track,
    Collection,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Artist => "artist",
            ResourceKind::Track => "track",
            ResourceKind::Collection => "collection",
        }
    }
}

/// Which rows a mutating operation may touch, and on whose behalf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OwnerScope {
    /// Only rows owned by this principal.
    Owner(PrincipalId),
    /// Any row; the principal acts through an admin bypass.
    Bypass(PrincipalId),
}

impl OwnerScope {
    pub fn actor(&self) -> PrincipalId {
        match self {
            OwnerScope::Owner(id) | OwnerScope::Bypass(id) => *id,
        }
    }

    pub fn required_owner(&self) -> Option<PrincipalId> {
        match self {
            OwnerScope::Owner(id) => Some(*id),
            OwnerScope::Bypass(_) => None,
        }
    }
}
