//! Library data: principals, artists, tracks, genres, collections and the
//! stored operations over them.

pub mod auth;
mod models;
mod schema;
mod sqlite_library_store;
mod store;

pub use auth::LibraryHasher;
pub use models::*;
pub use sqlite_library_store::SqliteLibraryStore;
pub use store::{ConflictKind, LibraryStore, StoreError, StoreResult};
