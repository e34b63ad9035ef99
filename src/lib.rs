//! Music library server library
//!
//! This library exposes the internal modules for the binaries and the
//! integration tests.

pub mod config;
pub mod library;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use library::{LibraryStore, SqliteLibraryStore};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig, ServerState};
