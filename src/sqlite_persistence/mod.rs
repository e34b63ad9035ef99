mod versioned_schema;

pub use versioned_schema::*;

/// Offset added to every schema version stored in `PRAGMA user_version`, so a
/// database created by something else is never mistaken for ours.
pub const BASE_DB_VERSION: usize = 41000;
