use crate::sqlite_column;
use crate::sqlite_persistence::{
    ForeignKey, OnDelete, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const USER_FK: ForeignKey = ForeignKey {
    foreign_table: "user",
    foreign_column: "user_id",
    on_delete: OnDelete::Cascade,
};

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artist",
    foreign_column: "artist_id",
    on_delete: OnDelete::Cascade,
};

const GENRE_FK: ForeignKey = ForeignKey {
    foreign_table: "genre",
    foreign_column: "genre_id",
    on_delete: OnDelete::Restrict,
};

const TRACK_FK: ForeignKey = ForeignKey {
    foreign_table: "track",
    foreign_column: "track_id",
    on_delete: OnDelete::Cascade,
};

const COLLECTION_FK: ForeignKey = ForeignKey {
    foreign_table: "collection",
    foreign_column: "collection_id",
    on_delete: OnDelete::Cascade,
};

const USER_TABLE_V_0: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!("user_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("login", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("password_hash", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!("first_name", &SqlType::Text, non_null = true),
        sqlite_column!("last_name", &SqlType::Text, non_null = true),
        sqlite_column!("email", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("avatar_url", &SqlType::Text),
        sqlite_column!(
            "is_admin",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

const GENRE_TABLE_V_0: Table = Table {
    name: "genre",
    columns: &[
        sqlite_column!("genre_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true, is_unique = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

const ARTIST_TABLE_V_0: Table = Table {
    name: "artist",
    columns: &[
        sqlite_column!("artist_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "owner_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_artist_owner", "owner_id")],
    unique_constraints: &[&["owner_id", "name"]],
};

const TRACK_TABLE_V_0: Table = Table {
    name: "track",
    columns: &[
        sqlite_column!("track_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "owner_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!(
            "genre_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&GENRE_FK)
        ),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("bpm", &SqlType::Integer),
        sqlite_column!("duration_sec", &SqlType::Integer),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_track_owner", "owner_id"),
        ("idx_track_artist", "artist_id"),
    ],
    unique_constraints: &[],
};

const COLLECTION_TABLE_V_0: Table = Table {
    name: "collection",
    columns: &[
        sqlite_column!("collection_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "owner_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!(
            "is_favorite",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_collection_owner", "owner_id")],
    unique_constraints: &[],
};

const COLLECTION_TRACK_TABLE_V_0: Table = Table {
    name: "collection_track",
    columns: &[
        sqlite_column!(
            "collection_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&COLLECTION_FK)
        ),
        sqlite_column!(
            "track_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&TRACK_FK)
        ),
        sqlite_column!(
            "added_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_collection_track_track", "track_id")],
    unique_constraints: &[&["collection_id", "track_id"]],
};

// No foreign key on user_id: entries outlive whatever they describe.
const AUDIT_LOG_TABLE_V_0: Table = Table {
    name: "audit_log",
    columns: &[
        sqlite_column!("audit_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("user_id", &SqlType::Integer),
        sqlite_column!("action", &SqlType::Text, non_null = true),
        sqlite_column!("entity_kind", &SqlType::Text, non_null = true),
        sqlite_column!("entity_id", &SqlType::Integer),
        sqlite_column!("details", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        USER_TABLE_V_0,
        GENRE_TABLE_V_0,
        ARTIST_TABLE_V_0,
        TRACK_TABLE_V_0,
        COLLECTION_TABLE_V_0,
        COLLECTION_TRACK_TABLE_V_0,
        AUDIT_LOG_TABLE_V_0,
    ],
    migration: None,
}];

pub const SEED_GENRES: &[&str] = &[
    "Ambient",
    "Blues",
    "Classical",
    "Country",
    "Electronic",
    "Folk",
    "Hip-Hop",
    "House",
    "Jazz",
    "Metal",
    "Pop",
    "R&B",
    "Reggae",
    "Rock",
    "Techno",
];
