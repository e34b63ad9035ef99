use super::auth::LibraryHasher;
use super::models::*;
use super::schema::{SEED_GENRES, VERSIONED_SCHEMAS};
use super::store::{ConflictKind, LibraryStore, StoreError, StoreResult};
use crate::sqlite_persistence::read_schema_version;

use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

const PRINCIPAL_COLUMNS: &str =
    "user_id, login, first_name, last_name, email, avatar_url, is_admin";

const TRACK_SELECT: &str = "SELECT t.track_id, t.title, t.artist_id, a.name, t.genre_id, g.name, \
     t.bpm, t.duration_sec, t.owner_id, u.login \
     FROM track t \
     JOIN artist a ON a.artist_id = t.artist_id \
     JOIN genre g ON g.genre_id = t.genre_id \
     JOIN user u ON u.user_id = t.owner_id";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqliteLibraryStore {
    write_conn: Arc<Mutex<Connection>>,
    read_pool: Vec<Arc<Mutex<Connection>>>,
    read_index: Arc<AtomicUsize>,
    hasher: LibraryHasher,
}

fn principal_from_row(row: &Row, offset: usize) -> rusqlite::Result<Principal> {
    Ok(Principal {
        id: row.get(offset)?,
        login: row.get(offset + 1)?,
        first_name: row.get(offset + 2)?,
        last_name: row.get(offset + 3)?,
        email: row.get(offset + 4)?,
        avatar_url: row.get(offset + 5)?,
        role: Role::from_admin_flag(row.get::<_, i64>(offset + 6)? != 0),
    })
}

fn track_from_row(row: &Row) -> rusqlite::Result<Track> {
    Ok(Track {
        track_id: row.get(0)?,
        title: row.get(1)?,
        artist_id: row.get(2)?,
        artist_name: row.get(3)?,
        genre_id: row.get(4)?,
        genre_name: row.get(5)?,
        bpm: row.get(6)?,
        duration_sec: row.get(7)?,
        owner_id: row.get(8)?,
        owner_login: row.get(9)?,
    })
}

/// Wraps a user-supplied fragment for a `LIKE ... ESCAPE '\'` substring match.
fn like_pattern(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len() + 2);
    escaped.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn record_audit(
    tx: &Transaction,
    user_id: Option<PrincipalId>,
    action: &str,
    kind: &str,
    entity_id: Option<i64>,
    details: Option<String>,
) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO audit_log (user_id, action, entity_kind, entity_id, details) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, action, kind, entity_id, details],
    )?;
    Ok(())
}

fn open_connection(db_path: &Path, flags: rusqlite::OpenFlags) -> Result<Connection> {
    let conn = Connection::open_with_flags(db_path, flags)
        .with_context(|| format!("Failed to open library database at {:?}", db_path))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

impl SqliteLibraryStore {
    pub fn new<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path = db_path.as_ref();
        let is_new = !db_path.exists();

        let write_conn = open_connection(
            db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        if is_new {
            info!("Creating library database at {:?}", db_path);
            let latest = VERSIONED_SCHEMAS
                .last()
                .context("No library schema defined")?;
            latest.create(&write_conn)?;
            for genre in SEED_GENRES {
                write_conn.execute("INSERT INTO genre (name) VALUES (?1)", params![genre])?;
            }
        }

        let version = read_schema_version(&write_conn)?;
        match VERSIONED_SCHEMAS.get(version) {
            Some(schema) => schema.validate(&write_conn)?,
            None => bail!("Database version {} is too new", version),
        }
        Self::migrate_if_needed(&write_conn, version)?;

        write_conn.pragma_update(None, "journal_mode", "WAL")?;

        let mut read_pool = Vec::with_capacity(read_pool_size.max(1));
        for _ in 0..read_pool_size.max(1) {
            let read_conn = open_connection(
                db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        Ok(SqliteLibraryStore {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            read_index: Arc::new(AtomicUsize::new(0)),
            hasher: LibraryHasher::default(),
        })
    }

    fn migrate_if_needed(conn: &Connection, version: usize) -> Result<()> {
        let mut latest_from = version;
        for schema in VERSIONED_SCHEMAS.iter().skip(version + 1) {
            if let Some(migration_fn) = schema.migration {
                info!(
                    "Migrating library db from version {} to {}",
                    latest_from, schema.version
                );
                migration_fn(conn)?;
                latest_from = schema.version;
            }
        }
        if latest_from != version {
            conn.execute(
                &format!(
                    "PRAGMA user_version = {}",
                    crate::sqlite_persistence::BASE_DB_VERSION + latest_from
                ),
                [],
            )?;
        }
        Ok(())
    }

    fn lock(conn: &Mutex<Connection>) -> StoreResult<MutexGuard<'_, Connection>> {
        conn.lock()
            .map_err(|_| StoreError::Failure(anyhow!("library connection mutex poisoned")))
    }

    /// Runs `op` against one pooled read connection.
    fn read<T>(&self, op: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let index = self.read_index.fetch_add(1, Ordering::Relaxed) % self.read_pool.len();
        let conn = Self::lock(&self.read_pool[index])?;
        op(&conn)
    }

    /// Runs `op` in an immediate transaction on the write connection.
    /// Any error rolls the transaction back when it is dropped.
    fn write<T>(&self, op: impl FnOnce(&Transaction) -> StoreResult<T>) -> StoreResult<T> {
        let mut conn = Self::lock(&self.write_conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = op(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn login_taken(conn: &Connection, login: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM user WHERE login = ?1)",
            params![login],
            |row| row.get(0),
        )
    }

    fn email_taken(conn: &Connection, email: &str, except: Option<PrincipalId>) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM user WHERE email = ?1 AND (?2 IS NULL OR user_id != ?2))",
            params![email, except],
            |row| row.get(0),
        )
    }

    fn artist_name_taken(
        conn: &Connection,
        owner: PrincipalId,
        name: &str,
        except: Option<i64>,
    ) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM artist WHERE owner_id = ?1 AND name = ?2 AND (?3 IS NULL OR artist_id != ?3))",
            params![owner, name, except],
            |row| row.get(0),
        )
    }

    fn select_principal(conn: &Connection, id: PrincipalId) -> rusqlite::Result<Option<Principal>> {
        conn.query_row(
            &format!("SELECT {} FROM user WHERE user_id = ?1", PRINCIPAL_COLUMNS),
            params![id],
            |row| principal_from_row(row, 0),
        )
        .optional()
    }

    fn select_track(conn: &Connection, track_id: i64) -> rusqlite::Result<Option<Track>> {
        conn.query_row(
            &format!("{} WHERE t.track_id = ?1", TRACK_SELECT),
            params![track_id],
            track_from_row,
        )
        .optional()
    }

    fn select_collection(conn: &Connection, collection_id: i64) -> rusqlite::Result<Option<Collection>> {
        conn.query_row(
            "SELECT c.collection_id, c.name, c.is_favorite, c.owner_id, \
             (SELECT COUNT(*) FROM collection_track ct WHERE ct.collection_id = c.collection_id) \
             FROM collection c WHERE c.collection_id = ?1",
            params![collection_id],
            |row| {
                Ok(Collection {
                    collection_id: row.get(0)?,
                    name: row.get(1)?,
                    is_favorite: row.get::<_, i64>(2)? != 0,
                    owner_id: row.get(3)?,
                    tracks_count: row.get(4)?,
                })
            },
        )
        .optional()
    }

    /// True if `owner` owns the artist and the genre exists.
    fn track_references_valid(
        conn: &Connection,
        owner: PrincipalId,
        track: &TrackInput,
    ) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM artist WHERE artist_id = ?1 AND owner_id = ?2) \
             AND EXISTS(SELECT 1 FROM genre WHERE genre_id = ?3)",
            params![track.artist_id, owner, track.genre_id],
            |row| row.get(0),
        )
    }
}

impl LibraryStore for SqliteLibraryStore {
    fn authenticate(&self, login: &str, password: &str) -> StoreResult<Option<Principal>> {
        let found = self.read(|conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {}, password_hash, hasher FROM user WHERE login = ?1",
                        PRINCIPAL_COLUMNS
                    ),
                    params![login],
                    |row| {
                        Ok((
                            principal_from_row(row, 0)?,
                            row.get::<_, String>(7)?,
                            row.get::<_, String>(8)?,
                        ))
                    },
                )
                .optional()?)
        })?;

        let Some((principal, password_hash, hasher)) = found else {
            debug!("No principal with login {}", login);
            return Ok(None);
        };

        let hasher: LibraryHasher = hasher.parse()?;
        if hasher.verify_password(password, &password_hash)? {
            Ok(Some(principal))
        } else {
            debug!("Wrong password for principal {}", principal.id);
            Ok(None)
        }
    }

    fn register(&self, new_principal: &NewPrincipal) -> StoreResult<Principal> {
        let password_hash = self.hasher.hash_password(&new_principal.password)?;
        self.write(|tx| {
            if Self::login_taken(tx, &new_principal.login)? {
                return Err(StoreError::Conflict(ConflictKind::Login));
            }
            if Self::email_taken(tx, &new_principal.email, None)? {
                return Err(StoreError::Conflict(ConflictKind::Email));
            }
            tx.execute(
                "INSERT INTO user (login, password_hash, hasher, first_name, last_name, email) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    new_principal.login,
                    password_hash,
                    self.hasher.to_string(),
                    new_principal.first_name,
                    new_principal.last_name,
                    new_principal.email,
                ],
            )?;
            let id = tx.last_insert_rowid();
            record_audit(tx, Some(id), "register", "user", Some(id), None)?;
            Self::select_principal(tx, id)?
                .ok_or_else(|| StoreError::Failure(anyhow!("principal {} vanished after insert", id)))
        })
    }

    fn get_principal(&self, id: PrincipalId) -> StoreResult<Option<Principal>> {
        self.read(|conn| Ok(Self::select_principal(conn, id)?))
    }

    fn get_profile(&self, id: PrincipalId) -> StoreResult<Option<Profile>> {
        self.read(|conn| {
            let Some(principal) = Self::select_principal(conn, id)? else {
                return Ok(None);
            };
            let created_at: i64 = conn.query_row(
                "SELECT created_at FROM user WHERE user_id = ?1",
                params![id],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(
                "SELECT g.genre_id, g.name, COUNT(*) AS n FROM track t \
                 JOIN genre g ON g.genre_id = t.genre_id \
                 WHERE t.owner_id = ?1 GROUP BY g.genre_id ORDER BY n DESC, g.name LIMIT 5",
            )?;
            let favorite_genres = stmt
                .query_map(params![id], |row| {
                    Ok(FavoriteGenre {
                        genre_id: row.get(0)?,
                        name: row.get(1)?,
                        tracks_count: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut stmt = conn.prepare(
                "SELECT a.artist_id, a.name, COUNT(t.track_id) AS n FROM artist a \
                 LEFT JOIN track t ON t.artist_id = a.artist_id \
                 WHERE a.owner_id = ?1 GROUP BY a.artist_id ORDER BY n DESC, a.name LIMIT 5",
            )?;
            let favorite_artists = stmt
                .query_map(params![id], |row| {
                    Ok(FavoriteArtist {
                        artist_id: row.get(0)?,
                        name: row.get(1)?,
                        tracks_count: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(Some(Profile {
                principal,
                created_at,
                favorite_genres,
                favorite_artists,
            }))
        })
    }

    fn update_profile(&self, id: PrincipalId, update: &ProfileUpdate) -> StoreResult<bool> {
        self.write(|tx| {
            if let Some(email) = &update.email {
                if Self::email_taken(tx, email, Some(id))? {
                    return Err(StoreError::Conflict(ConflictKind::Email));
                }
            }
            let changed = tx.execute(
                "UPDATE user SET first_name = COALESCE(?1, first_name), last_name = COALESCE(?2, last_name), \
                 email = COALESCE(?3, email), avatar_url = COALESCE(?4, avatar_url) WHERE user_id = ?5",
                params![
                    update.first_name,
                    update.last_name,
                    update.email,
                    update.avatar_url,
                    id
                ],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            record_audit(tx, Some(id), "update_profile", "user", Some(id), None)?;
            Ok(true)
        })
    }

    fn list_genres(&self) -> StoreResult<Vec<Genre>> {
        self.read(|conn| {
            let mut stmt = conn.prepare("SELECT genre_id, name FROM genre ORDER BY name")?;
            let genres = stmt
                .query_map([], |row| {
                    Ok(Genre {
                        genre_id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(genres)
        })
    }

    fn owner_of(&self, kind: ResourceKind, id: i64) -> StoreResult<Option<PrincipalId>> {
        let sql = match kind {
            ResourceKind::Artist => "SELECT owner_id FROM artist WHERE artist_id = ?1",
            ResourceKind::Track => "SELECT owner_id FROM track WHERE track_id = ?1",
            ResourceKind::Collection => "SELECT owner_id FROM collection WHERE collection_id = ?1",
        };
        self.read(|conn| Ok(conn.query_row(sql, params![id], |row| row.get(0)).optional()?))
    }

    fn list_artists(&self, owner: PrincipalId) -> StoreResult<Vec<Artist>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT a.artist_id, a.name, a.owner_id, \
                 (SELECT COUNT(*) FROM track t WHERE t.artist_id = a.artist_id) \
                 FROM artist a WHERE a.owner_id = ?1 ORDER BY a.name",
            )?;
            let artists = stmt
                .query_map(params![owner], |row| {
                    Ok(Artist {
                        artist_id: row.get(0)?,
                        name: row.get(1)?,
                        owner_id: row.get(2)?,
                        tracks_count: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(artists)
        })
    }

    fn add_artist(&self, owner: PrincipalId, name: &str) -> StoreResult<Artist> {
        self.write(|tx| {
            if Self::artist_name_taken(tx, owner, name, None)? {
                return Err(StoreError::Conflict(ConflictKind::ArtistName));
            }
            tx.execute(
                "INSERT INTO artist (owner_id, name) VALUES (?1, ?2)",
                params![owner, name],
            )?;
            let artist_id = tx.last_insert_rowid();
            record_audit(tx, Some(owner), "add_artist", "artist", Some(artist_id), Some(name.to_string()))?;
            Ok(Artist {
                artist_id,
                name: name.to_string(),
                owner_id: owner,
                tracks_count: 0,
            })
        })
    }

    fn update_artist(&self, scope: OwnerScope, artist_id: i64, name: &str) -> StoreResult<bool> {
        self.write(|tx| {
            let owner: Option<PrincipalId> = tx
                .query_row(
                    "SELECT owner_id FROM artist WHERE artist_id = ?1 AND (?2 IS NULL OR owner_id = ?2)",
                    params![artist_id, scope.required_owner()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(owner) = owner else {
                return Ok(false);
            };
            if Self::artist_name_taken(tx, owner, name, Some(artist_id))? {
                return Err(StoreError::Conflict(ConflictKind::ArtistName));
            }
            tx.execute(
                "UPDATE artist SET name = ?1 WHERE artist_id = ?2",
                params![name, artist_id],
            )?;
            record_audit(tx, Some(scope.actor()), "update_artist", "artist", Some(artist_id), Some(name.to_string()))?;
            Ok(true)
        })
    }

    fn delete_artist(&self, scope: OwnerScope, artist_id: i64) -> StoreResult<bool> {
        self.write(|tx| {
            let tracks_count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM track WHERE artist_id = ?1",
                params![artist_id],
                |row| row.get(0),
            )?;
            let deleted = tx.execute(
                "DELETE FROM artist WHERE artist_id = ?1 AND (?2 IS NULL OR owner_id = ?2)",
                params![artist_id, scope.required_owner()],
            )?;
            if deleted == 0 {
                return Ok(false);
            }
            record_audit(
                tx,
                Some(scope.actor()),
                "delete_artist",
                "artist",
                Some(artist_id),
                Some(format!("removed {} tracks", tracks_count)),
            )?;
            Ok(true)
        })
    }

    fn artist_tracks_count(&self, artist_id: i64) -> StoreResult<i64> {
        self.read(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM track WHERE artist_id = ?1",
                params![artist_id],
                |row| row.get(0),
            )?)
        })
    }

    fn list_tracks(&self, filter: &TrackFilter) -> StoreResult<Vec<Track>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE (?1 IS NULL OR t.owner_id = ?1) \
                 AND (?2 IS NULL OR t.title LIKE ?2 ESCAPE '\\') \
                 AND (?3 IS NULL OR a.name LIKE ?3 ESCAPE '\\') \
                 AND (?4 IS NULL OR t.genre_id = ?4) \
                 AND (?5 IS NULL OR t.bpm = ?5) \
                 AND (?6 IS NULL OR t.duration_sec = ?6) \
                 ORDER BY t.track_id",
                TRACK_SELECT
            ))?;
            let tracks = stmt
                .query_map(
                    params![
                        filter.owner,
                        filter.title.as_deref().map(like_pattern),
                        filter.artist.as_deref().map(like_pattern),
                        filter.genre_id,
                        filter.bpm,
                        filter.duration_sec,
                    ],
                    track_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tracks)
        })
    }

    fn add_track(&self, owner: PrincipalId, track: &TrackInput) -> StoreResult<Option<Track>> {
        self.write(|tx| {
            if !Self::track_references_valid(tx, owner, track)? {
                return Ok(None);
            }
            tx.execute(
                "INSERT INTO track (owner_id, artist_id, genre_id, title, bpm, duration_sec) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    owner,
                    track.artist_id,
                    track.genre_id,
                    track.title,
                    track.bpm,
                    track.duration_sec
                ],
            )?;
            let track_id = tx.last_insert_rowid();
            record_audit(tx, Some(owner), "add_track", "track", Some(track_id), Some(track.title.clone()))?;
            Ok(Self::select_track(tx, track_id)?)
        })
    }

    fn update_track(
        &self,
        scope: OwnerScope,
        track_id: i64,
        track: &TrackInput,
    ) -> StoreResult<bool> {
        self.write(|tx| {
            let owner: Option<PrincipalId> = tx
                .query_row(
                    "SELECT owner_id FROM track WHERE track_id = ?1 AND (?2 IS NULL OR owner_id = ?2)",
                    params![track_id, scope.required_owner()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(owner) = owner else {
                return Ok(false);
            };
            if !Self::track_references_valid(tx, owner, track)? {
                return Ok(false);
            }
            tx.execute(
                "UPDATE track SET artist_id = ?1, genre_id = ?2, title = ?3, bpm = ?4, duration_sec = ?5 WHERE track_id = ?6",
                params![
                    track.artist_id,
                    track.genre_id,
                    track.title,
                    track.bpm,
                    track.duration_sec,
                    track_id
                ],
            )?;
            record_audit(tx, Some(scope.actor()), "update_track", "track", Some(track_id), Some(track.title.clone()))?;
            Ok(true)
        })
    }

    fn delete_track(&self, scope: OwnerScope, track_id: i64) -> StoreResult<bool> {
        self.write(|tx| {
            let deleted = tx.execute(
                "DELETE FROM track WHERE track_id = ?1 AND (?2 IS NULL OR owner_id = ?2)",
                params![track_id, scope.required_owner()],
            )?;
            if deleted == 0 {
                return Ok(false);
            }
            record_audit(tx, Some(scope.actor()), "delete_track", "track", Some(track_id), None)?;
            Ok(true)
        })
    }

    fn list_collections(&self, owner: PrincipalId) -> StoreResult<Vec<Collection>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.collection_id, c.name, c.is_favorite, c.owner_id, \
                 (SELECT COUNT(*) FROM collection_track ct WHERE ct.collection_id = c.collection_id) \
                 FROM collection c WHERE c.owner_id = ?1 ORDER BY c.is_favorite DESC, c.name",
            )?;
            let collections = stmt
                .query_map(params![owner], |row| {
                    Ok(Collection {
                        collection_id: row.get(0)?,
                        name: row.get(1)?,
                        is_favorite: row.get::<_, i64>(2)? != 0,
                        owner_id: row.get(3)?,
                        tracks_count: row.get(4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(collections)
        })
    }

    fn create_collection(
        &self,
        owner: PrincipalId,
        name: &str,
        is_favorite: bool,
    ) -> StoreResult<Collection> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO collection (owner_id, name, is_favorite) VALUES (?1, ?2, ?3)",
                params![owner, name, is_favorite as i64],
            )?;
            let collection_id = tx.last_insert_rowid();
            record_audit(tx, Some(owner), "create_collection", "collection", Some(collection_id), Some(name.to_string()))?;
            Self::select_collection(tx, collection_id)?.ok_or_else(|| {
                StoreError::Failure(anyhow!("collection {} vanished after insert", collection_id))
            })
        })
    }

    fn update_collection(
        &self,
        scope: OwnerScope,
        collection_id: i64,
        name: &str,
        is_favorite: Option<bool>,
    ) -> StoreResult<bool> {
        self.write(|tx| {
            let changed = tx.execute(
                "UPDATE collection SET name = ?1, is_favorite = COALESCE(?2, is_favorite) \
                 WHERE collection_id = ?3 AND (?4 IS NULL OR owner_id = ?4)",
                params![
                    name,
                    is_favorite.map(|f| f as i64),
                    collection_id,
                    scope.required_owner()
                ],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            record_audit(tx, Some(scope.actor()), "update_collection", "collection", Some(collection_id), Some(name.to_string()))?;
            Ok(true)
        })
    }

    fn delete_collection(&self, scope: OwnerScope, collection_id: i64) -> StoreResult<bool> {
        self.write(|tx| {
            let deleted = tx.execute(
                "DELETE FROM collection WHERE collection_id = ?1 AND (?2 IS NULL OR owner_id = ?2)",
                params![collection_id, scope.required_owner()],
            )?;
            if deleted == 0 {
                return Ok(false);
            }
            record_audit(tx, Some(scope.actor()), "delete_collection", "collection", Some(collection_id), None)?;
            Ok(true)
        })
    }

    fn add_collection_track(
        &self,
        collection_scope: OwnerScope,
        collection_id: i64,
        track_scope: OwnerScope,
        track_id: i64,
    ) -> StoreResult<bool> {
        self.write(|tx| {
            let allowed: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM collection WHERE collection_id = ?1 AND (?2 IS NULL OR owner_id = ?2)) \
                 AND EXISTS(SELECT 1 FROM track WHERE track_id = ?3 AND (?4 IS NULL OR owner_id = ?4))",
                params![
                    collection_id,
                    collection_scope.required_owner(),
                    track_id,
                    track_scope.required_owner()
                ],
                |row| row.get(0),
            )?;
            if !allowed {
                return Ok(false);
            }
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO collection_track (collection_id, track_id) VALUES (?1, ?2)",
                params![collection_id, track_id],
            )?;
            if inserted == 0 {
                return Ok(false);
            }
            record_audit(
                tx,
                Some(collection_scope.actor()),
                "add_collection_track",
                "collection",
                Some(collection_id),
                Some(format!("track {}", track_id)),
            )?;
            Ok(true)
        })
    }

    fn remove_collection_track(
        &self,
        collection_scope: OwnerScope,
        collection_id: i64,
        track_id: i64,
    ) -> StoreResult<bool> {
        self.write(|tx| {
            let removed = tx.execute(
                "DELETE FROM collection_track WHERE collection_id = ?1 AND track_id = ?2 \
                 AND EXISTS(SELECT 1 FROM collection c WHERE c.collection_id = ?1 AND (?3 IS NULL OR c.owner_id = ?3))",
                params![collection_id, track_id, collection_scope.required_owner()],
            )?;
            if removed == 0 {
                return Ok(false);
            }
            record_audit(
                tx,
                Some(collection_scope.actor()),
                "remove_collection_track",
                "collection",
                Some(collection_id),
                Some(format!("track {}", track_id)),
            )?;
            Ok(true)
        })
    }

    fn collection_tracks(&self, collection_id: i64) -> StoreResult<Vec<Track>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} JOIN collection_track ct ON ct.track_id = t.track_id \
                 WHERE ct.collection_id = ?1 ORDER BY ct.added_at, ct.rowid",
                TRACK_SELECT
            ))?;
            let tracks = stmt
                .query_map(params![collection_id], track_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tracks)
        })
    }

    fn list_users(&self) -> StoreResult<Vec<UserSummary>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {}, created_at, \
                 (SELECT COUNT(*) FROM artist a WHERE a.owner_id = u.user_id), \
                 (SELECT COUNT(*) FROM track t WHERE t.owner_id = u.user_id), \
                 (SELECT COUNT(*) FROM collection c WHERE c.owner_id = u.user_id) \
                 FROM user u ORDER BY user_id",
                PRINCIPAL_COLUMNS
            ))?;
            let users = stmt
                .query_map([], |row| {
                    Ok(UserSummary {
                        principal: principal_from_row(row, 0)?,
                        created_at: row.get(7)?,
                        artists_count: row.get(8)?,
                        tracks_count: row.get(9)?,
                        collections_count: row.get(10)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
    }

    fn audit_log(&self, limit: usize) -> StoreResult<Vec<AuditEntry>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT audit_id, user_id, action, entity_kind, entity_id, details, created_at \
                 FROM audit_log ORDER BY audit_id DESC LIMIT ?1",
            )?;
            let entries = stmt
                .query_map(params![limit as i64], |row| {
                    Ok(AuditEntry {
                        audit_id: row.get(0)?,
                        user_id: row.get(1)?,
                        action: row.get(2)?,
                        entity_kind: row.get(3)?,
                        entity_id: row.get(4)?,
                        details: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
    }

    fn set_role(&self, id: PrincipalId, role: Role) -> StoreResult<bool> {
        self.write(|tx| {
            let changed = tx.execute(
                "UPDATE user SET is_admin = ?1 WHERE user_id = ?2",
                params![role.is_admin() as i64, id],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            record_audit(tx, None, "set_role", "user", Some(id), Some(format!("{:?}", role)))?;
            Ok(true)
        })
    }
}
