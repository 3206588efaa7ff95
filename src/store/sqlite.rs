use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::app::{FreebieError, Result};
use crate::domain::{CacheEntry, GameDetails, LedgerStats, SeenEntry, StoreKind};
use crate::store::{GameCache, SeenLedger};

pub const DEFAULT_TRANSIENT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct SqliteStore {
    conn: Mutex<Connection>,
    transient_ttl: Duration,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
            transient_ttl: DEFAULT_TRANSIENT_TTL,
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Age after which non-permanent cache rows read as absent.
    pub fn with_transient_ttl(mut self, ttl: Duration) -> Self {
        self.transient_ttl = ttl;
        self
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![
            M::up(include_str!("../../migrations/001-initial/up.sql")),
            M::up(include_str!("../../migrations/002-scan-state/up.sql")),
        ]);

        let mut conn = self.lock()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| FreebieError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            FreebieError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        if entry.permanent {
            return false;
        }
        // A row from the future (clock skew) counts as fresh
        (now - entry.fetched_at)
            .to_std()
            .is_ok_and(|age| age > self.transient_ttl)
    }

    pub(crate) fn put_at(
        &self,
        store: StoreKind,
        identifier: &str,
        data: &GameDetails,
        permanent: bool,
        fetched_at: DateTime<Utc>,
    ) -> Result<()> {
        if identifier.is_empty() {
            return Err(FreebieError::Other(format!(
                "refusing to cache {} entry without identifier",
                store
            )));
        }

        let json = serde_json::to_string(data)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO game_cache (store, identifier, fetched_at, data, permanent)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(store, identifier) DO UPDATE SET
                fetched_at = excluded.fetched_at,
                data = excluded.data,
                permanent = excluded.permanent",
            params![
                store.as_str(),
                identifier,
                fetched_at.to_rfc3339(),
                json,
                permanent
            ],
        )?;

        Ok(())
    }
}

impl GameCache for SqliteStore {
    fn get(&self, store: StoreKind, identifier: &str) -> Result<Option<GameDetails>> {
        let entry = self.get_entry(store, identifier)?;
        Ok(entry
            .filter(|e| !self.is_expired(e, Utc::now()))
            .map(|e| e.data))
    }

    fn get_entry(&self, store: StoreKind, identifier: &str) -> Result<Option<CacheEntry>> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                "SELECT fetched_at, data, permanent FROM game_cache
                 WHERE store = ?1 AND identifier = ?2",
                params![store.as_str(), identifier],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, bool>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((fetched_at, data, permanent)) = row else {
            return Ok(None);
        };

        Ok(Some(CacheEntry {
            store,
            identifier: identifier.to_string(),
            fetched_at: Self::parse_datetime(&fetched_at).unwrap_or(DateTime::UNIX_EPOCH),
            data: serde_json::from_str(&data)?,
            permanent,
        }))
    }

    fn put(
        &self,
        store: StoreKind,
        identifier: &str,
        data: &GameDetails,
        permanent: bool,
    ) -> Result<()> {
        self.put_at(store, identifier, data, permanent, Utc::now())
    }

    fn clear(&self) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM game_cache", [])?;
        Ok(removed)
    }

    fn entry_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM game_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl SeenLedger for SqliteStore {
    fn is_seen(&self, post_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM seen_posts WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn mark_seen(&self, post_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO seen_posts (post_id, inserted_at) VALUES (?1, ?2)",
            params![post_id, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted == 1)
    }

    fn seen_entry(&self, post_id: &str) -> Result<Option<SeenEntry>> {
        let conn = self.lock()?;
        let inserted_at = conn
            .query_row(
                "SELECT inserted_at FROM seen_posts WHERE post_id = ?1",
                params![post_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(inserted_at.map(|s| SeenEntry {
            post_id: post_id.to_string(),
            inserted_at: Self::parse_datetime(&s).unwrap_or(DateTime::UNIX_EPOCH),
        }))
    }

    fn record_check(&self, at: DateTime<Utc>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO scan_state (id, last_check_at) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET last_check_at = excluded.last_check_at",
            params![at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn stats(&self) -> Result<LedgerStats> {
        let conn = self.lock()?;
        let (count, last_seen): (i64, Option<String>) = conn.query_row(
            "SELECT COUNT(*), MAX(inserted_at) FROM seen_posts",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let last_check: Option<String> = conn
            .query_row("SELECT last_check_at FROM scan_state WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        Ok(LedgerStats {
            seen_posts: count as usize,
            last_seen_at: last_seen.as_deref().and_then(Self::parse_datetime),
            last_check_at: last_check.as_deref().and_then(Self::parse_datetime),
        })
    }
}
