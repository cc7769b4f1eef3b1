//! Durable silence storage backed by SQLite.
//!
//! [`SilenceStore`] owns the database connection and the schema. Every
//! mutation runs inside a transaction that is committed explicitly; any
//! early return drops the transaction, which rolls it back, so a reader
//! never observes a partially written silence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Params, Row, params};
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::SilenceStoreConfig;
use crate::error::{Result, SilenceError};
use crate::types::{NewSilence, Silence, SilenceId};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS silences (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    matchers   TEXT    NOT NULL,
    start_at   INTEGER NOT NULL,
    ends_at    INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    created_by TEXT    NOT NULL,
    comment    TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS silences_end ON silences (ends_at);
";

const SELECT_SILENCES: &str =
    "SELECT id, matchers, start_at, ends_at, created_at, created_by, comment FROM silences";

/// Columns of one row, read but not yet decoded.
struct RawSilence {
    id: SilenceId,
    matchers: String,
    start_at: i64,
    ends_at: i64,
    created_at: i64,
    created_by: String,
    comment: String,
}

impl RawSilence {
    fn from_row(id: SilenceId, row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id,
            matchers: row.get(1)?,
            start_at: row.get(2)?,
            ends_at: row.get(3)?,
            created_at: row.get(4)?,
            created_by: row.get(5)?,
            comment: row.get(6)?,
        })
    }

    fn decode(self) -> Result<Silence> {
        let id = self.id;
        let matchers = codec::decode(&self.matchers).map_err(|e| SilenceError::CorruptData {
            id,
            reason: e.to_string(),
        })?;

        Ok(Silence {
            id,
            matchers,
            starts_at: from_micros(id, "start_at", self.start_at)?,
            ends_at: from_micros(id, "ends_at", self.ends_at)?,
            created_at: from_micros(id, "created_at", self.created_at)?,
            created_by: self.created_by,
            comment: self.comment,
        })
    }
}

fn from_micros(id: SilenceId, column: &str, micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| SilenceError::CorruptData {
        id,
        reason: format!("{column} out of range: {micros}"),
    })
}

/// Reads one row. The outer error aborts the scan; the inner one marks a
/// single unreadable row.
fn read_row(row: &Row<'_>) -> rusqlite::Result<Result<Silence>> {
    let id = SilenceId::new(row.get(0)?);
    let decoded = RawSilence::from_row(id, row)
        .map_err(|e| SilenceError::CorruptData {
            id,
            reason: e.to_string(),
        })
        .and_then(RawSilence::decode);
    Ok(decoded)
}

/// Durable, transactional store of silences.
///
/// Cloning is cheap; clones share the same connection.
#[derive(Debug, Clone)]
pub struct SilenceStore {
    conn: Arc<Mutex<Connection>>,
}

impl SilenceStore {
    /// Opens (or creates) the store described by `config` and bootstraps the schema.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Config` if the database directory cannot be
    /// created, or `SilenceError::Storage` if the database cannot be opened
    /// or the schema cannot be applied.
    pub fn open(config: &SilenceStoreConfig) -> Result<Self> {
        let conn = if config.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = config.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        SilenceError::Config(format!(
                            "failed to create silence store dir '{}': {e}",
                            parent.display()
                        ))
                    })?;
                }
            }
            Connection::open(&config.path)?
        };
        conn.busy_timeout(config.busy_timeout())?;

        let store = Self::init_schema(conn)?;
        info!(path = %config.path.display(), "opened silence store");
        Ok(store)
    }

    /// Opens a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Storage` if SQLite cannot be initialized.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&SilenceStoreConfig::in_memory())
    }

    fn init_schema(mut conn: Connection) -> Result<Self> {
        let tx = conn.transaction()?;
        tx.execute_batch(SCHEMA)?;
        tx.commit()?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Persists a new silence and returns its identifier.
    ///
    /// Timestamps are truncated to microseconds before the window is
    /// checked, so the stored row is exactly what [`get`](Self::get) returns.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Validation` if the silence has no matchers or
    /// an empty window, and `SilenceError::Storage` if the insert cannot be
    /// committed. Nothing is written in either case.
    pub fn create(&self, silence: &NewSilence) -> Result<SilenceId> {
        let silence = &silence.normalized();
        silence.validate()?;
        let payload = codec::encode(&silence.matchers)
            .map_err(|e| SilenceError::validation(format!("cannot encode matchers: {e}")))?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO silences (matchers, start_at, ends_at, created_at, created_by, comment)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                payload,
                silence.starts_at.timestamp_micros(),
                silence.ends_at.timestamp_micros(),
                silence.created_at.timestamp_micros(),
                silence.created_by,
                silence.comment,
            ],
        )?;
        let id = SilenceId::new(tx.last_insert_rowid());
        tx.commit()?;
        drop(conn);

        info!(
            silence_id = %id,
            matchers = %payload,
            starts_at = %silence.starts_at,
            ends_at = %silence.ends_at,
            created_by = %silence.created_by,
            "created silence"
        );
        Ok(id)
    }

    /// Looks up a silence by identifier.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::NotFound` if no row has that identifier, and
    /// `SilenceError::CorruptData` if the row cannot be decoded.
    pub fn get(&self, id: SilenceId) -> Result<Silence> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                &format!("{SELECT_SILENCES} WHERE id = ?1"),
                params![id.as_i64()],
                read_row,
            )
            .optional()?;
        drop(conn);

        debug!(silence_id = %id, found = found.is_some(), "silence lookup");
        found.ok_or(SilenceError::NotFound { id })?
    }

    /// Removes a silence. Removing an unknown identifier is a no-op.
    ///
    /// Returns `true` if a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Storage` if the delete cannot be committed.
    pub fn delete(&self, id: SilenceId) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM silences WHERE id = ?1", params![id.as_i64()])?;
        tx.commit()?;
        drop(conn);

        if removed > 0 {
            info!(silence_id = %id, "deleted silence");
        } else {
            debug!(silence_id = %id, "delete of unknown silence ignored");
        }
        Ok(removed > 0)
    }

    /// Returns every stored silence, expired ones included, ordered by id.
    ///
    /// Rows that cannot be decoded are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Storage` if the scan itself fails.
    pub fn list_all(&self) -> Result<Vec<Silence>> {
        self.scan(&format!("{SELECT_SILENCES} ORDER BY id"), [])
    }

    /// Returns the silences whose window contains `now`, ordered by id.
    ///
    /// Rows that cannot be decoded are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Storage` if the scan itself fails.
    pub fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<Silence>> {
        let now_micros = now.timestamp_micros();
        self.scan(
            &format!("{SELECT_SILENCES} WHERE ends_at > ?1 AND start_at <= ?1 ORDER BY id"),
            params![now_micros],
        )
    }

    fn scan<P: Params>(&self, sql: &str, args: P) -> Result<Vec<Silence>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt.query_map(args, read_row)?;

        let mut silences = Vec::new();
        let mut skipped = 0usize;
        for row in rows {
            match row? {
                Ok(silence) => silences.push(silence),
                Err(e) => {
                    skipped += 1;
                    warn!(error = %e, "skipping unreadable silence");
                }
            }
        }

        debug!(returned = silences.len(), skipped, "silence scan complete");
        Ok(silences)
    }

    /// Deletes every silence whose window ended at or before `now`.
    ///
    /// Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Storage` if the purge cannot be committed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM silences WHERE ends_at <= ?1",
            params![now.timestamp_micros()],
        )?;
        tx.commit()?;
        drop(conn);

        if removed > 0 {
            info!(removed, cutoff = %now, "purged expired silences");
        }
        Ok(removed)
    }

    /// Returns the number of stored silences, expired ones included.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Storage` if the count query fails.
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM silences", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
