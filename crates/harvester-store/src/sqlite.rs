//! SQLite-backed checkpoint store

use crate::error::CheckpointError;
use harvester_domain::{current_timestamp, CheckpointStore};
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Checkpoint kept in an embedded SQLite database
///
/// Each append is its own implicit transaction, so a key is either fully
/// recorded or absent after a crash.
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. The result sink owns the only
/// instance and serializes access to it.
pub struct SqliteCheckpoint {
    conn: Connection,
    keys: HashSet<String>,
}

impl SqliteCheckpoint {
    /// Open (or create) a checkpoint database at `path`
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use harvester_store::SqliteCheckpoint;
    ///
    /// let checkpoint = SqliteCheckpoint::open("checkpoint.db").unwrap();
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(include_str!("schema.sql"))?;

        let keys = Self::query_keys(&conn)?;
        info!("SQLite checkpoint opened with {} keys", keys.len());

        Ok(Self { conn, keys })
    }

    fn query_keys(conn: &Connection) -> Result<HashSet<String>, CheckpointError> {
        let mut stmt = conn.prepare("SELECT key FROM checkpoint")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(keys)
    }
}

impl CheckpointStore for SqliteCheckpoint {
    type Error = CheckpointError;

    fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    fn append(&mut self, key: &str) -> Result<(), Self::Error> {
        if key.trim().is_empty() {
            return Err(CheckpointError::InvalidKey(key.to_string()));
        }

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO checkpoint (key, recorded_at) VALUES (?1, ?2)",
            params![key, current_timestamp() as i64],
        )?;
        if inserted == 0 {
            debug!("Checkpoint already holds {}", key);
        }

        self.keys.insert(key.to_string());
        Ok(())
    }

    fn load_all(&self) -> Result<HashSet<String>, Self::Error> {
        Self::query_keys(&self.conn)
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}
