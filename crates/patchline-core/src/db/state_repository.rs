//! Persisted sync state repository implementation

use rusqlite::Connection;

use crate::error::Result;
use crate::models::QueueItemId;

/// Sync state that survives a process restart
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedState {
    /// Timestamp of the last fully-successful drain (Unix ms)
    pub last_sync: Option<i64>,
    /// Identifiers of queued mutations, in replay order
    pub pending_changes: Vec<QueueItemId>,
}

/// Trait for persisted sync state storage
pub trait StateRepository {
    /// Load persisted state; absent keys load as defaults
    fn load(&self) -> Result<PersistedState>;

    /// Persist the last successful drain timestamp
    fn save_last_sync(&self, last_sync: i64) -> Result<()>;

    /// Persist the pending-mutation summary
    fn save_pending(&self, pending: &[QueueItemId]) -> Result<()>;
}

/// `SQLite` implementation of `StateRepository` over the `sync_meta` table
pub struct SqliteStateRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStateRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let result = self.conn.query_row(
            "SELECT value FROM sync_meta WHERE key = ?",
            [key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?, ?)",
            [key, value],
        )?;
        Ok(())
    }
}

impl StateRepository for SqliteStateRepository<'_> {
    fn load(&self) -> Result<PersistedState> {
        let mut state = PersistedState::default();

        if let Some(value) = self.get_meta("last_sync")? {
            state.last_sync = value.parse().ok();
        }

        if let Some(value) = self.get_meta("pending_changes")? {
            state.pending_changes = serde_json::from_str(&value).unwrap_or_default();
        }

        Ok(state)
    }

    fn save_last_sync(&self, last_sync: i64) -> Result<()> {
        self.set_meta("last_sync", &last_sync.to_string())
    }

    fn save_pending(&self, pending: &[QueueItemId]) -> Result<()> {
        let serialized = serde_json::to_string(pending)?;
        self.set_meta("pending_changes", &serialized)
    }
}
