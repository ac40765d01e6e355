//! Queue repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use rusqlite::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{DeadLetter, MutationKind, QueueItem, QueueItemId};

/// Trait for pending-mutation storage operations
pub trait QueueRepository {
    /// Persist a new queue item; storage failures propagate to the caller
    fn enqueue(&self, item: &QueueItem) -> Result<()>;

    /// Get a queue item by ID
    fn get(&self, id: &QueueItemId) -> Result<Option<QueueItem>>;

    /// List pending items in replay order (enqueue time ascending)
    fn list_pending(&self) -> Result<Vec<QueueItem>>;

    /// Remove an item; no-op if already absent
    fn remove(&self, id: &QueueItemId) -> Result<()>;

    /// Increment an item's retry count, returning the new count
    ///
    /// Returns `None` if the item is absent.
    fn increment_retry(&self, id: &QueueItemId) -> Result<Option<u32>>;

    /// Number of pending items
    fn pending_count(&self) -> Result<usize>;

    /// Record a dropped item durably
    fn record_dead_letter(&self, letter: &DeadLetter) -> Result<()>;

    /// List dropped items, newest first
    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>>;

    /// Acknowledge (remove) a dropped item
    fn acknowledge_dead_letter(&self, id: &QueueItemId) -> Result<()>;
}

/// `SQLite` implementation of `QueueRepository`
pub struct SqliteQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a queue item from a database row
    fn parse_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueItem> {
        let id: String = row.get(0)?;
        let method: String = row.get(1)?;
        let payload: String = row.get(3)?;
        Ok(QueueItem {
            id: id.parse().unwrap_or_default(),
            method: method.parse().unwrap_or(MutationKind::Update),
            target: row.get(2)?,
            payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
            enqueued_at: row.get(4)?,
            retry_count: row.get(5)?,
            max_retries: row.get(6)?,
        })
    }

    /// Parse a dead letter from a database row
    fn parse_dead_letter(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeadLetter> {
        let id: String = row.get(0)?;
        let method: String = row.get(1)?;
        let payload: String = row.get(3)?;
        Ok(DeadLetter {
            id: id.parse().unwrap_or_default(),
            method: method.parse().unwrap_or(MutationKind::Update),
            target: row.get(2)?,
            payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
            retry_count: row.get(4)?,
            dropped_at: row.get(5)?,
            reason: row.get(6)?,
        })
    }
}

impl QueueRepository for SqliteQueueRepository<'_> {
    fn enqueue(&self, item: &QueueItem) -> Result<()> {
        let payload = serde_json::to_string(&item.payload)?;
        self.conn.execute(
            "INSERT INTO queue_items (id, method, target, payload, enqueued_at, retry_count, max_retries)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                item.id.as_str(),
                item.method.as_str(),
                item.target,
                payload,
                item.enqueued_at,
                item.retry_count,
                item.max_retries
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &QueueItemId) -> Result<Option<QueueItem>> {
        let result = self.conn.query_row(
            "SELECT id, method, target, payload, enqueued_at, retry_count, max_retries
             FROM queue_items WHERE id = ?",
            params![id.as_str()],
            Self::parse_item,
        );

        match result {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_pending(&self) -> Result<Vec<QueueItem>> {
        // rowid breaks same-millisecond ties in insertion order
        let mut stmt = self.conn.prepare(
            "SELECT id, method, target, payload, enqueued_at, retry_count, max_retries
             FROM queue_items
             ORDER BY enqueued_at ASC, rowid ASC",
        )?;

        let items = stmt
            .query_map([], Self::parse_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(items)
    }

    fn remove(&self, id: &QueueItemId) -> Result<()> {
        self.conn.execute(
            "DELETE FROM queue_items WHERE id = ?",
            params![id.as_str()],
        )?;
        Ok(())
    }

    fn increment_retry(&self, id: &QueueItemId) -> Result<Option<u32>> {
        let rows = self.conn.execute(
            "UPDATE queue_items SET retry_count = retry_count + 1 WHERE id = ?",
            params![id.as_str()],
        )?;

        if rows == 0 {
            return Ok(None);
        }

        let count: u32 = self.conn.query_row(
            "SELECT retry_count FROM queue_items WHERE id = ?",
            params![id.as_str()],
            |row| row.get(0),
        )?;
        Ok(Some(count))
    }

    fn pending_count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM queue_items", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| Error::InvalidInput("Negative row count".into()))
    }

    fn record_dead_letter(&self, letter: &DeadLetter) -> Result<()> {
        let payload = serde_json::to_string(&letter.payload)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO dead_letters (id, method, target, payload, retry_count, dropped_at, reason)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                letter.id.as_str(),
                letter.method.as_str(),
                letter.target,
                payload,
                letter.retry_count,
                letter.dropped_at,
                letter.reason
            ],
        )?;
        Ok(())
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, method, target, payload, retry_count, dropped_at, reason
             FROM dead_letters
             ORDER BY dropped_at DESC
             LIMIT ?",
        )?;

        let letters = stmt
            .query_map(params![limit as i64], Self::parse_dead_letter)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(letters)
    }

    fn acknowledge_dead_letter(&self, id: &QueueItemId) -> Result<()> {
        self.conn.execute(
            "DELETE FROM dead_letters WHERE id = ?",
            params![id.as_str()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use serde_json::json;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn item(target: &str) -> QueueItem {
        QueueItem::new(MutationKind::Update, target, json!({"name": "SW-1"}), 3)
    }

    #[test]
    fn test_enqueue_and_get() {
        let db = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        let queued = item("equipment/eq-1");
        repo.enqueue(&queued).unwrap();

        let fetched = repo.get(&queued.id).unwrap().unwrap();
        assert_eq!(fetched, queued);
    }

    #[test]
    fn test_list_pending_in_enqueue_order() {
        let db = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        let mut first = item("equipment/eq-1");
        let mut second = item("equipment/eq-2");
        let mut third = item("equipment/eq-3");
        first.enqueued_at = 100;
        second.enqueued_at = 200;
        third.enqueued_at = 300;

        // Insert out of order; listing must come back by enqueue time
        repo.enqueue(&third).unwrap();
        repo.enqueue(&first).unwrap();
        repo.enqueue(&second).unwrap();

        let pending = repo.list_pending().unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0].id, first.id);
        assert_eq!(pending[1].id, second.id);
        assert_eq!(pending[2].id, third.id);
    }

    #[test]
    fn test_same_millisecond_items_keep_insertion_order() {
        let db = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        let mut first = item("equipment/eq-1");
        let mut second = item("equipment/eq-2");
        first.enqueued_at = 100;
        second.enqueued_at = 100;

        repo.enqueue(&first).unwrap();
        repo.enqueue(&second).unwrap();

        let pending = repo.list_pending().unwrap();
        assert_eq!(pending[0].id, first.id);
        assert_eq!(pending[1].id, second.id);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let db = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        let queued = item("equipment/eq-1");
        repo.enqueue(&queued).unwrap();

        repo.remove(&queued.id).unwrap();
        assert!(repo.get(&queued.id).unwrap().is_none());

        // Removing again is a no-op, not an error
        repo.remove(&queued.id).unwrap();
    }

    #[test]
    fn test_increment_retry() {
        let db = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        let queued = item("equipment/eq-1");
        repo.enqueue(&queued).unwrap();

        assert_eq!(repo.increment_retry(&queued.id).unwrap(), Some(1));
        assert_eq!(repo.increment_retry(&queued.id).unwrap(), Some(2));

        let fetched = repo.get(&queued.id).unwrap().unwrap();
        assert_eq!(fetched.retry_count, 2);

        // Absent item is a no-op
        assert_eq!(repo.increment_retry(&QueueItemId::new()).unwrap(), None);
    }

    #[test]
    fn test_pending_count() {
        let db = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        assert_eq!(repo.pending_count().unwrap(), 0);
        repo.enqueue(&item("equipment/eq-1")).unwrap();
        repo.enqueue(&item("equipment/eq-2")).unwrap();
        assert_eq!(repo.pending_count().unwrap(), 2);
    }

    #[test]
    fn test_dead_letter_round_trip() {
        let db = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        let mut dropped = item("ports/p-1");
        dropped.retry_count = 3;
        let letter = DeadLetter::from_item(&dropped, "Network error: timeout");
        repo.record_dead_letter(&letter).unwrap();

        let letters = repo.list_dead_letters(10).unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0], letter);

        repo.acknowledge_dead_letter(&letter.id).unwrap();
        assert!(repo.list_dead_letters(10).unwrap().is_empty());
    }

    #[test]
    fn test_dead_letters_newest_first() {
        let db = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        let mut older = DeadLetter::from_item(&item("a/1"), "first");
        let mut newer = DeadLetter::from_item(&item("a/2"), "second");
        older.dropped_at = 100;
        newer.dropped_at = 200;

        repo.record_dead_letter(&older).unwrap();
        repo.record_dead_letter(&newer).unwrap();

        let letters = repo.list_dead_letters(10).unwrap();
        assert_eq!(letters[0].reason, "second");
        assert_eq!(letters[1].reason, "first");
    }
}
