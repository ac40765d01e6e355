//! Read-cache repository implementation

use std::time::Duration;

use rusqlite::{params, Connection};
use serde_json::Value;

use crate::error::{Error, Result};

/// Trait for time-bounded read caching
///
/// The cache is best-effort: reads degrade to "absent" on any storage
/// problem, and callers must fall back to a live fetch on a miss.
pub trait CacheRepository {
    /// Store a value under `key` for `ttl`
    fn set(&self, key: &str, data: &Value, ttl: Duration) -> Result<()>;

    /// Fetch a value; expired entries are purged and reported absent
    fn get(&self, key: &str) -> Option<Value>;

    /// Remove a single entry; no-op if absent
    fn delete(&self, key: &str) -> Result<()>;

    /// Sweep all expired entries, returning the purged count
    ///
    /// Full-table sweep; intended for periodic maintenance, not per-read.
    fn clear_expired(&self) -> Result<usize>;

    /// Drop every entry, returning the purged count
    fn clear_all(&self) -> Result<usize>;
}

/// `SQLite` implementation of `CacheRepository`
pub struct SqliteCacheRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCacheRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Fetch a value as of `now_ms`, purging it when expired
    pub fn get_at(&self, key: &str, now_ms: i64) -> Option<Value> {
        match self.load_entry(key) {
            Ok(Some((data, expires_at))) => {
                if now_ms > expires_at {
                    // Lazy purge; a failure here still reports absent
                    if let Err(error) = self.delete(key) {
                        tracing::warn!("Failed to purge expired cache entry {key}: {error}");
                    }
                    None
                } else {
                    Some(data)
                }
            }
            Ok(None) => None,
            Err(error) => {
                tracing::warn!("Cache read failed for {key}: {error}");
                None
            }
        }
    }

    fn load_entry(&self, key: &str) -> Result<Option<(Value, i64)>> {
        let result = self.conn.query_row(
            "SELECT data, expires_at FROM cache_entries WHERE key = ?",
            params![key],
            |row| {
                let data: String = row.get(0)?;
                let expires_at: i64 = row.get(1)?;
                Ok((data, expires_at))
            },
        );

        match result {
            Ok((data, expires_at)) => {
                let value = serde_json::from_str(&data)?;
                Ok(Some((value, expires_at)))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl CacheRepository for SqliteCacheRepository<'_> {
    fn set(&self, key: &str, data: &Value, ttl: Duration) -> Result<()> {
        let ttl_ms = i64::try_from(ttl.as_millis())
            .map_err(|_| Error::InvalidInput("Cache TTL too large".into()))?;
        if ttl_ms <= 0 {
            return Err(Error::InvalidInput(
                "Cache TTL must be greater than zero".into(),
            ));
        }

        let now = chrono::Utc::now().timestamp_millis();
        let serialized = serde_json::to_string(data)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO cache_entries (key, data, timestamp, expires_at)
             VALUES (?, ?, ?, ?)",
            params![key, serialized, now, now + ttl_ms],
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, chrono::Utc::now().timestamp_millis())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM cache_entries WHERE key = ?", params![key])?;
        Ok(())
    }

    fn clear_expired(&self) -> Result<usize> {
        let now = chrono::Utc::now().timestamp_millis();
        let purged = self.conn.execute(
            "DELETE FROM cache_entries WHERE expires_at <= ?",
            params![now],
        )?;
        Ok(purged)
    }

    fn clear_all(&self) -> Result<usize> {
        let purged = self.conn.execute("DELETE FROM cache_entries", [])?;
        Ok(purged)
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

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_set_and_get() {
        let db = setup();
        let cache = SqliteCacheRepository::new(db.connection());

        cache
            .set("equipment/eq-1", &json!({"name": "SW-1"}), HOUR)
            .unwrap();

        let value = cache.get("equipment/eq-1").unwrap();
        assert_eq!(value, json!({"name": "SW-1"}));
    }

    #[test]
    fn test_get_missing_is_absent() {
        let db = setup();
        let cache = SqliteCacheRepository::new(db.connection());
        assert!(cache.get("nope").is_none());
    }

    #[test]
    fn test_expired_entry_is_absent_and_purged() {
        let db = setup();
        let cache = SqliteCacheRepository::new(db.connection());

        cache.set("racks/r-1", &json!({"units": 42}), HOUR).unwrap();

        // Well past the hour: absent, and the row is gone afterwards
        let later = chrono::Utc::now().timestamp_millis() + 2 * 3600 * 1000;
        assert!(cache.get_at("racks/r-1", later).is_none());

        let remaining: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_entry_at_exact_expiry_is_still_served() {
        let db = setup();
        let cache = SqliteCacheRepository::new(db.connection());

        cache.set("k", &json!(1), HOUR).unwrap();
        let expires_at: i64 = db
            .connection()
            .query_row(
                "SELECT expires_at FROM cache_entries WHERE key = 'k'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert!(cache.get_at("k", expires_at).is_some());
        assert!(cache.get_at("k", expires_at + 1).is_none());
    }

    #[test]
    fn test_set_rejects_zero_ttl() {
        let db = setup();
        let cache = SqliteCacheRepository::new(db.connection());
        let result = cache.set("k", &json!(1), Duration::ZERO);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_delete() {
        let db = setup();
        let cache = SqliteCacheRepository::new(db.connection());

        cache.set("k", &json!(1), HOUR).unwrap();
        cache.delete("k").unwrap();
        assert!(cache.get("k").is_none());

        // Deleting again is a no-op
        cache.delete("k").unwrap();
    }

    #[test]
    fn test_clear_expired_sweeps_only_stale_rows() {
        let db = setup();
        let cache = SqliteCacheRepository::new(db.connection());

        cache.set("fresh", &json!(1), HOUR).unwrap();
        cache.set("stale", &json!(2), HOUR).unwrap();
        db.connection()
            .execute("UPDATE cache_entries SET expires_at = 1 WHERE key = 'stale'", [])
            .unwrap();

        assert_eq!(cache.clear_expired().unwrap(), 1);
        assert!(cache.get("fresh").is_some());
        assert!(cache.get("stale").is_none());
    }

    #[test]
    fn test_clear_all() {
        let db = setup();
        let cache = SqliteCacheRepository::new(db.connection());

        cache.set("a", &json!(1), HOUR).unwrap();
        cache.set("b", &json!(2), HOUR).unwrap();

        assert_eq!(cache.clear_all().unwrap(), 2);
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_set_overwrites_existing_key() {
        let db = setup();
        let cache = SqliteCacheRepository::new(db.connection());

        cache.set("k", &json!({"v": 1}), HOUR).unwrap();
        cache.set("k", &json!({"v": 2}), HOUR).unwrap();

        assert_eq!(cache.get("k").unwrap(), json!({"v": 2}));
    }
}
