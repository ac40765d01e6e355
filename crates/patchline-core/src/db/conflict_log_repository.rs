//! Conflict resolution log repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{Conflict, ConflictKind, ConflictRecord};

/// Trait for the durable log of resolved conflicts
pub trait ConflictLogRepository {
    /// Record a resolution with the given strategy name
    fn record(&self, conflict: &Conflict, strategy: &str) -> Result<()>;

    /// List resolutions, newest first
    fn list(&self, limit: usize) -> Result<Vec<ConflictRecord>>;
}

/// `SQLite` implementation of `ConflictLogRepository`
pub struct SqliteConflictLogRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteConflictLogRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ConflictLogRepository for SqliteConflictLogRepository<'_> {
    fn record(&self, conflict: &Conflict, strategy: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT INTO conflict_log (entity_id, kind, strategy, local_updated_at, server_updated_at, resolved_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                conflict.entity_id(),
                conflict.kind.as_str(),
                strategy,
                conflict.local.updated_at,
                conflict.server.updated_at,
                now
            ],
        )?;
        Ok(())
    }

    fn list(&self, limit: usize) -> Result<Vec<ConflictRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_id, kind, strategy, local_updated_at, server_updated_at, resolved_at
             FROM conflict_log
             ORDER BY resolved_at DESC, id DESC
             LIMIT ?",
        )?;

        let records = stmt
            .query_map(params![limit as i64], |row| {
                let kind: String = row.get(2)?;
                Ok(ConflictRecord {
                    id: row.get(0)?,
                    entity_id: row.get(1)?,
                    kind: match kind.as_str() {
                        "delete" => ConflictKind::Delete,
                        "version" => ConflictKind::Version,
                        _ => ConflictKind::Edit,
                    },
                    strategy: row.get(3)?,
                    local_updated_at: row.get(4)?,
                    server_updated_at: row.get(5)?,
                    resolved_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ModificationProposal, ProposalKind, QueueItemId};
    use serde_json::json;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn conflict(local_ts: i64, server_ts: i64) -> Conflict {
        let local = ModificationProposal {
            entity_id: "eq-1".to_string(),
            kind: ProposalKind::Update,
            old_data: None,
            new_data: Some(json!({"ipAddress": "192.168.1.2"})),
            created_at: local_ts,
            updated_at: local_ts,
        };
        let server = ModificationProposal {
            entity_id: "eq-1".to_string(),
            kind: ProposalKind::Delete,
            old_data: None,
            new_data: None,
            created_at: server_ts,
            updated_at: server_ts,
        };
        Conflict::new(QueueItemId::new(), local, server)
    }

    #[test]
    fn test_record_and_list() {
        let db = setup();
        let log = SqliteConflictLogRepository::new(db.connection());

        log.record(&conflict(100, 150), "keep_server").unwrap();

        let records = log.list(10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity_id, "eq-1");
        assert_eq!(records[0].kind, ConflictKind::Delete);
        assert_eq!(records[0].strategy, "keep_server");
        assert_eq!(records[0].local_updated_at, 100);
        assert_eq!(records[0].server_updated_at, 150);
    }

    #[test]
    fn test_list_newest_first_with_limit() {
        let db = setup();
        let log = SqliteConflictLogRepository::new(db.connection());

        for i in 0..5 {
            log.record(&conflict(i, i + 1), "keep_server").unwrap();
        }

        let records = log.list(3).unwrap();
        assert_eq!(records.len(), 3);
        // Same resolved_at millisecond is possible; row id breaks the tie
        assert!(records[0].id > records[1].id);
        assert!(records[1].id > records[2].id);
    }
}
