use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use patchline_core::db::Database;
use patchline_core::models::{Conflict, ConflictRecord, DeadLetter, QueueItem, QueueItemId};
use patchline_core::sync::{HttpReplayClient, NetworkMonitor, SyncEngine, SyncOptions};
use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;

/// Fallback API base URL for a locally-run inventory server
const DEFAULT_API_URL: &str = "http://127.0.0.1:8480/api";

pub fn resolve_db_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }
    if let Ok(path) = env::var("PATCHLINE_DB_PATH") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::data_dir().map_or_else(
        || PathBuf::from("patchline.db"),
        |dir| dir.join("patchline").join("patchline.db"),
    )
}

pub fn resolve_api_url(cli_url: Option<String>) -> String {
    cli_url
        .or_else(|| env::var("PATCHLINE_API_URL").ok())
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

pub fn open_database(db_path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(Database::open(db_path)?)
}

pub fn open_engine(
    db_path: &Path,
    api_url: &str,
) -> Result<SyncEngine<HttpReplayClient>, CliError> {
    let db = open_database(db_path)?;
    let options = SyncOptions::default();
    let client = HttpReplayClient::new(api_url, options.request_timeout)
        .map_err(|error| CliError::Client(error.to_string()))?;
    let monitor = Arc::new(NetworkMonitor::new(false));
    Ok(SyncEngine::new(db, client, monitor, options)?)
}

pub fn parse_payload(raw: Option<&str>) -> Result<Value, CliError> {
    match raw {
        None => Ok(Value::Object(serde_json::Map::new())),
        Some(text) => {
            serde_json::from_str(text).map_err(|error| CliError::InvalidPayload(error.to_string()))
        }
    }
}

pub fn parse_queue_id(raw: &str) -> Result<QueueItemId, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyId);
    }
    trimmed
        .parse()
        .map_err(|_| CliError::InvalidId(trimmed.to_string()))
}

#[derive(Debug, Serialize)]
pub struct QueueListItem {
    pub id: String,
    pub method: String,
    pub target: String,
    pub payload: Value,
    pub enqueued_at: i64,
    pub relative_time: String,
    pub retry_count: u32,
    pub max_retries: u32,
}

pub fn queue_item_to_list_item(item: &QueueItem) -> QueueListItem {
    QueueListItem {
        id: item.id.as_str(),
        method: item.method.to_string(),
        target: item.target.clone(),
        payload: item.payload.clone(),
        enqueued_at: item.enqueued_at,
        relative_time: relative_time(item.enqueued_at),
        retry_count: item.retry_count,
        max_retries: item.max_retries,
    }
}

pub fn format_queue_lines(items: &[QueueItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let retries = if item.retry_count > 0 {
                format!(" [{}/{} retries]", item.retry_count, item.max_retries)
            } else {
                String::new()
            };
            format!(
                "{}  {:<6} {}  ({}){retries}",
                item.id,
                item.method.to_string(),
                item.target,
                relative_time(item.enqueued_at)
            )
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct DeadLetterItem {
    pub id: String,
    pub method: String,
    pub target: String,
    pub payload: Value,
    pub retry_count: u32,
    pub dropped_at: i64,
    pub dropped_at_iso: String,
    pub reason: String,
}

pub fn dead_letter_to_item(letter: &DeadLetter) -> DeadLetterItem {
    DeadLetterItem {
        id: letter.id.as_str(),
        method: letter.method.to_string(),
        target: letter.target.clone(),
        payload: letter.payload.clone(),
        retry_count: letter.retry_count,
        dropped_at: letter.dropped_at,
        dropped_at_iso: iso_timestamp(letter.dropped_at),
        reason: letter.reason.clone(),
    }
}

pub fn format_dead_letter_lines(letters: &[DeadLetter]) -> Vec<String> {
    letters
        .iter()
        .map(|letter| {
            format!(
                "{}  {:<6} {}  dropped {} after {} attempts: {}",
                letter.id,
                letter.method.to_string(),
                letter.target,
                relative_time(letter.dropped_at),
                letter.retry_count,
                letter.reason
            )
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct ConflictListItem {
    pub id: String,
    pub queue_item: String,
    pub entity_id: String,
    pub kind: String,
    pub local_updated_at: i64,
    pub server_updated_at: i64,
    pub detected_at: i64,
}

pub fn conflict_to_list_item(conflict: &Conflict) -> ConflictListItem {
    ConflictListItem {
        id: conflict.id.as_str(),
        queue_item: conflict.queue_item.as_str(),
        entity_id: conflict.entity_id().to_string(),
        kind: conflict.kind.to_string(),
        local_updated_at: conflict.local.updated_at,
        server_updated_at: conflict.server.updated_at,
        detected_at: conflict.detected_at,
    }
}

pub fn format_conflict_lines(conflicts: &[Conflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<8} {}  (local {}, server {})",
                conflict.id,
                conflict.kind.to_string(),
                conflict.entity_id(),
                relative_time(conflict.local.updated_at),
                relative_time(conflict.server.updated_at)
            )
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct ConflictLogItem {
    pub id: i64,
    pub entity_id: String,
    pub kind: String,
    pub strategy: String,
    pub local_updated_at: i64,
    pub server_updated_at: i64,
    pub resolved_at: i64,
    pub resolved_at_iso: String,
}

pub fn conflict_record_to_item(record: &ConflictRecord) -> ConflictLogItem {
    ConflictLogItem {
        id: record.id,
        entity_id: record.entity_id.clone(),
        kind: record.kind.to_string(),
        strategy: record.strategy.clone(),
        local_updated_at: record.local_updated_at,
        server_updated_at: record.server_updated_at,
        resolved_at: record.resolved_at,
        resolved_at_iso: iso_timestamp(record.resolved_at),
    }
}

pub fn format_conflict_log_lines(records: &[ConflictRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            format!(
                "#{}  {:<8} {}  resolved via {} ({})",
                record.id,
                record.kind.to_string(),
                record.entity_id,
                record.strategy,
                relative_time(record.resolved_at)
            )
        })
        .collect()
}

/// Format a Unix-ms timestamp as RFC 3339, or the raw value when out of range
pub fn iso_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map_or_else(|| millis.to_string(), |dt| dt.to_rfc3339())
}

/// Compact "how long ago" rendering of a Unix-ms timestamp
pub fn relative_time(millis: i64) -> String {
    let now = chrono::Utc::now().timestamp_millis();
    let seconds = (now - millis).max(0) / 1000;
    if seconds < 60 {
        format!("{seconds}s ago")
    } else if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{}h ago", seconds / 3600)
    } else {
        format!("{}d ago", seconds / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchline_core::models::MutationKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parse_payload_defaults_to_empty_object() {
        assert_eq!(parse_payload(None).unwrap(), json!({}));
    }

    #[test]
    fn parse_payload_rejects_invalid_json() {
        assert!(matches!(
            parse_payload(Some("{not json")),
            Err(CliError::InvalidPayload(_))
        ));
    }

    #[test]
    fn parse_queue_id_rejects_empty_and_garbage() {
        assert!(matches!(parse_queue_id("  "), Err(CliError::EmptyId)));
        assert!(matches!(
            parse_queue_id("not-a-uuid"),
            Err(CliError::InvalidId(_))
        ));
    }

    #[test]
    fn relative_time_buckets() {
        let now = chrono::Utc::now().timestamp_millis();
        assert_eq!(relative_time(now - 30 * 1000), "30s ago");
        assert_eq!(relative_time(now - 2 * 60 * 1000), "2m ago");
        assert_eq!(relative_time(now - 2 * 3600 * 1000), "2h ago");
        assert_eq!(relative_time(now - 2 * 86400 * 1000), "2d ago");
    }

    #[test]
    fn format_queue_lines_mentions_retries_only_when_spent() {
        let mut item = QueueItem::new(
            MutationKind::Update,
            "equipment/eq-1",
            json!({"a": 1}),
            3,
        );
        let lines = format_queue_lines(std::slice::from_ref(&item));
        assert!(!lines[0].contains("retries"));

        item.retry_count = 2;
        let lines = format_queue_lines(std::slice::from_ref(&item));
        assert!(lines[0].contains("[2/3 retries]"));
    }

    #[test]
    fn iso_timestamp_renders_rfc3339() {
        assert!(iso_timestamp(1_700_000_000_000).starts_with("2023-11-14T"));
    }
}
