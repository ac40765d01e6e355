//! Queued mutation model

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;

/// Default retry budget for a queued mutation
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// A unique identifier for a queue item, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueItemId(Uuid);

impl QueueItemId {
    /// Create a new unique queue item ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for QueueItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueueItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Mutation verb carried by a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
    Patch,
}

impl MutationKind {
    /// Stable lowercase name used in storage and wire payloads
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Patch => "patch",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "patch" => Ok(Self::Patch),
            other => Err(Error::InvalidInput(format!(
                "Unknown mutation kind: {other}"
            ))),
        }
    }
}

/// A durable record of one not-yet-confirmed mutation.
///
/// Immutable once enqueued except for `retry_count`; removed from the store
/// exactly once, on success or on exhausting `max_retries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Unique identifier assigned at enqueue time
    pub id: QueueItemId,
    /// Mutation verb
    pub method: MutationKind,
    /// Resource path the mutation applies to, e.g. `equipment/eq-1`
    pub target: String,
    /// Opaque mutation body
    pub payload: Value,
    /// Enqueue timestamp (Unix ms); replay order is ascending
    pub enqueued_at: i64,
    /// Failed replay attempts so far
    pub retry_count: u32,
    /// Retry ceiling; the item is dropped and reported once exceeded
    pub max_retries: u32,
}

impl QueueItem {
    /// Create a new queue item with a fresh id and the current timestamp
    #[must_use]
    pub fn new(
        method: MutationKind,
        target: impl Into<String>,
        payload: Value,
        max_retries: u32,
    ) -> Self {
        Self {
            id: QueueItemId::new(),
            method,
            target: target.into(),
            payload,
            enqueued_at: chrono::Utc::now().timestamp_millis(),
            retry_count: 0,
            max_retries,
        }
    }

    /// Entity identifier portion of the target path (the last segment)
    #[must_use]
    pub fn entity_id(&self) -> &str {
        self.target
            .rsplit_once('/')
            .map_or(self.target.as_str(), |(_, id)| id)
    }

    /// Collection portion of the target path (the first segment)
    #[must_use]
    pub fn collection(&self) -> &str {
        self.target
            .split_once('/')
            .map_or(self.target.as_str(), |(collection, _)| collection)
    }
}

/// A queue item dropped after exhausting its retry budget.
///
/// Recorded durably so the failure stays visible until acknowledged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// Identifier of the dropped queue item
    pub id: QueueItemId,
    /// Mutation verb of the dropped item
    pub method: MutationKind,
    /// Resource path of the dropped item
    pub target: String,
    /// Mutation body of the dropped item
    pub payload: Value,
    /// Retry count at drop time
    pub retry_count: u32,
    /// Drop timestamp (Unix ms)
    pub dropped_at: i64,
    /// Last failure summary
    pub reason: String,
}

impl DeadLetter {
    /// Record a dropped queue item with the current timestamp
    #[must_use]
    pub fn from_item(item: &QueueItem, reason: impl Into<String>) -> Self {
        Self {
            id: item.id,
            method: item.method,
            target: item.target.clone(),
            payload: item.payload.clone(),
            retry_count: item.retry_count,
            dropped_at: chrono::Utc::now().timestamp_millis(),
            reason: reason.into(),
        }
    }
}

/// Check that a target is a well-formed resource path.
///
/// Valid targets match `collection/identifier` where the collection is a
/// lowercase word and the identifier is a non-empty token, or a bare
/// collection for creates: `equipment/eq-1`, `connections/c-9`, `equipment`.
#[must_use]
pub fn is_valid_target(target: &str) -> bool {
    static TARGET_RE: OnceLock<Regex> = OnceLock::new();
    let re = TARGET_RE.get_or_init(|| {
        Regex::new(r"^[a-z][a-z0-9_-]*(/[A-Za-z0-9._:-]+)?$").expect("Invalid regex")
    });
    re.is_match(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_queue_item_id_unique() {
        let id1 = QueueItemId::new();
        let id2 = QueueItemId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_queue_item_id_parse() {
        let id = QueueItemId::new();
        let parsed: QueueItemId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_queue_item_new() {
        let item = QueueItem::new(
            MutationKind::Update,
            "equipment/eq-1",
            json!({"name": "SW-1"}),
            DEFAULT_MAX_RETRIES,
        );
        assert_eq!(item.method, MutationKind::Update);
        assert_eq!(item.target, "equipment/eq-1");
        assert_eq!(item.retry_count, 0);
        assert_eq!(item.max_retries, 3);
        assert!(item.enqueued_at > 0);
    }

    #[test]
    fn test_target_segments() {
        let item = QueueItem::new(MutationKind::Delete, "racks/r-12", json!({}), 1);
        assert_eq!(item.collection(), "racks");
        assert_eq!(item.entity_id(), "r-12");

        let bare = QueueItem::new(MutationKind::Create, "equipment", json!({}), 1);
        assert_eq!(bare.collection(), "equipment");
        assert_eq!(bare.entity_id(), "equipment");
    }

    #[test]
    fn test_mutation_kind_round_trip() {
        for kind in [
            MutationKind::Create,
            MutationKind::Update,
            MutationKind::Delete,
            MutationKind::Patch,
        ] {
            let parsed: MutationKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("upsert".parse::<MutationKind>().is_err());
    }

    #[test]
    fn test_is_valid_target() {
        assert!(is_valid_target("equipment/eq-1"));
        assert!(is_valid_target("connections/c_9"));
        assert!(is_valid_target("sites/DC-WEST.01"));
        assert!(is_valid_target("equipment"));
        assert!(!is_valid_target(""));
        assert!(!is_valid_target("/eq-1"));
        assert!(!is_valid_target("equipment/"));
        assert!(!is_valid_target("Equipment/eq-1"));
        assert!(!is_valid_target("a/b/c"));
    }

    #[test]
    fn test_dead_letter_from_item() {
        let mut item = QueueItem::new(MutationKind::Patch, "ports/p-3", json!({"vlan": 7}), 3);
        item.retry_count = 3;
        let letter = DeadLetter::from_item(&item, "Network error: timeout");
        assert_eq!(letter.id, item.id);
        assert_eq!(letter.retry_count, 3);
        assert_eq!(letter.reason, "Network error: timeout");
        assert!(letter.dropped_at >= item.enqueued_at);
    }
}
