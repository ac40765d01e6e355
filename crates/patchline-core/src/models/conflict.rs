//! Conflict model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;

use super::proposal::{ModificationProposal, ProposalKind};
use super::queue::QueueItemId;

/// A unique identifier for a tracked conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConflictId(Uuid);

impl ConflictId {
    /// Create a new unique conflict ID using UUID v7
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

impl Default for ConflictId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConflictId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Classification of a collision between a local and a server change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    /// Both sides edited the same entity
    Edit,
    /// One side deleted the entity
    Delete,
    /// Mismatched change kinds on the same entity
    Version,
}

impl ConflictKind {
    /// Stable lowercase name used in storage
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Version => "version",
        }
    }

    /// Classify a pair of changes targeting the same entity.
    ///
    /// A delete on either side dominates; two updates are an edit conflict;
    /// anything else is a version conflict.
    #[must_use]
    pub fn classify(local: &ModificationProposal, server: &ModificationProposal) -> Self {
        if local.kind == ProposalKind::Delete || server.kind == ProposalKind::Delete {
            Self::Delete
        } else if local.kind == ProposalKind::Update && server.kind == ProposalKind::Update {
            Self::Edit
        } else {
            Self::Version
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected collision between a locally-queued change and a server change.
///
/// Tracked in memory between detection and resolution; conflicts do not
/// survive a process restart, the queued item simply re-conflicts on the
/// next drain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Unique identifier
    pub id: ConflictId,
    /// Queue item whose replay surfaced the conflict
    pub queue_item: QueueItemId,
    /// The locally-queued change
    pub local: ModificationProposal,
    /// The change already reflected server-side
    pub server: ModificationProposal,
    /// Classification of the collision
    pub kind: ConflictKind,
    /// Detection timestamp (Unix ms)
    pub detected_at: i64,
}

impl Conflict {
    /// Build a classified conflict for a queue item's local/server pair
    #[must_use]
    pub fn new(
        queue_item: QueueItemId,
        local: ModificationProposal,
        server: ModificationProposal,
    ) -> Self {
        let kind = ConflictKind::classify(&local, &server);
        Self {
            id: ConflictId::new(),
            queue_item,
            local,
            server,
            kind,
            detected_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Entity both sides are fighting over
    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.local.entity_id
    }
}

/// Outcome of an automatic resolution attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Replay the local change as queued
    KeepLocal,
    /// Discard the local change; the server version stands
    KeepServer,
    /// Replay with a field-merged payload
    Merged(Value),
    /// No safe automatic answer; a human must decide
    Manual,
}

impl Resolution {
    /// Strategy name recorded in the conflict log
    #[must_use]
    pub const fn strategy(&self) -> &'static str {
        match self {
            Self::KeepLocal => "keep_local",
            Self::KeepServer => "keep_server",
            Self::Merged(_) => "merge",
            Self::Manual => "manual",
        }
    }
}

/// Action a human picked for a conflict the automatic pass could not settle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualAction {
    KeepLocal,
    KeepServer,
    Custom,
}

/// Recorded conflict resolution (durable log row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Log row identifier
    pub id: i64,
    /// Entity involved in the conflict
    pub entity_id: String,
    /// Classification at detection time
    pub kind: ConflictKind,
    /// Resolution strategy name
    pub strategy: String,
    /// Local change timestamp when the conflict occurred
    pub local_updated_at: i64,
    /// Server change timestamp when the conflict occurred
    pub server_updated_at: i64,
    /// Resolution timestamp (Unix ms)
    pub resolved_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn proposal(kind: ProposalKind, ts: i64) -> ModificationProposal {
        ModificationProposal {
            entity_id: "eq-1".to_string(),
            kind,
            old_data: None,
            new_data: Some(json!({"name": "SW-1"})),
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn test_conflict_id_parse() {
        let id = ConflictId::new();
        let parsed: ConflictId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_classify_delete_dominates() {
        let update = proposal(ProposalKind::Update, 100);
        let delete = proposal(ProposalKind::Delete, 100);
        assert_eq!(ConflictKind::classify(&delete, &update), ConflictKind::Delete);
        assert_eq!(ConflictKind::classify(&update, &delete), ConflictKind::Delete);
        assert_eq!(ConflictKind::classify(&delete, &delete), ConflictKind::Delete);
    }

    #[test]
    fn test_classify_double_update_is_edit() {
        let a = proposal(ProposalKind::Update, 100);
        let b = proposal(ProposalKind::Update, 101);
        assert_eq!(ConflictKind::classify(&a, &b), ConflictKind::Edit);
    }

    #[test]
    fn test_classify_mismatched_kinds_are_version() {
        let create = proposal(ProposalKind::Create, 100);
        let update = proposal(ProposalKind::Update, 100);
        let connect = proposal(ProposalKind::Connect, 100);
        assert_eq!(ConflictKind::classify(&create, &update), ConflictKind::Version);
        assert_eq!(ConflictKind::classify(&connect, &update), ConflictKind::Version);
        assert_eq!(ConflictKind::classify(&connect, &connect), ConflictKind::Version);
    }

    #[test]
    fn test_conflict_new_classifies() {
        let conflict = Conflict::new(
            QueueItemId::new(),
            proposal(ProposalKind::Update, 100),
            proposal(ProposalKind::Delete, 150),
        );
        assert_eq!(conflict.kind, ConflictKind::Delete);
        assert_eq!(conflict.entity_id(), "eq-1");
        assert!(conflict.detected_at > 0);
    }

    #[test]
    fn test_resolution_strategy_names() {
        assert_eq!(Resolution::KeepLocal.strategy(), "keep_local");
        assert_eq!(Resolution::KeepServer.strategy(), "keep_server");
        assert_eq!(Resolution::Merged(json!({})).strategy(), "merge");
        assert_eq!(Resolution::Manual.strategy(), "manual");
    }
}
