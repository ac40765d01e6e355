//! Modification proposal model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

use super::queue::{MutationKind, QueueItem};

/// Kind of change a proposal describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalKind {
    Create,
    Update,
    Delete,
    Connect,
    Disconnect,
}

impl ProposalKind {
    /// Stable lowercase name used in storage and wire payloads
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for ProposalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "connect" => Ok(Self::Connect),
            "disconnect" => Ok(Self::Disconnect),
            other => Err(Error::InvalidInput(format!(
                "Unknown proposal kind: {other}"
            ))),
        }
    }
}

/// A proposed change to one inventory entity.
///
/// Produced by the modification workflow; the sync engine derives one from
/// each queued mutation for conflict detection, and the server reports its
/// own view in the same shape when it rejects a replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationProposal {
    /// Entity the change applies to
    pub entity_id: String,
    /// Kind of change
    pub kind: ProposalKind,
    /// Snapshot of the entity before the change, if known
    #[serde(default)]
    pub old_data: Option<Value>,
    /// Proposed entity fields
    #[serde(default)]
    pub new_data: Option<Value>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl ModificationProposal {
    /// Derive the local proposal a queued mutation stands for.
    ///
    /// Mutations against the `connections` collection describe link changes:
    /// a create is a connect and a delete is a disconnect.
    #[must_use]
    pub fn from_queue_item(item: &QueueItem) -> Self {
        let connection = item.collection() == "connections";
        let kind = match item.method {
            MutationKind::Create if connection => ProposalKind::Connect,
            MutationKind::Create => ProposalKind::Create,
            MutationKind::Update | MutationKind::Patch => ProposalKind::Update,
            MutationKind::Delete if connection => ProposalKind::Disconnect,
            MutationKind::Delete => ProposalKind::Delete,
        };

        let new_data = match item.method {
            MutationKind::Delete => None,
            _ => Some(item.payload.clone()),
        };

        Self {
            entity_id: item.entity_id().to_string(),
            kind,
            old_data: None,
            new_data,
            created_at: item.enqueued_at,
            updated_at: item.enqueued_at,
        }
    }

    /// Whether this proposal removes its entity (or tears down a link)
    #[must_use]
    pub const fn is_destructive(&self) -> bool {
        matches!(self.kind, ProposalKind::Delete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::queue::MutationKind;
    use serde_json::json;

    fn item(method: MutationKind, target: &str) -> QueueItem {
        QueueItem::new(method, target, json!({"portA": "p-1"}), 3)
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            ProposalKind::Create,
            ProposalKind::Update,
            ProposalKind::Delete,
            ProposalKind::Connect,
            ProposalKind::Disconnect,
        ] {
            let parsed: ProposalKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("merge".parse::<ProposalKind>().is_err());
    }

    #[test]
    fn test_from_queue_item_entity_mutations() {
        let create = ModificationProposal::from_queue_item(&item(MutationKind::Create, "equipment"));
        assert_eq!(create.kind, ProposalKind::Create);

        let update =
            ModificationProposal::from_queue_item(&item(MutationKind::Update, "equipment/eq-1"));
        assert_eq!(update.kind, ProposalKind::Update);
        assert_eq!(update.entity_id, "eq-1");
        assert!(update.new_data.is_some());

        let patch =
            ModificationProposal::from_queue_item(&item(MutationKind::Patch, "equipment/eq-1"));
        assert_eq!(patch.kind, ProposalKind::Update);

        let delete =
            ModificationProposal::from_queue_item(&item(MutationKind::Delete, "equipment/eq-1"));
        assert_eq!(delete.kind, ProposalKind::Delete);
        assert!(delete.new_data.is_none());
        assert!(delete.is_destructive());
    }

    #[test]
    fn test_from_queue_item_connection_mutations() {
        let connect =
            ModificationProposal::from_queue_item(&item(MutationKind::Create, "connections/c-1"));
        assert_eq!(connect.kind, ProposalKind::Connect);

        let disconnect =
            ModificationProposal::from_queue_item(&item(MutationKind::Delete, "connections/c-1"));
        assert_eq!(disconnect.kind, ProposalKind::Disconnect);
        assert!(!disconnect.is_destructive());
    }

    #[test]
    fn test_proposal_timestamps_follow_enqueue_time() {
        let queued = item(MutationKind::Update, "ports/p-2");
        let proposal = ModificationProposal::from_queue_item(&queued);
        assert_eq!(proposal.created_at, queued.enqueued_at);
        assert_eq!(proposal.updated_at, queued.enqueued_at);
    }
}
