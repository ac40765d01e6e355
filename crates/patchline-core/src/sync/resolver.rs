//! Conflict detection and resolution.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::{
    Conflict, ConflictId, ConflictKind, ManualAction, ModificationProposal, QueueItemId,
    Resolution,
};

/// Default span within which two changes to the same entity are treated as
/// possibly conflicting. Deliberately narrow; see `with_tolerance` on
/// [`super::SyncOptions`] to tune it.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(1);

/// Classifies collisions between local and server changes and resolves them.
///
/// Unresolved conflicts are tracked in memory only: a restart loses them,
/// and the queued item re-conflicts on the next drain.
pub struct ConflictResolver {
    tolerance_ms: i64,
    pending: HashMap<ConflictId, Conflict>,
}

impl ConflictResolver {
    /// Create a resolver with the given tolerance window
    #[must_use]
    pub fn new(tolerance: Duration) -> Self {
        Self {
            tolerance_ms: i64::try_from(tolerance.as_millis()).unwrap_or(i64::MAX),
            pending: HashMap::new(),
        }
    }

    /// Detect whether a local/server pair is a conflict.
    ///
    /// Both changes must target the same entity and their timestamps must
    /// fall within the tolerance window; otherwise the pair is not treated
    /// as conflicting and the caller falls back to its ordinary failure
    /// handling.
    #[must_use]
    pub fn detect(
        &self,
        queue_item: QueueItemId,
        local: &ModificationProposal,
        server: &ModificationProposal,
    ) -> Option<Conflict> {
        if local.entity_id != server.entity_id {
            return None;
        }
        if (local.updated_at - server.updated_at).abs() > self.tolerance_ms {
            return None;
        }
        Some(Conflict::new(queue_item, local.clone(), server.clone()))
    }

    /// Attempt an automatic resolution.
    ///
    /// Deletions are authoritative (never resurrect a deleted entity);
    /// version conflicts go to the latest timestamp with the server winning
    /// ties; edit conflicts get a field-level merge that refuses to guess on
    /// a true collision.
    #[must_use]
    pub fn auto_resolve(&self, conflict: &Conflict) -> Resolution {
        match conflict.kind {
            ConflictKind::Delete => Resolution::KeepServer,
            ConflictKind::Version => {
                if conflict.local.updated_at > conflict.server.updated_at {
                    Resolution::KeepLocal
                } else {
                    Resolution::KeepServer
                }
            }
            ConflictKind::Edit => {
                match merge_fields(
                    conflict.local.new_data.as_ref(),
                    conflict.server.new_data.as_ref(),
                ) {
                    Some(merged) => Resolution::Merged(merged),
                    None => Resolution::Manual,
                }
            }
        }
    }

    /// Track a conflict awaiting a human decision
    pub fn register(&mut self, conflict: Conflict) {
        tracing::info!(
            "Conflict on {} ({}) needs manual resolution",
            conflict.entity_id(),
            conflict.kind
        );
        self.pending.insert(conflict.id, conflict);
    }

    /// Resolve a tracked conflict with an explicit action.
    ///
    /// Removes the conflict from the pending collection and returns it with
    /// the resolution to apply. `Custom` requires `custom_data`.
    pub fn manual_resolve(
        &mut self,
        id: ConflictId,
        action: ManualAction,
        custom_data: Option<Value>,
    ) -> Result<(Conflict, Resolution)> {
        if action == ManualAction::Custom && custom_data.is_none() {
            return Err(Error::InvalidInput(
                "Custom resolution requires a payload".into(),
            ));
        }

        let conflict = self
            .pending
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("Conflict {id}")))?;

        let resolution = match action {
            ManualAction::KeepLocal => Resolution::KeepLocal,
            ManualAction::KeepServer => Resolution::KeepServer,
            ManualAction::Custom => {
                Resolution::Merged(custom_data.unwrap_or(Value::Null))
            }
        };

        Ok((conflict, resolution))
    }

    /// Conflicts awaiting a decision, oldest first
    #[must_use]
    pub fn pending_conflicts(&self) -> Vec<Conflict> {
        let mut conflicts: Vec<Conflict> = self.pending.values().cloned().collect();
        conflicts.sort_by_key(|conflict| conflict.detected_at);
        conflicts
    }

    /// Number of conflicts awaiting a decision
    #[must_use]
    pub fn conflict_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

/// Field-level merge of two object payloads.
///
/// Starts from the server's fields; local fields absent server-side are
/// taken, equal fields kept, and any true collision aborts the merge.
/// Non-object payloads never merge.
fn merge_fields(local: Option<&Value>, server: Option<&Value>) -> Option<Value> {
    let local = local?.as_object()?;
    let server = server?.as_object()?;

    let mut merged: Map<String, Value> = server.clone();
    for (key, local_value) in local {
        match server.get(key) {
            None => {
                merged.insert(key.clone(), local_value.clone());
            }
            Some(server_value) if server_value == local_value => {}
            Some(_) => return None,
        }
    }

    Some(Value::Object(merged))
}
