//! Data models for patchline

mod conflict;
mod proposal;
mod queue;

pub use conflict::{
    Conflict, ConflictId, ConflictKind, ConflictRecord, ManualAction, Resolution,
};
pub use proposal::{ModificationProposal, ProposalKind};
pub use queue::{
    is_valid_target, DeadLetter, MutationKind, QueueItem, QueueItemId, DEFAULT_MAX_RETRIES,
};
