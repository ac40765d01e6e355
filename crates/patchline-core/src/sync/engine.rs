//! Drain engine: replays queued mutations when connectivity allows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::db::{
    ConflictLogRepository, Database, QueueRepository, SqliteConflictLogRepository,
    SqliteQueueRepository, SqliteStateRepository, StateRepository,
};
use crate::error::{Error, Result};
use crate::models::{
    is_valid_target, Conflict, ConflictId, ConflictRecord, DeadLetter, ManualAction,
    ModificationProposal, MutationKind, QueueItem, QueueItemId, Resolution,
};
use crate::state::SyncStatus;
use crate::util::unix_millis_now;

use super::client::{ReplayClient, ReplayError};
use super::network::NetworkMonitor;
use super::resolver::ConflictResolver;
use super::SyncOptions;

/// Result of one drain pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items the pass looked at before stopping
    pub attempted: usize,
    /// Items settled (replayed successfully or resolved in the server's favor)
    pub succeeded: usize,
    /// Items that did not settle this pass
    pub failed: usize,
    /// Items dropped after exhausting their retry budget (subset of `failed`)
    pub dropped: Vec<QueueItemId>,
    /// Conflicts settled automatically during the pass
    pub conflicts_resolved: usize,
    /// Conflicts left waiting for a human decision
    pub conflicts_pending: usize,
    /// Connectivity was lost between items; the rest stay queued
    pub stopped_early: bool,
}

impl DrainReport {
    /// Whether the pass settled everything it snapshotted
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed == 0 && self.conflicts_pending == 0 && !self.stopped_early
    }

    /// Human-readable outcome summary
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!("{} succeeded, {} failed", self.succeeded, self.failed);
        if self.conflicts_pending > 0 {
            summary.push_str(&format!(", {} conflicts pending", self.conflicts_pending));
        }
        if self.stopped_early {
            summary.push_str(", interrupted");
        }
        summary
    }
}

/// Outcome of a drain request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// A pass ran to its stop condition
    Completed(DrainReport),
    /// A pass was already running; the request was ignored
    AlreadyRunning,
    /// Offline; nothing to do until connectivity returns
    Offline,
}

/// Clears the syncing flag on every exit path of a drain pass
struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Transient status fields; reset on restart
#[derive(Debug, Default)]
struct TransientStatus {
    last_sync: Option<i64>,
    sync_error: Option<String>,
}

/// Orchestrates draining the queue against the remote API.
///
/// All queue and status mutation funnels through this type; at most one
/// drain pass runs at a time and replays within a pass are sequential, in
/// enqueue order.
pub struct SyncEngine<C: ReplayClient> {
    db: Database,
    client: C,
    monitor: Arc<NetworkMonitor>,
    options: SyncOptions,
    resolver: Mutex<ConflictResolver>,
    syncing: AtomicBool,
    transient: Mutex<TransientStatus>,
}

impl<C: ReplayClient> SyncEngine<C> {
    /// Create an engine over an opened database.
    ///
    /// Loads the persisted `last_sync` and refreshes the pending summary
    /// from the queue (the queue table is authoritative after a restart).
    pub fn new(
        db: Database,
        client: C,
        monitor: Arc<NetworkMonitor>,
        options: SyncOptions,
    ) -> Result<Self> {
        let persisted = SqliteStateRepository::new(db.connection()).load()?;
        let pending: Vec<QueueItemId> = SqliteQueueRepository::new(db.connection())
            .list_pending()?
            .iter()
            .map(|item| item.id)
            .collect();
        SqliteStateRepository::new(db.connection()).save_pending(&pending)?;

        let resolver = ConflictResolver::new(options.tolerance);

        Ok(Self {
            db,
            client,
            monitor,
            options,
            resolver: Mutex::new(resolver),
            syncing: AtomicBool::new(false),
            transient: Mutex::new(TransientStatus {
                last_sync: persisted.last_sync,
                sync_error: None,
            }),
        })
    }

    /// Connectivity monitor feeding this engine
    #[must_use]
    pub fn monitor(&self) -> &NetworkMonitor {
        &self.monitor
    }

    /// Replay client used by this engine
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    fn queue(&self) -> SqliteQueueRepository<'_> {
        SqliteQueueRepository::new(self.db.connection())
    }

    fn conflict_log(&self) -> SqliteConflictLogRepository<'_> {
        SqliteConflictLogRepository::new(self.db.connection())
    }

    /// Queue a mutation for replay once connectivity allows.
    ///
    /// Storage failures propagate: the caller must know when a mutation was
    /// not safely queued.
    pub fn enqueue(
        &self,
        method: MutationKind,
        target: &str,
        payload: Value,
        max_retries: Option<u32>,
    ) -> Result<QueueItem> {
        if !is_valid_target(target) {
            return Err(Error::InvalidInput(format!("Invalid target path: {target}")));
        }

        let item = QueueItem::new(
            method,
            target,
            payload,
            max_retries.unwrap_or(self.options.default_max_retries),
        );
        self.queue().enqueue(&item)?;
        self.persist_pending()?;
        tracing::debug!("Queued {} {}", item.method, item.target);
        Ok(item)
    }

    /// Queued mutations in replay order
    pub fn pending(&self) -> Result<Vec<QueueItem>> {
        self.queue().list_pending()
    }

    /// Dropped mutations awaiting acknowledgement, newest first
    pub fn dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>> {
        self.queue().list_dead_letters(limit)
    }

    /// Acknowledge a dropped mutation
    pub fn acknowledge_dead_letter(&self, id: &QueueItemId) -> Result<()> {
        self.queue().acknowledge_dead_letter(id)
    }

    /// Point-in-time status snapshot
    pub async fn status(&self) -> Result<SyncStatus> {
        let pending: Vec<QueueItemId> = self
            .queue()
            .list_pending()?
            .iter()
            .map(|item| item.id)
            .collect();
        let transient = self.transient.lock().await;
        Ok(SyncStatus {
            is_online: self.monitor.is_online(),
            is_syncing: self.syncing.load(Ordering::Acquire),
            last_sync: transient.last_sync,
            sync_error: transient.sync_error.clone(),
            pending_changes: pending,
        })
    }

    /// Request an immediate drain.
    ///
    /// A no-op while another pass is running or while offline.
    pub async fn force_sync(&self) -> Result<DrainOutcome> {
        if !self.monitor.is_online() {
            return Ok(DrainOutcome::Offline);
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Drain already running; trigger ignored");
            return Ok(DrainOutcome::AlreadyRunning);
        }
        let _guard = SyncingGuard(&self.syncing);

        let report = self.drain().await?;
        Ok(DrainOutcome::Completed(report))
    }

    /// React to connectivity transitions until the caller stops the future.
    ///
    /// On each offline→online edge: wait out the debounce, re-check that the
    /// connection held, then drain.
    pub async fn run(&self) -> Result<()> {
        let mut rx = self.monitor.subscribe();

        if self.monitor.is_online() {
            self.log_outcome(self.force_sync().await);
        }

        loop {
            if rx.changed().await.is_err() {
                return Ok(());
            }
            let online = *rx.borrow_and_update();
            if !online {
                continue;
            }
            tokio::time::sleep(self.options.reconnect_debounce).await;
            if !self.monitor.is_online() {
                tracing::debug!("Reconnect did not hold; skipping drain");
                continue;
            }
            self.log_outcome(self.force_sync().await);
        }
    }

    fn log_outcome(&self, outcome: Result<DrainOutcome>) {
        match outcome {
            Ok(DrainOutcome::Completed(report)) => {
                tracing::info!("Drain finished: {}", report.summary());
            }
            Ok(DrainOutcome::AlreadyRunning | DrainOutcome::Offline) => {}
            Err(error) => tracing::error!("Drain failed: {error}"),
        }
    }

    /// Conflicts awaiting a human decision, oldest first
    pub async fn pending_conflicts(&self) -> Vec<Conflict> {
        self.resolver.lock().await.pending_conflicts()
    }

    /// Number of conflicts awaiting a human decision
    pub async fn conflict_count(&self) -> usize {
        self.resolver.lock().await.conflict_count()
    }

    /// Resolved-conflict history, newest first
    pub fn conflict_history(&self, limit: usize) -> Result<Vec<ConflictRecord>> {
        self.conflict_log().list(limit)
    }

    /// Apply a human decision to a tracked conflict.
    ///
    /// Returns `true` when the queued mutation was settled (replayed or
    /// discarded); `false` when a replay failed and the item stays queued
    /// under the ordinary retry policy.
    pub async fn resolve_conflict(
        &self,
        id: ConflictId,
        action: ManualAction,
        custom_data: Option<Value>,
    ) -> Result<bool> {
        let (conflict, resolution) = self
            .resolver
            .lock()
            .await
            .manual_resolve(id, action, custom_data)?;

        let strategy = match action {
            ManualAction::KeepLocal => "manual_keep_local",
            ManualAction::KeepServer => "manual_keep_server",
            ManualAction::Custom => "manual_custom",
        };

        let settled = match resolution {
            Resolution::KeepServer => {
                self.queue().remove(&conflict.queue_item)?;
                true
            }
            Resolution::KeepLocal => {
                let Some(item) = self.queue().get(&conflict.queue_item)? else {
                    return Err(Error::NotFound(format!(
                        "Queue item {}",
                        conflict.queue_item
                    )));
                };
                let payload = item.payload.clone();
                self.replay_settled(&item, payload).await?
            }
            Resolution::Merged(payload) => {
                let Some(item) = self.queue().get(&conflict.queue_item)? else {
                    return Err(Error::NotFound(format!(
                        "Queue item {}",
                        conflict.queue_item
                    )));
                };
                self.replay_settled(&item, payload).await?
            }
            Resolution::Manual => false,
        };

        if let Err(error) = self.conflict_log().record(&conflict, strategy) {
            tracing::warn!("Failed to record conflict resolution: {error}");
        }
        self.persist_pending()?;
        Ok(settled)
    }

    /// Replay an item with a decided payload; failure falls back to the
    /// retry policy and leaves the item queued
    async fn replay_settled(&self, item: &QueueItem, payload: Value) -> Result<bool> {
        match self
            .client
            .replay(item.method, &item.target, &payload)
            .await
        {
            Ok(_) => {
                self.queue().remove(&item.id)?;
                Ok(true)
            }
            Err(error) => {
                tracing::warn!("Replay of resolved {} failed: {error}", item.target);
                self.queue().increment_retry(&item.id)?;
                Ok(false)
            }
        }
    }

    /// One pass over the queue as snapshotted at start.
    ///
    /// Items added mid-pass wait for the next trigger, which bounds the
    /// pass. Offline detected between items stops the pass early.
    async fn drain(&self) -> Result<DrainReport> {
        let items = self.queue().list_pending()?;
        tracing::info!("Starting drain of {} queued mutations", items.len());

        let mut report = DrainReport::default();
        let total = items.len();

        for item in &items {
            if !self.monitor.is_online() {
                report.stopped_early = true;
                tracing::info!(
                    "Connectivity lost; {} items stay queued",
                    total - report.attempted
                );
                break;
            }
            report.attempted += 1;
            self.replay_item(item, &mut report).await;
        }

        self.finish_pass(&report).await?;
        Ok(report)
    }

    /// Replay one item and record its terminal outcome for this pass
    async fn replay_item(&self, item: &QueueItem, report: &mut DrainReport) {
        match self
            .client
            .replay(item.method, &item.target, &item.payload)
            .await
        {
            Ok(_) => {
                if let Err(error) = self.queue().remove(&item.id) {
                    tracing::error!("Replayed {} but failed to dequeue: {error}", item.target);
                    report.failed += 1;
                } else {
                    report.succeeded += 1;
                }
            }
            Err(ReplayError::Conflict(server)) => {
                self.handle_conflict(item, *server, report).await;
            }
            Err(error) => {
                self.record_failure(item, &error.to_string(), report);
            }
        }
    }

    /// Count a failed replay, dropping the item once its budget is spent
    fn record_failure(&self, item: &QueueItem, reason: &str, report: &mut DrainReport) {
        report.failed += 1;
        let queue = self.queue();
        match queue.increment_retry(&item.id) {
            Ok(Some(count)) if count >= item.max_retries => {
                let mut dropped = item.clone();
                dropped.retry_count = count;
                let letter = DeadLetter::from_item(&dropped, reason);
                if let Err(error) = queue.record_dead_letter(&letter) {
                    tracing::error!("Failed to record dropped mutation: {error}");
                }
                if let Err(error) = queue.remove(&item.id) {
                    tracing::error!("Failed to drop {}: {error}", item.target);
                }
                report.dropped.push(item.id);
                tracing::warn!(
                    "Dropped {} {} after {count} failed attempts: {reason}",
                    item.method,
                    item.target
                );
            }
            Ok(Some(count)) => {
                tracing::debug!(
                    "Replay of {} failed ({count}/{}): {reason}",
                    item.target,
                    item.max_retries
                );
            }
            Ok(None) => {}
            Err(error) => {
                tracing::error!("Failed to update retry count for {}: {error}", item.target);
            }
        }
    }

    /// Route a server-reported collision through the resolver
    async fn handle_conflict(
        &self,
        item: &QueueItem,
        server: ModificationProposal,
        report: &mut DrainReport,
    ) {
        let local = ModificationProposal::from_queue_item(item);
        let detected = self
            .resolver
            .lock()
            .await
            .detect(item.id, &local, &server);

        let Some(conflict) = detected else {
            // Changes too far apart for the tolerance window; fall back to
            // the ordinary retry path
            self.record_failure(item, "Conflicting server change", report);
            return;
        };

        // Bind before matching so the resolver guard is released; the
        // Manual arm needs to take it again
        let resolution = self.resolver.lock().await.auto_resolve(&conflict);
        match resolution {
            Resolution::KeepServer => {
                // The server version stands; discard without replaying
                if let Err(error) = self.queue().remove(&item.id) {
                    tracing::error!("Failed to discard {}: {error}", item.target);
                    report.failed += 1;
                    return;
                }
                self.record_resolution(&conflict, "keep_server");
                report.conflicts_resolved += 1;
                report.succeeded += 1;
            }
            Resolution::KeepLocal => {
                self.replay_resolved(item, &conflict, item.payload.clone(), "keep_local", report)
                    .await;
            }
            Resolution::Merged(payload) => {
                self.replay_resolved(item, &conflict, payload, "merge", report)
                    .await;
            }
            Resolution::Manual => {
                self.resolver.lock().await.register(conflict);
                report.conflicts_pending += 1;
            }
        }
    }

    /// Replay once more with the resolved payload; a second failure goes
    /// back to the ordinary retry path
    async fn replay_resolved(
        &self,
        item: &QueueItem,
        conflict: &Conflict,
        payload: Value,
        strategy: &str,
        report: &mut DrainReport,
    ) {
        match self
            .client
            .replay(item.method, &item.target, &payload)
            .await
        {
            Ok(_) => {
                if let Err(error) = self.queue().remove(&item.id) {
                    tracing::error!("Replayed {} but failed to dequeue: {error}", item.target);
                    report.failed += 1;
                    return;
                }
                self.record_resolution(conflict, strategy);
                report.conflicts_resolved += 1;
                report.succeeded += 1;
            }
            Err(error) => self.record_failure(item, &error.to_string(), report),
        }
    }

    fn record_resolution(&self, conflict: &Conflict, strategy: &str) {
        tracing::info!(
            "Resolved {} conflict on {} via {strategy}",
            conflict.kind,
            conflict.entity_id()
        );
        if let Err(error) = self.conflict_log().record(conflict, strategy) {
            tracing::warn!("Failed to record conflict resolution: {error}");
        }
    }

    /// Update transient and persisted status after a pass
    async fn finish_pass(&self, report: &DrainReport) -> Result<()> {
        self.persist_pending()?;

        let mut transient = self.transient.lock().await;
        if report.is_clean() {
            let now = unix_millis_now();
            transient.last_sync = Some(now);
            transient.sync_error = None;
            SqliteStateRepository::new(self.db.connection()).save_last_sync(now)?;
            tracing::info!("Drain complete: {}", report.summary());
        } else if report.stopped_early && report.failed == 0 && report.conflicts_pending == 0 {
            // Interrupted but nothing went wrong; neither a success stamp
            // nor an error is warranted
        } else {
            transient.sync_error = Some(report.summary());
        }
        Ok(())
    }

    /// Refresh the persisted pending summary from the queue
    fn persist_pending(&self) -> Result<()> {
        let pending: Vec<QueueItemId> = self
            .queue()
            .list_pending()?
            .iter()
            .map(|item| item.id)
            .collect();
        SqliteStateRepository::new(self.db.connection()).save_pending(&pending)
    }
}
