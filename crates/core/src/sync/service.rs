//! Sync service
//!
//! Front door for the sync logic: serializes all work per mapping so two
//! concurrent syncs can never race each other into a lost update, and runs
//! batches with per-item error isolation.

use std::collections::HashMap;
use std::sync::Arc;

use aqademiq_domain::{
    AqademiqError, BatchReport, MergePatch, RemoteEvent, ResolutionStrategy, Result, SyncAction,
    SyncConflict,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::change_detector::ChangeDetector;
use super::conflict_resolver::ConflictResolver;
use super::ports::{EntityStore, MappingStore, RemoteCalendar};

type LockRegistry = Mutex<HashMap<String, Arc<Mutex<()>>>>;

/// Orchestrates classification and resolution with per-mapping serialization.
pub struct SyncService {
    detector: ChangeDetector,
    resolver: ConflictResolver,
    mappings: Arc<dyn MappingStore>,
    locks: LockRegistry,
}

impl SyncService {
    pub fn new(
        mappings: Arc<dyn MappingStore>,
        entities: Arc<dyn EntityStore>,
        remote: Arc<dyn RemoteCalendar>,
    ) -> Self {
        Self {
            detector: ChangeDetector::new(Arc::clone(&mappings), Arc::clone(&entities)),
            resolver: ConflictResolver::new(Arc::clone(&mappings), entities, remote),
            mappings,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Classify one inbound remote event under the per-mapping lock.
    pub async fn process_event(&self, user_id: &str, event: &RemoteEvent) -> Result<SyncAction> {
        let lock = self.lock_for(user_id, &event.id).await;
        let _guard = lock.lock().await;
        self.detector.classify(user_id, event).await
    }

    /// Resolve a conflict under the same per-mapping lock classification
    /// uses, so a resolve can never interleave with a classify for one
    /// mapping.
    pub async fn resolve_conflict(
        &self,
        conflict_id: &str,
        strategy: ResolutionStrategy,
        merge: Option<&MergePatch>,
    ) -> Result<()> {
        let conflict = self
            .mappings
            .get_conflict(conflict_id)
            .await?
            .ok_or_else(|| AqademiqError::NotFound(format!("conflict {conflict_id}")))?;
        let mapping = self
            .mappings
            .get_mapping(&conflict.mapping_id)
            .await?
            .ok_or_else(|| {
                AqademiqError::NotFound(format!("mapping {}", conflict.mapping_id))
            })?;

        let lock = self.lock_for(&mapping.user_id, &mapping.remote_event_id).await;
        let _guard = lock.lock().await;
        self.resolver.resolve(conflict_id, strategy, merge).await
    }

    /// Process a poll batch sequentially.
    ///
    /// Item failures are isolated: malformed payloads are skipped and
    /// logged, item-level errors are counted, and only a systemic mapping
    /// store failure aborts the whole batch. Cancellation is checked
    /// between items; each item commits its own mapping update, so stopping
    /// between items loses nothing.
    #[instrument(skip(self, events, cancel), fields(user_id, batch_len = events.len()))]
    pub async fn process_batch(
        &self,
        user_id: &str,
        events: &[RemoteEvent],
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::default();

        for event in events {
            if cancel.is_cancelled() {
                info!(processed = report.processed, "batch cancelled between items");
                report.cancelled = true;
                break;
            }

            match self.process_event(user_id, event).await {
                Ok(action) => report.record(&action),
                Err(AqademiqError::Validation(reason)) => {
                    warn!(remote_event_id = %event.id, reason, "skipping malformed remote event");
                    report.skipped_invalid += 1;
                }
                Err(err) if err.is_store_failure() => {
                    error!(
                        remote_event_id = %event.id,
                        error = %err,
                        "mapping store failure, aborting batch"
                    );
                    return Err(err);
                }
                Err(err) => {
                    warn!(remote_event_id = %event.id, error = %err, "failed to process event");
                    report.failed += 1;
                }
            }
        }

        info!(
            created = report.created,
            updated_local = report.updated_local,
            deferred = report.deferred,
            conflicts = report.conflicts,
            noops = report.noops,
            skipped_invalid = report.skipped_invalid,
            failed = report.failed,
            "batch completed"
        );
        Ok(report)
    }

    /// Pending conflicts for a user, for the manual-resolution surface.
    pub async fn pending_conflicts(&self, user_id: &str) -> Result<Vec<SyncConflict>> {
        self.mappings.pending_conflicts(user_id).await
    }

    async fn lock_for(&self, user_id: &str, remote_event_id: &str) -> Arc<Mutex<()>> {
        let key = format!("{user_id}:{remote_event_id}");
        let mut registry = self.locks.lock().await;
        Arc::clone(registry.entry(key).or_default())
    }
}
