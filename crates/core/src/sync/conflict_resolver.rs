//! Conflict resolution
//!
//! Applies a chosen strategy to a pending conflict. The ordering invariant
//! is strict: every externally-visible side effect (remote API write, local
//! entity mutation) must succeed before the mapping checkpoint advances and
//! before the conflict is closed. A failed remote write leaves the conflict
//! pending so the divergence stays visible.

use std::sync::Arc;

use aqademiq_domain::{
    remote_event_hash, AqademiqError, ConflictStatus, EventMapping, MergePatch, PlannerEntity,
    ResolutionStrategy, Result, SyncConflict,
};
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use super::ports::{EntityStore, MappingStore, RemoteCalendar};

/// Applies resolution strategies to pending conflicts.
pub struct ConflictResolver {
    mappings: Arc<dyn MappingStore>,
    entities: Arc<dyn EntityStore>,
    remote: Arc<dyn RemoteCalendar>,
}

impl ConflictResolver {
    pub fn new(
        mappings: Arc<dyn MappingStore>,
        entities: Arc<dyn EntityStore>,
        remote: Arc<dyn RemoteCalendar>,
    ) -> Self {
        Self { mappings, entities, remote }
    }

    /// Resolve a pending conflict with the given strategy.
    ///
    /// `merge` is required for [`ResolutionStrategy::Merge`] and ignored
    /// otherwise. Resolving an already-resolved conflict is rejected.
    #[instrument(skip(self, merge), fields(conflict_id))]
    pub async fn resolve(
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

        if conflict.status == ConflictStatus::Resolved {
            return Err(AqademiqError::InvalidInput(format!(
                "conflict {conflict_id} is already resolved"
            )));
        }

        let mapping = self
            .mappings
            .get_mapping(&conflict.mapping_id)
            .await?
            .ok_or_else(|| {
                AqademiqError::NotFound(format!(
                    "mapping {} for conflict {conflict_id}",
                    conflict.mapping_id
                ))
            })?;

        let entity = self
            .entities
            .find(mapping.entity_kind, &mapping.entity_id)
            .await?
            .ok_or_else(|| {
                AqademiqError::InvalidInput(format!(
                    "entity {} behind conflict {conflict_id} no longer exists",
                    mapping.entity_id
                ))
            })?;

        match strategy {
            ResolutionStrategy::PreferLocal => {
                self.prefer_local(&conflict, mapping, entity).await
            }
            ResolutionStrategy::PreferRemote => {
                self.prefer_remote(&conflict, mapping, entity).await
            }
            ResolutionStrategy::Merge => {
                let patch = merge.ok_or_else(|| {
                    AqademiqError::InvalidInput("merge strategy requires a merge payload".into())
                })?;
                self.merge(&conflict, mapping, entity, patch).await
            }
        }
    }

    /// Push the local entity to the provider, then checkpoint.
    async fn prefer_local(
        &self,
        conflict: &SyncConflict,
        mut mapping: EventMapping,
        entity: PlannerEntity,
    ) -> Result<()> {
        let patch = entity.to_event_patch();
        if let Err(err) = self
            .remote
            .upsert_event(&mapping.user_id, &mapping.remote_event_id, &patch)
            .await
        {
            warn!(
                conflict_id = %conflict.id,
                error = %err,
                "remote write failed, conflict stays pending"
            );
            return Err(err);
        }

        let now = Utc::now();
        mapping.local_event_updated = entity.updated_at();
        mapping.remote_event_updated = now;
        mapping.content_hash = patch.content_hash();
        self.checkpoint_and_close(conflict, mapping, now).await?;

        info!(conflict_id = %conflict.id, "conflict resolved preferring local state");
        Ok(())
    }

    /// Apply the remote snapshot's fields onto the entity, then checkpoint.
    async fn prefer_remote(
        &self,
        conflict: &SyncConflict,
        mut mapping: EventMapping,
        mut entity: PlannerEntity,
    ) -> Result<()> {
        let remote_snapshot = conflict.remote_event()?;
        let times = remote_snapshot.times()?;

        let now = Utc::now();
        entity.apply_remote(&remote_snapshot, now)?;
        self.entities.update(&entity).await?;

        mapping.local_event_updated = entity.updated_at();
        mapping.remote_event_updated = times.updated;
        mapping.content_hash = remote_event_hash(&remote_snapshot);
        self.checkpoint_and_close(conflict, mapping, now).await?;

        info!(conflict_id = %conflict.id, "conflict resolved preferring remote state");
        Ok(())
    }

    /// Apply the merged payload to both sides, then checkpoint. The remote
    /// write goes first; if the local update then fails the checkpoint has
    /// not moved and the next poll re-detects the divergence.
    async fn merge(
        &self,
        conflict: &SyncConflict,
        mut mapping: EventMapping,
        mut entity: PlannerEntity,
        patch: &MergePatch,
    ) -> Result<()> {
        let now = Utc::now();
        entity.apply_merge(patch, now);
        let event_patch = entity.to_event_patch();

        if let Err(err) = self
            .remote
            .upsert_event(&mapping.user_id, &mapping.remote_event_id, &event_patch)
            .await
        {
            warn!(
                conflict_id = %conflict.id,
                error = %err,
                "remote write failed, conflict stays pending"
            );
            return Err(err);
        }

        self.entities.update(&entity).await?;

        mapping.local_event_updated = entity.updated_at();
        mapping.remote_event_updated = now;
        mapping.content_hash = event_patch.content_hash();
        self.checkpoint_and_close(conflict, mapping, now).await?;

        info!(conflict_id = %conflict.id, "conflict resolved with merged payload");
        Ok(())
    }

    async fn checkpoint_and_close(
        &self,
        conflict: &SyncConflict,
        mut mapping: EventMapping,
        now: DateTime<Utc>,
    ) -> Result<()> {
        mapping.last_synced_at = now;
        mapping.updated_at = now;
        self.mappings.upsert_mapping(&mapping).await?;
        self.mappings.mark_resolved(&conflict.id, now).await
    }
}
