//! Inbound event classification
//!
//! Compares a remote event against its mapping and the local entity to
//! decide what — if anything — changed since the last reconciliation
//! checkpoint. Divergence is never resolved by recency: when both sides
//! changed, a conflict record is materialized for manual resolution instead
//! of silently discarding either side.

use std::sync::Arc;

use aqademiq_domain::{
    remote_event_hash, EventMapping, EventTimes, PlannerEntity, RemoteEvent, Result, SyncAction,
    SyncConflict,
};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use super::ports::{EntityStore, MappingStore};

/// Classifies inbound remote events against the mapping store.
pub struct ChangeDetector {
    mappings: Arc<dyn MappingStore>,
    entities: Arc<dyn EntityStore>,
}

impl ChangeDetector {
    pub fn new(mappings: Arc<dyn MappingStore>, entities: Arc<dyn EntityStore>) -> Self {
        Self { mappings, entities }
    }

    /// Classify one remote event and apply the resulting one-sided effects.
    ///
    /// Malformed payloads (missing id, `updated`, or `start`) return
    /// `Validation`; the batch runner skips those without aborting.
    #[instrument(skip(self, event), fields(remote_event_id = %event.id))]
    pub async fn classify(&self, user_id: &str, event: &RemoteEvent) -> Result<SyncAction> {
        let times = event.times()?;
        let content_hash = remote_event_hash(event);

        let Some(mut mapping) = self.mappings.find_by_remote_event(user_id, &event.id).await?
        else {
            return self.create_local(user_id, event, &times, content_hash).await;
        };

        let Some(mut entity) =
            self.entities.find(mapping.entity_kind, &mapping.entity_id).await?
        else {
            // Entity deleted locally: the mapping is stale, drop it. No
            // conflict record; the deletion wins by absence.
            debug!(
                mapping_id = %mapping.id,
                entity_kind = %mapping.entity_kind,
                entity_id = %mapping.entity_id,
                "mapped entity missing, removing stale mapping"
            );
            self.mappings.delete_mapping(&mapping.id).await?;
            return Ok(SyncAction::NoOp);
        };

        // A provider `updated` bump with an unchanged content hash is a
        // cosmetic touch (attendee responses and the like), not a change.
        let remote_changed =
            times.updated > mapping.last_synced_at && content_hash != mapping.content_hash;
        let local_changed = entity.updated_at() > mapping.last_synced_at;

        match (remote_changed, local_changed) {
            (true, true) => self.detect_conflict(&mapping, &entity, event).await,
            (true, false) => {
                self.update_local(&mut mapping, &mut entity, event, &times, content_hash).await
            }
            (false, true) => {
                // Outbound push happens in the export pass; only refresh the
                // local-timestamp bookkeeping here. The checkpoint stays put
                // so the divergence remains visible until the push lands.
                let now = Utc::now();
                mapping.local_event_updated = entity.updated_at();
                mapping.updated_at = now;
                self.mappings.upsert_mapping(&mapping).await?;
                debug!(mapping_id = %mapping.id, "local-only change, remote push deferred");
                Ok(SyncAction::RemoteRefreshDeferred {
                    entity_kind: mapping.entity_kind,
                    entity_id: mapping.entity_id,
                })
            }
            (false, false) => {
                if times.updated > mapping.last_synced_at {
                    // Absorb the cosmetic remote touch so the next poll is a
                    // clean no-op.
                    let now = Utc::now();
                    mapping.remote_event_updated = times.updated;
                    mapping.last_synced_at = now.max(times.updated);
                    mapping.updated_at = now;
                    self.mappings.upsert_mapping(&mapping).await?;
                }
                Ok(SyncAction::NoOp)
            }
        }
    }

    /// Brand-new remote event: materialize a schedule block and its mapping.
    async fn create_local(
        &self,
        user_id: &str,
        event: &RemoteEvent,
        times: &EventTimes,
        content_hash: String,
    ) -> Result<SyncAction> {
        let now = Utc::now();
        let entity = PlannerEntity::schedule_block_from_remote(user_id, event, now)?;
        self.entities.insert(&entity).await?;

        // Checkpoint at least at the event's own `updated` so the next poll
        // of the same payload classifies as NoOp even under clock skew.
        let checkpoint = now.max(times.updated);
        let mut mapping =
            EventMapping::new(&entity, &event.id, times.updated, content_hash, now);
        mapping.last_synced_at = checkpoint;
        self.mappings.upsert_mapping(&mapping).await?;

        info!(
            entity_id = %entity.id(),
            remote_event_id = %event.id,
            "created local entity from remote event"
        );
        Ok(SyncAction::CreatedLocal {
            entity_kind: entity.kind(),
            entity_id: entity.id().to_string(),
        })
    }

    /// Only the remote side changed: overwrite the entity and checkpoint.
    async fn update_local(
        &self,
        mapping: &mut EventMapping,
        entity: &mut PlannerEntity,
        event: &RemoteEvent,
        times: &EventTimes,
        content_hash: String,
    ) -> Result<SyncAction> {
        let now = Utc::now();
        entity.apply_remote(event, now)?;
        self.entities.update(entity).await?;

        mapping.local_event_updated = entity.updated_at();
        mapping.remote_event_updated = times.updated;
        mapping.content_hash = content_hash;
        mapping.last_synced_at = now.max(times.updated);
        mapping.updated_at = now;
        self.mappings.upsert_mapping(mapping).await?;

        debug!(mapping_id = %mapping.id, "applied remote update to local entity");
        Ok(SyncAction::UpdatedLocalFromRemote {
            entity_kind: mapping.entity_kind,
            entity_id: mapping.entity_id.clone(),
        })
    }

    /// Both sides changed since the checkpoint: persist a conflict record.
    /// An existing pending conflict for the mapping is reused rather than
    /// stacked.
    async fn detect_conflict(
        &self,
        mapping: &EventMapping,
        entity: &PlannerEntity,
        event: &RemoteEvent,
    ) -> Result<SyncAction> {
        if let Some(existing) = self.mappings.find_pending_conflict(&mapping.id).await? {
            debug!(
                mapping_id = %mapping.id,
                conflict_id = %existing.id,
                "divergence already recorded, reusing pending conflict"
            );
            return Ok(SyncAction::ConflictDetected { conflict_id: existing.id });
        }

        let conflict = SyncConflict::detect(mapping, entity, event, Utc::now())?;
        self.mappings.create_conflict(&conflict).await?;

        warn!(
            mapping_id = %mapping.id,
            conflict_id = %conflict.id,
            entity_kind = %mapping.entity_kind,
            "both sides changed independently, conflict recorded"
        );
        Ok(SyncAction::ConflictDetected { conflict_id: conflict.id })
    }
}
