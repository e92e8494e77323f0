//! Port interfaces for sync operations
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use aqademiq_domain::{
    EntityKind, EventMapping, EventPatch, PlannerEntity, Result, SyncConflict,
};

/// Trait for managing entity↔event mappings and their conflict records.
///
/// Implementations provide per-row atomicity; the uniqueness invariant (one
/// live mapping per entity and per remote event id) is enforced here, not by
/// the sync logic.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Find the mapping for a remote event id under a user.
    async fn find_by_remote_event(
        &self,
        user_id: &str,
        remote_event_id: &str,
    ) -> Result<Option<EventMapping>>;

    /// Find the mapping that links a planner entity.
    async fn find_by_entity(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Option<EventMapping>>;

    /// Load a mapping by id.
    async fn get_mapping(&self, mapping_id: &str) -> Result<Option<EventMapping>>;

    /// Insert or update a mapping (keyed by mapping id).
    async fn upsert_mapping(&self, mapping: &EventMapping) -> Result<()>;

    /// Delete a mapping by id.
    async fn delete_mapping(&self, mapping_id: &str) -> Result<()>;

    /// Persist a new conflict record.
    async fn create_conflict(&self, conflict: &SyncConflict) -> Result<()>;

    /// Load a conflict record by id.
    async fn get_conflict(&self, conflict_id: &str) -> Result<Option<SyncConflict>>;

    /// The pending conflict for a mapping, if one exists.
    async fn find_pending_conflict(&self, mapping_id: &str) -> Result<Option<SyncConflict>>;

    /// All pending conflicts for a user, oldest first.
    async fn pending_conflicts(&self, user_id: &str) -> Result<Vec<SyncConflict>>;

    /// Close a conflict record. The record is kept for audit.
    async fn mark_resolved(&self, conflict_id: &str, resolved_at: DateTime<Utc>) -> Result<()>;
}

/// Trait for reading and writing planner entities.
///
/// Entities are owned by the planner's primary store; this logic only reads
/// and updates them, and creates one when a brand-new remote event arrives.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Load an entity by kind and id.
    async fn find(&self, kind: EntityKind, entity_id: &str) -> Result<Option<PlannerEntity>>;

    /// Insert a freshly materialized entity.
    async fn insert(&self, entity: &PlannerEntity) -> Result<()>;

    /// Persist updated entity fields.
    async fn update(&self, entity: &PlannerEntity) -> Result<()>;
}

/// Trait for writing events to the remote calendar provider.
///
/// Implementations carry their own timeout and bounded retry; a failure
/// surfaces as `RemoteWrite` and must leave no local state advanced.
#[async_trait]
pub trait RemoteCalendar: Send + Sync {
    /// Create or update the remote event with the given content.
    async fn upsert_event(
        &self,
        user_id: &str,
        remote_event_id: &str,
        patch: &EventPatch,
    ) -> Result<()>;
}
