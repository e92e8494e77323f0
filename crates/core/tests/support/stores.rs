//! In-memory port implementations for deterministic sync tests
//!
//! No database dependencies; state lives behind a mutex and failure modes
//! are injectable per store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use aqademiq_domain::{
    AqademiqError, EntityKind, EventMapping, EventPatch, PlannerEntity, Result, SyncConflict,
};
use aqademiq_domain::ConflictStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use aqademiq_core::{EntityStore, MappingStore, RemoteCalendar};

fn lock_poisoned() -> AqademiqError {
    AqademiqError::Internal("test store mutex poisoned".into())
}

/// In-memory mock for `MappingStore`.
///
/// Keyed by mapping id with secondary lookups matching the store's UNIQUE
/// indexes. `fail_all` simulates a systemic persistence failure.
#[derive(Default)]
pub struct InMemoryMappingStore {
    mappings: Mutex<HashMap<String, EventMapping>>,
    conflicts: Mutex<HashMap<String, SyncConflict>>,
    fail_all: AtomicBool,
}

impl InMemoryMappingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent call fail with a `Database` error.
    pub fn fail_from_now_on(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    pub fn mapping_count(&self) -> usize {
        self.mappings.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn conflict_count(&self) -> usize {
        self.conflicts.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn check_failure(&self) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(AqademiqError::Database("injected store failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn find_by_remote_event(
        &self,
        user_id: &str,
        remote_event_id: &str,
    ) -> Result<Option<EventMapping>> {
        self.check_failure()?;
        let mappings = self.mappings.lock().map_err(|_| lock_poisoned())?;
        Ok(mappings
            .values()
            .find(|m| m.user_id == user_id && m.remote_event_id == remote_event_id)
            .cloned())
    }

    async fn find_by_entity(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Option<EventMapping>> {
        self.check_failure()?;
        let mappings = self.mappings.lock().map_err(|_| lock_poisoned())?;
        Ok(mappings
            .values()
            .find(|m| m.entity_kind == kind && m.entity_id == entity_id)
            .cloned())
    }

    async fn get_mapping(&self, mapping_id: &str) -> Result<Option<EventMapping>> {
        self.check_failure()?;
        let mappings = self.mappings.lock().map_err(|_| lock_poisoned())?;
        Ok(mappings.get(mapping_id).cloned())
    }

    async fn upsert_mapping(&self, mapping: &EventMapping) -> Result<()> {
        self.check_failure()?;
        let mut mappings = self.mappings.lock().map_err(|_| lock_poisoned())?;
        mappings.insert(mapping.id.clone(), mapping.clone());
        Ok(())
    }

    async fn delete_mapping(&self, mapping_id: &str) -> Result<()> {
        self.check_failure()?;
        let mut mappings = self.mappings.lock().map_err(|_| lock_poisoned())?;
        mappings.remove(mapping_id);
        Ok(())
    }

    async fn create_conflict(&self, conflict: &SyncConflict) -> Result<()> {
        self.check_failure()?;
        let mut conflicts = self.conflicts.lock().map_err(|_| lock_poisoned())?;
        conflicts.insert(conflict.id.clone(), conflict.clone());
        Ok(())
    }

    async fn get_conflict(&self, conflict_id: &str) -> Result<Option<SyncConflict>> {
        self.check_failure()?;
        let conflicts = self.conflicts.lock().map_err(|_| lock_poisoned())?;
        Ok(conflicts.get(conflict_id).cloned())
    }

    async fn find_pending_conflict(&self, mapping_id: &str) -> Result<Option<SyncConflict>> {
        self.check_failure()?;
        let conflicts = self.conflicts.lock().map_err(|_| lock_poisoned())?;
        Ok(conflicts
            .values()
            .find(|c| c.mapping_id == mapping_id && c.status == ConflictStatus::Pending)
            .cloned())
    }

    async fn pending_conflicts(&self, user_id: &str) -> Result<Vec<SyncConflict>> {
        self.check_failure()?;
        let conflicts = self.conflicts.lock().map_err(|_| lock_poisoned())?;
        let mut pending: Vec<SyncConflict> = conflicts
            .values()
            .filter(|c| c.user_id == user_id && c.status == ConflictStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|c| c.detected_at);
        Ok(pending)
    }

    async fn mark_resolved(&self, conflict_id: &str, resolved_at: DateTime<Utc>) -> Result<()> {
        self.check_failure()?;
        let mut conflicts = self.conflicts.lock().map_err(|_| lock_poisoned())?;
        let conflict = conflicts
            .get_mut(conflict_id)
            .ok_or_else(|| AqademiqError::NotFound(format!("conflict {conflict_id}")))?;
        conflict.status = ConflictStatus::Resolved;
        conflict.resolved_at = Some(resolved_at);
        Ok(())
    }
}

/// In-memory mock for `EntityStore`.
#[derive(Default)]
pub struct InMemoryEntityStore {
    entities: Mutex<HashMap<(EntityKind, String), PlannerEntity>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed an entity, bypassing the port.
    pub fn seed(&self, entity: PlannerEntity) {
        if let Ok(mut entities) = self.entities.lock() {
            entities.insert((entity.kind(), entity.id().to_string()), entity);
        }
    }

    /// Remove an entity directly, simulating a local deletion.
    pub fn remove(&self, kind: EntityKind, entity_id: &str) {
        if let Ok(mut entities) = self.entities.lock() {
            entities.remove(&(kind, entity_id.to_string()));
        }
    }

    pub fn get(&self, kind: EntityKind, entity_id: &str) -> Option<PlannerEntity> {
        self.entities
            .lock()
            .ok()
            .and_then(|entities| entities.get(&(kind, entity_id.to_string())).cloned())
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn find(&self, kind: EntityKind, entity_id: &str) -> Result<Option<PlannerEntity>> {
        let entities = self.entities.lock().map_err(|_| lock_poisoned())?;
        Ok(entities.get(&(kind, entity_id.to_string())).cloned())
    }

    async fn insert(&self, entity: &PlannerEntity) -> Result<()> {
        let mut entities = self.entities.lock().map_err(|_| lock_poisoned())?;
        entities.insert((entity.kind(), entity.id().to_string()), entity.clone());
        Ok(())
    }

    async fn update(&self, entity: &PlannerEntity) -> Result<()> {
        let mut entities = self.entities.lock().map_err(|_| lock_poisoned())?;
        let key = (entity.kind(), entity.id().to_string());
        if !entities.contains_key(&key) {
            return Err(AqademiqError::NotFound(format!("entity {}", entity.id())));
        }
        entities.insert(key, entity.clone());
        Ok(())
    }
}

/// Recording mock for `RemoteCalendar` with injectable failure.
#[derive(Default)]
pub struct RecordingRemoteCalendar {
    writes: Mutex<Vec<(String, String, EventPatch)>>,
    fail_writes: AtomicBool,
}

impl RecordingRemoteCalendar {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent write fail with a `RemoteWrite` error.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<(String, String, EventPatch)> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RemoteCalendar for RecordingRemoteCalendar {
    async fn upsert_event(
        &self,
        user_id: &str,
        remote_event_id: &str,
        patch: &EventPatch,
    ) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AqademiqError::RemoteWrite("injected provider failure".into()));
        }
        let mut writes = self.writes.lock().map_err(|_| lock_poisoned())?;
        writes.push((user_id.to_string(), remote_event_id.to_string(), patch.clone()));
        Ok(())
    }
}
