//! Mapping store implementation
//!
//! Persists entity↔event mappings and conflict records. The uniqueness
//! invariant (one live mapping per entity and per remote event id) is
//! enforced by the table's UNIQUE indexes.

use std::sync::Arc;

use aqademiq_domain::{
    AqademiqError, EntityKind, EventMapping, Result as DomainResult, SyncConflict,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use aqademiq_core::MappingStore;
use rusqlite::params;
use tokio::task;

use super::manager::{DbManager, PooledSqlite};
use super::rows::{map_conflict_row, map_mapping_row, to_millis};
use crate::errors::InfraError;

const MAPPING_COLUMNS: &str = "id, user_id, entity_kind, entity_id, remote_event_id,
     local_event_updated, remote_event_updated, last_synced_at, content_hash,
     created_at, updated_at";

const CONFLICT_COLUMNS: &str = "id, mapping_id, user_id, local_snapshot, remote_snapshot,
     status, detected_at, resolved_at";

/// SQLite-backed mapping store.
pub struct SqliteMappingStore {
    db: Arc<DbManager>,
}

impl SqliteMappingStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MappingStore for SqliteMappingStore {
    async fn find_by_remote_event(
        &self,
        user_id: &str,
        remote_event_id: &str,
    ) -> DomainResult<Option<EventMapping>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let remote_event_id = remote_event_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<EventMapping>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {MAPPING_COLUMNS} FROM event_mappings
                 WHERE user_id = ?1 AND remote_event_id = ?2"
            );
            optional_row(&conn, &sql, params![user_id, remote_event_id], map_mapping_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_by_entity(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> DomainResult<Option<EventMapping>> {
        let db = Arc::clone(&self.db);
        let entity_id = entity_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<EventMapping>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {MAPPING_COLUMNS} FROM event_mappings
                 WHERE entity_kind = ?1 AND entity_id = ?2"
            );
            optional_row(&conn, &sql, params![kind.as_str(), entity_id], map_mapping_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_mapping(&self, mapping_id: &str) -> DomainResult<Option<EventMapping>> {
        let db = Arc::clone(&self.db);
        let mapping_id = mapping_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<EventMapping>> {
            let conn = db.get_connection()?;
            let sql = format!("SELECT {MAPPING_COLUMNS} FROM event_mappings WHERE id = ?1");
            optional_row(&conn, &sql, params![mapping_id], map_mapping_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn upsert_mapping(&self, mapping: &EventMapping) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let mapping = mapping.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO event_mappings (id, user_id, entity_kind, entity_id,
                     remote_event_id, local_event_updated, remote_event_updated,
                     last_synced_at, content_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(id) DO UPDATE SET
                     local_event_updated = excluded.local_event_updated,
                     remote_event_updated = excluded.remote_event_updated,
                     last_synced_at = excluded.last_synced_at,
                     content_hash = excluded.content_hash,
                     updated_at = excluded.updated_at",
                params![
                    mapping.id,
                    mapping.user_id,
                    mapping.entity_kind.as_str(),
                    mapping.entity_id,
                    mapping.remote_event_id,
                    to_millis(mapping.local_event_updated),
                    to_millis(mapping.remote_event_updated),
                    to_millis(mapping.last_synced_at),
                    mapping.content_hash,
                    to_millis(mapping.created_at),
                    to_millis(mapping.updated_at),
                ],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_mapping(&self, mapping_id: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let mapping_id = mapping_id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM event_mappings WHERE id = ?1", params![mapping_id])
                .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn create_conflict(&self, conflict: &SyncConflict) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let conflict = conflict.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let local_snapshot = serde_json::to_string(&conflict.local_snapshot)
                .map_err(|e| AqademiqError::Internal(format!("snapshot encode failed: {e}")))?;
            let remote_snapshot = serde_json::to_string(&conflict.remote_snapshot)
                .map_err(|e| AqademiqError::Internal(format!("snapshot encode failed: {e}")))?;

            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO sync_conflicts (id, mapping_id, user_id, local_snapshot,
                     remote_snapshot, status, detected_at, resolved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)",
                params![
                    conflict.id,
                    conflict.mapping_id,
                    conflict.user_id,
                    local_snapshot,
                    remote_snapshot,
                    conflict.status.as_str(),
                    to_millis(conflict.detected_at),
                ],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_conflict(&self, conflict_id: &str) -> DomainResult<Option<SyncConflict>> {
        let db = Arc::clone(&self.db);
        let conflict_id = conflict_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<SyncConflict>> {
            let conn = db.get_connection()?;
            let sql = format!("SELECT {CONFLICT_COLUMNS} FROM sync_conflicts WHERE id = ?1");
            optional_row(&conn, &sql, params![conflict_id], map_conflict_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_pending_conflict(
        &self,
        mapping_id: &str,
    ) -> DomainResult<Option<SyncConflict>> {
        let db = Arc::clone(&self.db);
        let mapping_id = mapping_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<SyncConflict>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {CONFLICT_COLUMNS} FROM sync_conflicts
                 WHERE mapping_id = ?1 AND status = 'pending'
                 ORDER BY detected_at ASC LIMIT 1"
            );
            optional_row(&conn, &sql, params![mapping_id], map_conflict_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn pending_conflicts(&self, user_id: &str) -> DomainResult<Vec<SyncConflict>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<SyncConflict>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {CONFLICT_COLUMNS} FROM sync_conflicts
                 WHERE user_id = ?1 AND status = 'pending'
                 ORDER BY detected_at ASC"
            );
            let mut stmt = conn.prepare(&sql).map_err(InfraError::from)?;
            let rows = stmt
                .query_map(params![user_id], map_conflict_row)
                .map_err(InfraError::from)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(InfraError::from)?;
            Ok(rows)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_resolved(
        &self,
        conflict_id: &str,
        resolved_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let conflict_id = conflict_id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let changed = conn
                .execute(
                    "UPDATE sync_conflicts SET status = 'resolved', resolved_at = ?2
                     WHERE id = ?1",
                    params![conflict_id, to_millis(resolved_at)],
                )
                .map_err(InfraError::from)?;
            if changed == 0 {
                return Err(AqademiqError::NotFound(format!("conflict {conflict_id}")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL helpers (synchronous)
// ============================================================================

fn optional_row<T>(
    conn: &PooledSqlite,
    sql: &str,
    params: impl rusqlite::Params,
    mapper: impl FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> DomainResult<Option<T>> {
    match conn.query_row(sql, params, mapper) {
        Ok(row) => Ok(Some(row)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(InfraError::from(err).into()),
    }
}

pub(crate) fn map_join_error(err: task::JoinError) -> AqademiqError {
    if err.is_cancelled() {
        AqademiqError::Internal("blocking task cancelled".into())
    } else {
        AqademiqError::Internal(format!("blocking task failed: {err}"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use aqademiq_domain::{ConflictStatus, PlannerEntity, RemoteEvent, ScheduleBlock};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    async fn setup_store() -> (SqliteMappingStore, Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("mappings.db");

        let manager = Arc::new(DbManager::new(&db_path, 4).expect("db manager created"));
        manager.run_migrations().expect("migrations run");

        let store = SqliteMappingStore::new(Arc::clone(&manager));
        (store, manager, temp_dir)
    }

    fn sample_mapping(entity_id: &str, remote_event_id: &str) -> EventMapping {
        EventMapping {
            id: Uuid::now_v7().to_string(),
            user_id: "user-1".into(),
            entity_kind: EntityKind::ScheduleBlock,
            entity_id: entity_id.into(),
            remote_event_id: remote_event_id.into(),
            local_event_updated: at(1_700_000_000),
            remote_event_updated: at(1_700_000_000),
            last_synced_at: at(1_700_000_000),
            content_hash: "hash-1".into(),
            created_at: at(1_700_000_000),
            updated_at: at(1_700_000_000),
        }
    }

    fn sample_conflict(mapping: &EventMapping) -> SyncConflict {
        let entity = PlannerEntity::ScheduleBlock(ScheduleBlock {
            id: mapping.entity_id.clone(),
            user_id: mapping.user_id.clone(),
            title: "Lecture".into(),
            description: None,
            location: None,
            start_time: at(1_700_000_000),
            end_time: at(1_700_003_600),
            updated_at: at(1_700_000_100),
        });
        let event: RemoteEvent = serde_json::from_value(serde_json::json!({
            "id": mapping.remote_event_id,
            "summary": "Remote lecture",
            "updated": "2023-11-14T22:15:00Z",
            "start": {"dateTime": "2023-11-15T09:00:00Z"},
            "end": {"dateTime": "2023-11-15T10:00:00Z"},
        }))
        .expect("valid event json");
        SyncConflict::detect(mapping, &entity, &event, at(1_700_000_200))
            .expect("snapshots serialize")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_and_lookup_mapping() {
        let (store, _manager, _dir) = setup_store().await;

        let mapping = sample_mapping("blk-1", "evt-1");
        store.upsert_mapping(&mapping).await.expect("mapping created");

        let by_remote = store
            .find_by_remote_event("user-1", "evt-1")
            .await
            .expect("query succeeded")
            .expect("mapping found");
        assert_eq!(by_remote.id, mapping.id);
        assert_eq!(by_remote.entity_kind, EntityKind::ScheduleBlock);
        assert_eq!(by_remote.last_synced_at, mapping.last_synced_at);

        let by_entity = store
            .find_by_entity(EntityKind::ScheduleBlock, "blk-1")
            .await
            .expect("query succeeded")
            .expect("mapping found");
        assert_eq!(by_entity.id, mapping.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_updates_checkpoint_fields() {
        let (store, _manager, _dir) = setup_store().await;

        let mut mapping = sample_mapping("blk-2", "evt-2");
        store.upsert_mapping(&mapping).await.expect("created");

        mapping.last_synced_at = at(1_700_000_500);
        mapping.content_hash = "hash-2".into();
        store.upsert_mapping(&mapping).await.expect("updated");

        let stored = store
            .get_mapping(&mapping.id)
            .await
            .expect("query succeeded")
            .expect("mapping found");
        assert_eq!(stored.last_synced_at, at(1_700_000_500));
        assert_eq!(stored.content_hash, "hash-2");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicate_entity_mapping_is_rejected() {
        let (store, _manager, _dir) = setup_store().await;

        store.upsert_mapping(&sample_mapping("blk-3", "evt-3a")).await.expect("created");
        let err = store
            .upsert_mapping(&sample_mapping("blk-3", "evt-3b"))
            .await
            .expect_err("unique index rejects second mapping for same entity");
        assert!(matches!(err, AqademiqError::Database(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicate_remote_event_mapping_is_rejected() {
        let (store, _manager, _dir) = setup_store().await;

        store.upsert_mapping(&sample_mapping("blk-4a", "evt-4")).await.expect("created");
        let err = store
            .upsert_mapping(&sample_mapping("blk-4b", "evt-4"))
            .await
            .expect_err("unique index rejects second mapping for same event");
        assert!(matches!(err, AqademiqError::Database(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_mapping_removes_row() {
        let (store, _manager, _dir) = setup_store().await;

        let mapping = sample_mapping("blk-5", "evt-5");
        store.upsert_mapping(&mapping).await.expect("created");
        store.delete_mapping(&mapping.id).await.expect("deleted");

        let found =
            store.find_by_remote_event("user-1", "evt-5").await.expect("query succeeded");
        assert!(found.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn conflict_roundtrip_and_resolution() {
        let (store, _manager, _dir) = setup_store().await;

        let mapping = sample_mapping("blk-6", "evt-6");
        store.upsert_mapping(&mapping).await.expect("created");

        let conflict = sample_conflict(&mapping);
        store.create_conflict(&conflict).await.expect("conflict created");

        let pending = store
            .find_pending_conflict(&mapping.id)
            .await
            .expect("query succeeded")
            .expect("pending conflict found");
        assert_eq!(pending.id, conflict.id);
        assert_eq!(pending.status, ConflictStatus::Pending);
        assert_eq!(pending.local_entity().expect("snapshot parses").id(), "blk-6");

        let listed = store.pending_conflicts("user-1").await.expect("query succeeded");
        assert_eq!(listed.len(), 1);

        store.mark_resolved(&conflict.id, at(1_700_000_300)).await.expect("resolved");

        let resolved = store
            .get_conflict(&conflict.id)
            .await
            .expect("query succeeded")
            .expect("conflict kept for audit");
        assert_eq!(resolved.status, ConflictStatus::Resolved);
        assert_eq!(resolved.resolved_at, Some(at(1_700_000_300)));

        assert!(store
            .find_pending_conflict(&mapping.id)
            .await
            .expect("query succeeded")
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn resolving_missing_conflict_is_not_found() {
        let (store, _manager, _dir) = setup_store().await;

        let err = store
            .mark_resolved("missing", at(1_700_000_300))
            .await
            .expect_err("missing conflict");
        assert!(matches!(err, AqademiqError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_mapping_returns_none() {
        let (store, _manager, _dir) = setup_store().await;

        let result =
            store.find_by_remote_event("user-1", "nonexistent").await.expect("query succeeded");
        assert!(result.is_none());
    }
}
