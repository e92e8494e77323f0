//! Planner entity store implementation
//!
//! Reads and writes the three entity tables on behalf of the sync logic.
//! Entities are owned by the planner; sync only updates mapped fields and
//! creates schedule blocks for brand-new remote events.

use std::sync::Arc;

use aqademiq_domain::{
    AqademiqError, Assignment, EntityKind, Exam, PlannerEntity, Result as DomainResult,
    ScheduleBlock,
};
use async_trait::async_trait;
use aqademiq_core::EntityStore;
use rusqlite::{params, Row};
use tokio::task;

use super::manager::{DbManager, PooledSqlite};
use super::mapping_store::map_join_error;
use super::rows::{millis_column, to_millis};
use crate::errors::InfraError;

/// SQLite-backed planner entity store.
pub struct SqlitePlannerStore {
    db: Arc<DbManager>,
}

impl SqlitePlannerStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EntityStore for SqlitePlannerStore {
    async fn find(&self, kind: EntityKind, entity_id: &str) -> DomainResult<Option<PlannerEntity>> {
        let db = Arc::clone(&self.db);
        let entity_id = entity_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<PlannerEntity>> {
            let conn = db.get_connection()?;
            query_entity(&conn, kind, &entity_id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn insert(&self, entity: &PlannerEntity) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let entity = entity.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            insert_entity(&conn, &entity)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update(&self, entity: &PlannerEntity) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let entity = entity.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            update_entity(&conn, &entity)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn query_entity(
    conn: &PooledSqlite,
    kind: EntityKind,
    entity_id: &str,
) -> DomainResult<Option<PlannerEntity>> {
    let (sql, mapper): (&str, fn(&Row<'_>) -> rusqlite::Result<PlannerEntity>) = match kind {
        EntityKind::ScheduleBlock => (
            "SELECT id, user_id, title, description, location, start_ts, end_ts, updated_at
             FROM schedule_blocks WHERE id = ?1",
            map_schedule_block_row,
        ),
        EntityKind::Assignment => (
            "SELECT id, user_id, title, description, due_ts, updated_at
             FROM assignments WHERE id = ?1",
            map_assignment_row,
        ),
        EntityKind::Exam => (
            "SELECT id, user_id, title, location, notes, exam_ts, duration_minutes, updated_at
             FROM exams WHERE id = ?1",
            map_exam_row,
        ),
    };

    match conn.query_row(sql, params![entity_id], mapper) {
        Ok(entity) => Ok(Some(entity)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(InfraError::from(err).into()),
    }
}

fn insert_entity(conn: &PooledSqlite, entity: &PlannerEntity) -> DomainResult<()> {
    match entity {
        PlannerEntity::ScheduleBlock(block) => {
            conn.execute(
                "INSERT INTO schedule_blocks (id, user_id, title, description, location,
                     start_ts, end_ts, updated_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    block.id,
                    block.user_id,
                    block.title,
                    block.description,
                    block.location,
                    to_millis(block.start_time),
                    to_millis(block.end_time),
                    to_millis(block.updated_at),
                ],
            )
        }
        PlannerEntity::Assignment(assignment) => {
            conn.execute(
                "INSERT INTO assignments (id, user_id, title, description, due_ts,
                     updated_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    assignment.id,
                    assignment.user_id,
                    assignment.title,
                    assignment.description,
                    to_millis(assignment.due_date),
                    to_millis(assignment.updated_at),
                ],
            )
        }
        PlannerEntity::Exam(exam) => {
            conn.execute(
                "INSERT INTO exams (id, user_id, title, location, notes, exam_ts,
                     duration_minutes, updated_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    exam.id,
                    exam.user_id,
                    exam.title,
                    exam.location,
                    exam.notes,
                    to_millis(exam.exam_date),
                    exam.duration_minutes,
                    to_millis(exam.updated_at),
                ],
            )
        }
    }
    .map_err(InfraError::from)?;
    Ok(())
}

fn update_entity(conn: &PooledSqlite, entity: &PlannerEntity) -> DomainResult<()> {
    let changed = match entity {
        PlannerEntity::ScheduleBlock(block) => {
            conn.execute(
                "UPDATE schedule_blocks
                 SET title = ?2, description = ?3, location = ?4, start_ts = ?5,
                     end_ts = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    block.id,
                    block.title,
                    block.description,
                    block.location,
                    to_millis(block.start_time),
                    to_millis(block.end_time),
                    to_millis(block.updated_at),
                ],
            )
        }
        PlannerEntity::Assignment(assignment) => {
            conn.execute(
                "UPDATE assignments
                 SET title = ?2, description = ?3, due_ts = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    assignment.id,
                    assignment.title,
                    assignment.description,
                    to_millis(assignment.due_date),
                    to_millis(assignment.updated_at),
                ],
            )
        }
        PlannerEntity::Exam(exam) => {
            conn.execute(
                "UPDATE exams
                 SET title = ?2, location = ?3, notes = ?4, exam_ts = ?5,
                     duration_minutes = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    exam.id,
                    exam.title,
                    exam.location,
                    exam.notes,
                    to_millis(exam.exam_date),
                    exam.duration_minutes,
                    to_millis(exam.updated_at),
                ],
            )
        }
    }
    .map_err(InfraError::from)?;

    if changed == 0 {
        return Err(AqademiqError::NotFound(format!(
            "{} {} not found for update",
            entity.kind(),
            entity.id()
        )));
    }
    Ok(())
}

fn map_schedule_block_row(row: &Row<'_>) -> rusqlite::Result<PlannerEntity> {
    Ok(PlannerEntity::ScheduleBlock(ScheduleBlock {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        location: row.get(4)?,
        start_time: millis_column(row, 5)?,
        end_time: millis_column(row, 6)?,
        updated_at: millis_column(row, 7)?,
    }))
}

fn map_assignment_row(row: &Row<'_>) -> rusqlite::Result<PlannerEntity> {
    Ok(PlannerEntity::Assignment(Assignment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        due_date: millis_column(row, 4)?,
        updated_at: millis_column(row, 5)?,
    }))
}

fn map_exam_row(row: &Row<'_>) -> rusqlite::Result<PlannerEntity> {
    Ok(PlannerEntity::Exam(Exam {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        location: row.get(3)?,
        notes: row.get(4)?,
        exam_date: millis_column(row, 5)?,
        duration_minutes: row.get(6)?,
        updated_at: millis_column(row, 7)?,
    }))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    async fn setup_store() -> (SqlitePlannerStore, Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("planner.db");

        let manager = Arc::new(DbManager::new(&db_path, 4).expect("db manager created"));
        manager.run_migrations().expect("migrations run");

        let store = SqlitePlannerStore::new(Arc::clone(&manager));
        (store, manager, temp_dir)
    }

    fn sample_block(id: &str) -> PlannerEntity {
        PlannerEntity::ScheduleBlock(ScheduleBlock {
            id: id.into(),
            user_id: "user-1".into(),
            title: "Lecture".into(),
            description: Some("weekly".into()),
            location: Some("Hall A".into()),
            start_time: at(1_700_000_000),
            end_time: at(1_700_003_600),
            updated_at: at(1_700_000_000),
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn schedule_block_roundtrip() {
        let (store, _manager, _dir) = setup_store().await;

        let entity = sample_block("blk-1");
        store.insert(&entity).await.expect("inserted");

        let stored = store
            .find(EntityKind::ScheduleBlock, "blk-1")
            .await
            .expect("query succeeded")
            .expect("entity found");
        assert_eq!(stored, entity);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn assignment_roundtrip_and_update() {
        let (store, _manager, _dir) = setup_store().await;

        let entity = PlannerEntity::Assignment(Assignment {
            id: "asg-1".into(),
            user_id: "user-1".into(),
            title: "Essay".into(),
            description: None,
            due_date: at(1_700_000_000),
            updated_at: at(1_700_000_000),
        });
        store.insert(&entity).await.expect("inserted");

        let PlannerEntity::Assignment(mut assignment) = store
            .find(EntityKind::Assignment, "asg-1")
            .await
            .expect("query succeeded")
            .expect("entity found")
        else {
            panic!("wrong kind");
        };

        assignment.title = "Essay (revised)".into();
        assignment.due_date = at(1_700_100_000);
        assignment.updated_at = at(1_700_050_000);
        store.update(&PlannerEntity::Assignment(assignment)).await.expect("updated");

        let PlannerEntity::Assignment(stored) = store
            .find(EntityKind::Assignment, "asg-1")
            .await
            .expect("query succeeded")
            .expect("entity found")
        else {
            panic!("wrong kind");
        };
        assert_eq!(stored.title, "Essay (revised)");
        assert_eq!(stored.due_date, at(1_700_100_000));
        assert_eq!(stored.updated_at, at(1_700_050_000));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exam_roundtrip() {
        let (store, _manager, _dir) = setup_store().await;

        let entity = PlannerEntity::Exam(Exam {
            id: "exm-1".into(),
            user_id: "user-1".into(),
            title: "Final".into(),
            location: Some("Aula".into()),
            notes: Some("bring calculator".into()),
            exam_date: at(1_700_000_000),
            duration_minutes: 120,
            updated_at: at(1_700_000_000),
        });
        store.insert(&entity).await.expect("inserted");

        let stored = store
            .find(EntityKind::Exam, "exm-1")
            .await
            .expect("query succeeded")
            .expect("entity found");
        assert_eq!(stored, entity);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn updating_missing_entity_is_not_found() {
        let (store, _manager, _dir) = setup_store().await;

        let err = store.update(&sample_block("ghost")).await.expect_err("missing entity");
        assert!(matches!(err, AqademiqError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn find_missing_returns_none() {
        let (store, _manager, _dir) = setup_store().await;

        let found =
            store.find(EntityKind::ScheduleBlock, "nope").await.expect("query succeeded");
        assert!(found.is_none());
    }
}
