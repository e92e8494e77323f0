//! Fixture builders for sync tests

use aqademiq_domain::{
    remote_event_hash, Assignment, EventMapping, EventTime, PlannerEntity, RemoteEvent,
    ScheduleBlock,
};
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

pub const USER: &str = "user-1";

/// Epoch-second helper for readable fixed timestamps.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
}

pub fn timed(value: DateTime<Utc>) -> EventTime {
    EventTime { date_time: Some(value.to_rfc3339()), date: None, time_zone: None }
}

/// A timed remote event with the given `updated` instant.
pub fn remote_event(id: &str, summary: &str, updated: DateTime<Utc>) -> RemoteEvent {
    RemoteEvent {
        id: id.to_string(),
        summary: Some(summary.to_string()),
        description: Some("from calendar".to_string()),
        location: Some("Campus".to_string()),
        updated: Some(updated.to_rfc3339()),
        start: timed(at(1_800_000_000)),
        end: timed(at(1_800_003_600)),
    }
}

pub fn schedule_block(id: &str, updated_at: DateTime<Utc>) -> PlannerEntity {
    PlannerEntity::ScheduleBlock(ScheduleBlock {
        id: id.to_string(),
        user_id: USER.to_string(),
        title: "Local lecture".to_string(),
        description: None,
        location: None,
        start_time: at(1_799_990_000),
        end_time: at(1_799_993_600),
        updated_at,
    })
}

pub fn assignment(id: &str, updated_at: DateTime<Utc>) -> PlannerEntity {
    PlannerEntity::Assignment(Assignment {
        id: id.to_string(),
        user_id: USER.to_string(),
        title: "Local assignment".to_string(),
        description: None,
        due_date: at(1_799_990_000),
        updated_at,
    })
}

/// A mapping linking `entity` to `event`, checkpointed at `last_synced_at`
/// with the event's current content hash (so only timestamp changes count
/// as remote changes).
pub fn mapping_in_sync(
    entity: &PlannerEntity,
    event: &RemoteEvent,
    last_synced_at: DateTime<Utc>,
) -> EventMapping {
    EventMapping {
        id: Uuid::now_v7().to_string(),
        user_id: USER.to_string(),
        entity_kind: entity.kind(),
        entity_id: entity.id().to_string(),
        remote_event_id: event.id.clone(),
        local_event_updated: entity.updated_at(),
        remote_event_updated: last_synced_at,
        last_synced_at,
        content_hash: remote_event_hash(event),
        created_at: last_synced_at,
        updated_at: last_synced_at,
    }
}

/// Same as [`mapping_in_sync`] but with a stale stored hash, so any newer
/// remote timestamp registers as a real content change.
pub fn mapping_with_stale_hash(
    entity: &PlannerEntity,
    event: &RemoteEvent,
    last_synced_at: DateTime<Utc>,
) -> EventMapping {
    let mut mapping = mapping_in_sync(entity, event, last_synced_at);
    mapping.content_hash = "stale-hash".to_string();
    mapping
}
