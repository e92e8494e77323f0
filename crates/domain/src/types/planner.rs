//! Planner entity types
//!
//! The locally-owned academic records eligible for calendar sync. Each
//! entity bumps `updated_at` whenever any field changes; the sync logic
//! relies on that to detect local modifications.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{ASSIGNMENT_EVENT_DURATION_MINUTES, DEFAULT_EXAM_DURATION_MINUTES};
use crate::errors::{AqademiqError, Result};
use crate::types::sync::{EventPatch, MergePatch, RemoteEvent};

/// Planner entity discriminator. The snake_case string form is stored in the
/// database and used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    ScheduleBlock,
    Assignment,
    Exam,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScheduleBlock => "schedule_block",
            Self::Assignment => "assignment",
            Self::Exam => "exam",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "schedule_block" => Ok(Self::ScheduleBlock),
            "assignment" => Ok(Self::Assignment),
            "exam" => Ok(Self::Exam),
            other => Err(AqademiqError::InvalidInput(format!("unknown entity kind: {other}"))),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A block of scheduled time (lecture, lab, study session).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleBlock {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An assignment with a due date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A scheduled exam.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exam {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub exam_date: DateTime<Utc>,
    pub duration_minutes: i64,
    pub updated_at: DateTime<Utc>,
}

/// Sum type over the three syncable planner records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlannerEntity {
    ScheduleBlock(ScheduleBlock),
    Assignment(Assignment),
    Exam(Exam),
}

fn event_title(event: &RemoteEvent) -> String {
    event
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("Untitled event")
        .to_string()
}

impl PlannerEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::ScheduleBlock(_) => EntityKind::ScheduleBlock,
            Self::Assignment(_) => EntityKind::Assignment,
            Self::Exam(_) => EntityKind::Exam,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::ScheduleBlock(b) => &b.id,
            Self::Assignment(a) => &a.id,
            Self::Exam(e) => &e.id,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::ScheduleBlock(b) => &b.user_id,
            Self::Assignment(a) => &a.user_id,
            Self::Exam(e) => &e.user_id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::ScheduleBlock(b) => &b.title,
            Self::Assignment(a) => &a.title,
            Self::Exam(e) => &e.title,
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        match self {
            Self::ScheduleBlock(b) => b.updated_at,
            Self::Assignment(a) => a.updated_at,
            Self::Exam(e) => e.updated_at,
        }
    }

    /// Materialize a brand-new schedule block from a remote event with no
    /// mapping. Assignments and exams are only ever created by the planner
    /// itself.
    pub fn schedule_block_from_remote(
        user_id: &str,
        event: &RemoteEvent,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let times = event.times()?;
        Ok(Self::ScheduleBlock(ScheduleBlock {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            title: event_title(event),
            description: event.description.clone(),
            location: event.location.clone(),
            start_time: times.start,
            end_time: times.end,
            updated_at: now,
        }))
    }

    /// Overwrite the syncable fields from a remote event snapshot.
    ///
    /// Field mapping is fixed per kind: schedule blocks take
    /// title/description/location/start/end, assignments take
    /// title/description/due date, exams take title/location/notes/date and
    /// duration.
    pub fn apply_remote(&mut self, event: &RemoteEvent, now: DateTime<Utc>) -> Result<()> {
        let times = event.times()?;
        match self {
            Self::ScheduleBlock(block) => {
                block.title = event_title(event);
                block.description = event.description.clone();
                block.location = event.location.clone();
                block.start_time = times.start;
                block.end_time = times.end;
                block.updated_at = now;
            }
            Self::Assignment(assignment) => {
                assignment.title = event_title(event);
                assignment.description = event.description.clone();
                assignment.due_date = times.start;
                assignment.updated_at = now;
            }
            Self::Exam(exam) => {
                exam.title = event_title(event);
                exam.location = event.location.clone();
                exam.notes = event.description.clone();
                exam.exam_date = times.start;
                let minutes = (times.end - times.start).num_minutes();
                exam.duration_minutes =
                    if minutes > 0 { minutes } else { DEFAULT_EXAM_DURATION_MINUTES };
                exam.updated_at = now;
            }
        }
        Ok(())
    }

    /// Apply a caller-supplied merged payload. Absent fields keep their
    /// current value.
    pub fn apply_merge(&mut self, patch: &MergePatch, now: DateTime<Utc>) {
        match self {
            Self::ScheduleBlock(block) => {
                if let Some(ref title) = patch.title {
                    block.title = title.clone();
                }
                if let Some(ref description) = patch.description {
                    block.description = Some(description.clone());
                }
                if let Some(ref location) = patch.location {
                    block.location = Some(location.clone());
                }
                if let Some(start) = patch.start_time {
                    block.start_time = start;
                }
                if let Some(end) = patch.end_time {
                    block.end_time = end;
                }
                block.updated_at = now;
            }
            Self::Assignment(assignment) => {
                if let Some(ref title) = patch.title {
                    assignment.title = title.clone();
                }
                if let Some(ref description) = patch.description {
                    assignment.description = Some(description.clone());
                }
                if let Some(start) = patch.start_time {
                    assignment.due_date = start;
                }
                assignment.updated_at = now;
            }
            Self::Exam(exam) => {
                if let Some(ref title) = patch.title {
                    exam.title = title.clone();
                }
                if let Some(ref description) = patch.description {
                    exam.notes = Some(description.clone());
                }
                if let Some(ref location) = patch.location {
                    exam.location = Some(location.clone());
                }
                if let Some(start) = patch.start_time {
                    exam.exam_date = start;
                }
                if let Some(end) = patch.end_time {
                    let minutes = (end - exam.exam_date).num_minutes();
                    if minutes > 0 {
                        exam.duration_minutes = minutes;
                    }
                }
                exam.updated_at = now;
            }
        }
    }

    /// Project the entity into the outbound event shape for a remote write.
    pub fn to_event_patch(&self) -> EventPatch {
        match self {
            Self::ScheduleBlock(block) => EventPatch {
                summary: block.title.clone(),
                description: block.description.clone(),
                location: block.location.clone(),
                start: block.start_time,
                end: block.end_time,
            },
            Self::Assignment(assignment) => EventPatch {
                summary: assignment.title.clone(),
                description: assignment.description.clone(),
                location: None,
                start: assignment.due_date,
                end: assignment.due_date
                    + chrono::Duration::minutes(ASSIGNMENT_EVENT_DURATION_MINUTES),
            },
            Self::Exam(exam) => EventPatch {
                summary: exam.title.clone(),
                description: exam.notes.clone(),
                location: exam.location.clone(),
                start: exam.exam_date,
                end: exam.exam_date + chrono::Duration::minutes(exam.duration_minutes),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::types::sync::EventTime;

    fn sample_event() -> RemoteEvent {
        RemoteEvent {
            id: "evt-1".into(),
            summary: Some("Linear Algebra".into()),
            description: Some("Chapter 4 problem set".into()),
            location: Some("Room 12".into()),
            updated: Some("2025-03-01T12:00:00Z".into()),
            start: EventTime {
                date_time: Some("2025-03-02T09:00:00Z".into()),
                date: None,
                time_zone: None,
            },
            end: EventTime {
                date_time: Some("2025-03-02T10:30:00Z".into()),
                date: None,
                time_zone: None,
            },
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    #[test]
    fn schedule_block_takes_all_event_fields() {
        let now = at(1_700_000_000);
        let mut entity = PlannerEntity::ScheduleBlock(ScheduleBlock {
            id: "blk-1".into(),
            user_id: "user-1".into(),
            title: "old".into(),
            description: None,
            location: None,
            start_time: at(0),
            end_time: at(0),
            updated_at: at(0),
        });

        entity.apply_remote(&sample_event(), now).expect("applies");

        let PlannerEntity::ScheduleBlock(block) = entity else {
            panic!("kind changed");
        };
        assert_eq!(block.title, "Linear Algebra");
        assert_eq!(block.location.as_deref(), Some("Room 12"));
        assert_eq!(block.start_time.to_rfc3339(), "2025-03-02T09:00:00+00:00");
        assert_eq!(block.updated_at, now);
    }

    #[test]
    fn assignment_due_date_tracks_event_start() {
        let mut entity = PlannerEntity::Assignment(Assignment {
            id: "asg-1".into(),
            user_id: "user-1".into(),
            title: "old".into(),
            description: None,
            due_date: at(0),
            updated_at: at(0),
        });

        entity.apply_remote(&sample_event(), at(1_700_000_000)).expect("applies");

        let PlannerEntity::Assignment(assignment) = entity else {
            panic!("kind changed");
        };
        assert_eq!(assignment.due_date.to_rfc3339(), "2025-03-02T09:00:00+00:00");
        assert_eq!(assignment.description.as_deref(), Some("Chapter 4 problem set"));
    }

    #[test]
    fn exam_duration_derived_from_event_span() {
        let mut entity = PlannerEntity::Exam(Exam {
            id: "exm-1".into(),
            user_id: "user-1".into(),
            title: "old".into(),
            location: None,
            notes: None,
            exam_date: at(0),
            duration_minutes: 0,
            updated_at: at(0),
        });

        entity.apply_remote(&sample_event(), at(1_700_000_000)).expect("applies");

        let PlannerEntity::Exam(exam) = entity else {
            panic!("kind changed");
        };
        assert_eq!(exam.duration_minutes, 90);
        assert_eq!(exam.notes.as_deref(), Some("Chapter 4 problem set"));
        assert_eq!(exam.location.as_deref(), Some("Room 12"));
    }

    #[test]
    fn blank_summary_falls_back_to_placeholder_title() {
        let mut event = sample_event();
        event.summary = Some("   ".into());
        let entity =
            PlannerEntity::schedule_block_from_remote("user-1", &event, at(1_700_000_000))
                .expect("created");
        assert_eq!(entity.title(), "Untitled event");
    }

    #[test]
    fn merge_patch_keeps_absent_fields() {
        let mut entity = PlannerEntity::ScheduleBlock(ScheduleBlock {
            id: "blk-1".into(),
            user_id: "user-1".into(),
            title: "Lecture".into(),
            description: Some("keep me".into()),
            location: None,
            start_time: at(100),
            end_time: at(200),
            updated_at: at(0),
        });

        entity.apply_merge(
            &MergePatch { title: Some("Merged title".into()), ..MergePatch::default() },
            at(1_700_000_000),
        );

        let PlannerEntity::ScheduleBlock(block) = entity else {
            panic!("kind changed");
        };
        assert_eq!(block.title, "Merged title");
        assert_eq!(block.description.as_deref(), Some("keep me"));
        assert_eq!(block.start_time, at(100));
    }

    #[test]
    fn exam_event_patch_spans_duration() {
        let entity = PlannerEntity::Exam(Exam {
            id: "exm-1".into(),
            user_id: "user-1".into(),
            title: "Final".into(),
            location: Some("Aula".into()),
            notes: None,
            exam_date: at(1_000_000),
            duration_minutes: 120,
            updated_at: at(0),
        });

        let patch = entity.to_event_patch();
        assert_eq!((patch.end - patch.start).num_minutes(), 120);
        assert_eq!(patch.location.as_deref(), Some("Aula"));
    }
}
