//! Domain types and models

pub mod planner;
pub mod sync;

// Re-export the types used throughout the workspace
pub use planner::{Assignment, EntityKind, Exam, PlannerEntity, ScheduleBlock};
pub use sync::{
    BatchReport, ConflictStatus, EventMapping, EventPatch, EventTime, EventTimes, MergePatch,
    RemoteEvent, ResolutionStrategy, SyncAction, SyncConflict,
};
