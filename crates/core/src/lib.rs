//! # Aqademiq Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for the mapping store, planner entity
//!   store, and remote calendar
//! - The change detector (inbound event classification)
//! - The conflict resolver (strategy application)
//! - The sync service (per-mapping serialization, batch processing)
//!
//! ## Architecture Principles
//! - Only depends on `aqademiq-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod sync;

// Re-export specific items to avoid ambiguity
pub use sync::change_detector::ChangeDetector;
pub use sync::conflict_resolver::ConflictResolver;
pub use sync::ports::{EntityStore, MappingStore, RemoteCalendar};
pub use sync::service::SyncService;
