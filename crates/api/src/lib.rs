//! # Aqademiq API
//!
//! HTTP surface of the sync service: webhook ingestion, conflict
//! listing/resolution, and health checks. The binary (`aqademiq-syncd`)
//! wires configuration, storage, the Google client, the scheduler, and this
//! router together.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
