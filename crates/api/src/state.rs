//! Shared application state

use std::sync::Arc;

use aqademiq_core::SyncService;
use aqademiq_infra::DbManager;

/// State shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SyncService>,
    pub db: Arc<DbManager>,
}

impl AppState {
    pub fn new(service: Arc<SyncService>, db: Arc<DbManager>) -> Self {
        Self { service, db }
    }
}
