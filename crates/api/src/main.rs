//! `aqademiq-syncd` — calendar sync service daemon
//!
//! Wires configuration, storage, the Google Calendar client, the cron
//! scheduler, and the HTTP router, then serves until shutdown.

use std::sync::Arc;

use aqademiq_api::{build_router, AppState};
use aqademiq_core::{EntityStore, MappingStore, RemoteCalendar, SyncService};
use aqademiq_infra::config;
use aqademiq_infra::integrations::calendar::{CalendarClient, EventSyncWorker};
use aqademiq_infra::scheduling::{SyncScheduler, SyncSchedulerConfig};
use aqademiq_infra::{DbManager, SqliteMappingStore, SqlitePlannerStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env
    // injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("aqademiq_syncd=info".parse().expect("valid directive")),
        )
        .init();

    let config = config::load()?;
    tracing::info!(db_path = %config.database.path, "starting aqademiq-syncd");

    let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
    db.run_migrations()?;

    let mappings: Arc<dyn MappingStore> = Arc::new(SqliteMappingStore::new(Arc::clone(&db)));
    let entities: Arc<dyn EntityStore> = Arc::new(SqlitePlannerStore::new(Arc::clone(&db)));
    let client = Arc::new(CalendarClient::new("google", config.google.clone())?);
    let remote: Arc<dyn RemoteCalendar> = Arc::clone(&client) as Arc<dyn RemoteCalendar>;

    let service = Arc::new(SyncService::new(mappings, entities, remote));

    let mut scheduler = if config.sync.enabled {
        let worker = Arc::new(EventSyncWorker::new(
            Arc::clone(&client),
            Arc::clone(&service),
            Arc::clone(&db),
            config.sync.clone(),
        ));
        let mut scheduler = SyncScheduler::with_config(
            SyncSchedulerConfig {
                cron_expression: config.sync.cron_expression.clone(),
                users: config.sync.users.clone(),
                ..SyncSchedulerConfig::default()
            },
            worker,
        );
        scheduler.start().await?;
        Some(scheduler)
    } else {
        tracing::info!("periodic sync disabled, serving webhook surface only");
        None
    };

    let state = AppState::new(service, db);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!(bind_addr = %config.server.bind_addr, "aqademiq-syncd listening");
    axum::serve(listener, router).await?;

    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.stop().await?;
    }

    Ok(())
}
