//! Calendar synchronization scheduler for periodic polls.
//!
//! Provides a cron-based scheduler that triggers a poll for every
//! configured user at fixed intervals. Join handles are tracked,
//! cancellation is explicit, and every asynchronous operation is wrapped in
//! a timeout.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::integrations::calendar::EventSyncWorker;
use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the sync scheduler.
#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    /// Cron expression describing the execution schedule.
    pub cron_expression: String,
    /// User ids to poll calendars for.
    pub users: Vec<String>,
    /// Timeout applied to a single poll execution.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 */15 * * * *".into(), // every 15 minutes
            users: Vec::new(),
            job_timeout: Duration::from_secs(300),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Calendar synchronization scheduler with explicit lifecycle management.
pub struct SyncScheduler {
    scheduler: Option<JobScheduler>,
    config: SyncSchedulerConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    worker: Arc<EventSyncWorker>,
}

impl SyncScheduler {
    /// Create a scheduler with the default configuration.
    pub fn new(
        cron_expression: String,
        users: Vec<String>,
        worker: Arc<EventSyncWorker>,
    ) -> Self {
        let config = SyncSchedulerConfig { cron_expression, users, ..Default::default() };
        Self::with_config(config, worker)
    }

    /// Create a scheduler with a custom configuration.
    pub fn with_config(config: SyncSchedulerConfig, worker: Arc<EventSyncWorker>) -> Self {
        Self {
            scheduler: None,
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            worker,
        }
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler_instance = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;

        tokio::time::timeout(start_timeout, scheduler_instance.start())
            .await
            .map_err(|_| SchedulerError::Timeout { seconds: start_timeout.as_secs() })?
            .map_err(|source| SchedulerError::StartFailed(source.to_string()))?;

        self.scheduler = Some(scheduler_instance);

        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            Self::monitor_task(cancel).await;
        });

        self.monitor_handle = Some(handle);
        info!("Sync scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let mut scheduler = match self.scheduler.take() {
            Some(scheduler) => scheduler,
            None => return Err(SchedulerError::NotRunning),
        };

        let stop_timeout = self.config.stop_timeout;
        tokio::time::timeout(stop_timeout, async move { scheduler.shutdown().await })
            .await
            .map_err(|_| SchedulerError::Timeout { seconds: stop_timeout.as_secs() })?
            .map_err(|source| SchedulerError::StopFailed(source.to_string()))?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: join_timeout.as_secs() })?
                .map_err(|e| SchedulerError::TaskJoinFailed(e.to_string()))?;
        }

        info!("Sync scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when a scheduler instance is active.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed(source.to_string()))?;
        let cron_expr = self.config.cron_expression.clone();
        let worker = Arc::clone(&self.worker);
        let job_timeout = self.config.job_timeout;
        let users = self.config.users.clone();
        let cancel = self.cancellation.clone();

        let job_definition = Job::new_async(cron_expr.as_str(), move |_id, _lock| {
            let worker = Arc::clone(&worker);
            let users = users.clone();
            let cancel = cancel.clone();

            Box::pin(async move {
                match tokio::time::timeout(
                    job_timeout,
                    Self::poll_all_users(worker, users, cancel),
                )
                .await
                {
                    Ok(Ok(())) => debug!("Calendar poll finished successfully"),
                    Ok(Err(err)) => error!(error = %err, "Calendar poll failed"),
                    Err(_) => {
                        warn!(timeout_secs = job_timeout.as_secs(), "Calendar poll timed out");
                    }
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed(source.to_string()))?;

        let job_id = job_definition.guid();
        scheduler
            .add(job_definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed(source.to_string()))?;

        debug!(cron = %self.config.cron_expression, job_id = %job_id, "Registered calendar poll job");
        Ok(scheduler)
    }

    async fn poll_all_users(
        worker: Arc<EventSyncWorker>,
        users: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<(), PollRunError> {
        if users.is_empty() {
            debug!("No users configured for calendar sync");
            return Ok(());
        }

        info!(user_count = users.len(), "Starting calendar poll for configured users");

        let mut total_processed = 0;
        let mut errors = 0;
        let mut failed_users = Vec::new();

        for user_id in &users {
            if cancel.is_cancelled() {
                info!("poll run cancelled before completing all users");
                break;
            }

            match worker.sync_user(user_id, &cancel).await {
                Ok(report) => {
                    total_processed += report.processed;
                    debug!(
                        user_id,
                        processed = report.processed,
                        conflicts = report.conflicts,
                        "user poll completed"
                    );
                }
                Err(err) => {
                    errors += 1;
                    warn!(user_id, error = %err, "user poll failed");
                    failed_users.push(user_id.clone());
                }
            }
        }

        info!(total_users = users.len(), total_processed, errors, "Calendar poll run completed");

        if errors > 0 {
            return Err(PollRunError { errors, total_users: users.len(), failed_users });
        }

        Ok(())
    }

    async fn monitor_task(cancel: CancellationToken) {
        cancel.cancelled().await;
        debug!("Sync scheduler monitor cancelled");
    }
}

#[derive(Debug)]
struct PollRunError {
    errors: usize,
    total_users: usize,
    failed_users: Vec<String>,
}

impl fmt::Display for PollRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Calendar poll encountered {} errors across {} users",
            self.errors, self.total_users
        )?;

        if !self.failed_users.is_empty() {
            write!(f, " (failed: {})", self.failed_users.join(", "))?;
        }

        Ok(())
    }
}

impl std::error::Error for PollRunError {}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("SyncScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
