// SPDX-License-Identifier: GPL-3.0-or-later
pub mod job;
pub mod jobs;
pub mod registry;

use anyhow::Result;
use registry::JobRegistry;
use sievarr_config::AppConfig;
use sievarr_infrastructure::repositories::ReleaseRepository;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::info;

use jobs::ReleaseCleanupJob;

pub struct Scheduler {
    config: AppConfig,
    registry: Arc<JobRegistry>,
    releases: Arc<dyn ReleaseRepository>,
}

impl Scheduler {
    pub fn new(config: AppConfig, releases: Arc<dyn ReleaseRepository>) -> Self {
        let registry = Arc::new(JobRegistry::new(config.scheduler.max_concurrent_jobs));
        Self {
            config,
            registry,
            releases,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Register all background jobs with their schedules
    pub async fn register_jobs(&self) {
        info!(target: "scheduler", "registering background jobs");

        let retention = &self.config.retention;
        if retention.enabled {
            self.registry
                .register(
                    "release-cleanup",
                    ReleaseCleanupJob::new(self.releases.clone(), retention.older_than_hours),
                    Schedule::Interval(Duration::from_secs(retention.interval_seconds.max(1))),
                )
                .await;
        } else {
            info!(target: "scheduler", "release retention disabled");
        }

        info!(target: "scheduler", "all jobs registered");
    }

    /// Start the scheduler and return a handle to the background task.
    /// Aborting the handle stops every job driver along with any job it is
    /// running.
    pub fn start(self) -> JoinHandle<Result<()>> {
        let registry = self.registry.clone();
        tokio::spawn(async move {
            let drivers = registry.start().await;
            let _abort_on_drop = AbortOnDrop(drivers);
            std::future::pending::<()>().await;
            Ok(())
        })
    }
}

struct AbortOnDrop(Vec<JoinHandle<()>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

// Re-export key types for convenience
pub use job::{Job, JobContext, JobResult};
pub use registry::Schedule;

#[cfg(test)]
mod tests {
    use super::*;
    use sievarr_infrastructure::init_database;
    use sievarr_infrastructure::sqlite_adapters::SqliteReleaseRepository;

    async fn scheduler(config: AppConfig) -> Scheduler {
        let mut db_config = config.clone();
        db_config.database.url = "sqlite::memory:".to_string();
        let pool = init_database(&db_config).await.expect("init database");
        Scheduler::new(config, Arc::new(SqliteReleaseRepository::new(pool)))
    }

    #[tokio::test]
    async fn registers_cleanup_when_retention_enabled() {
        let scheduler = scheduler(AppConfig::default()).await;
        scheduler.register_jobs().await;

        assert_eq!(
            scheduler.registry().job_ids().await,
            vec!["release-cleanup".to_string()]
        );
        let result = scheduler
            .registry()
            .run_now("release-cleanup")
            .await
            .expect("run cleanup");
        assert_eq!(result, JobResult::Success);
    }

    #[tokio::test]
    async fn no_jobs_when_retention_disabled() {
        let mut config = AppConfig::default();
        config.retention.enabled = false;
        let scheduler = scheduler(config).await;
        scheduler.register_jobs().await;

        assert!(scheduler.registry().job_ids().await.is_empty());
    }
}
