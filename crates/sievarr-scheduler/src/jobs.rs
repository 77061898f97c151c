// SPDX-License-Identifier: GPL-3.0-or-later
use crate::job::{Job, JobContext, JobResult};
use anyhow::Result;
use sievarr_infrastructure::repositories::ReleaseRepository;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Deletes stored releases, and with them their action history, once they
/// are older than the retention window.
///
/// Runs are single-flight: a tick that arrives while a previous run is still
/// deleting is skipped.
pub struct ReleaseCleanupJob {
    releases: Arc<dyn ReleaseRepository>,
    older_than_hours: u32,
    running: Arc<AtomicBool>,
}

impl ReleaseCleanupJob {
    pub fn new(releases: Arc<dyn ReleaseRepository>, older_than_hours: u32) -> Self {
        Self {
            releases,
            older_than_hours,
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Clears the running flag however the run ends.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[async_trait::async_trait]
impl Job for ReleaseCleanupJob {
    fn job_type(&self) -> &'static str {
        "release-cleanup"
    }

    fn name(&self) -> String {
        format!("Release cleanup (older than {}h)", self.older_than_hours)
    }

    async fn execute(&self, ctx: JobContext) -> Result<JobResult> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(target: "jobs", job_id = %ctx.job_id, "release cleanup already running, skipping tick");
            return Ok(JobResult::Skipped {
                reason: "previous run still in progress".to_string(),
            });
        }
        let _guard = RunGuard(self.running.clone());

        info!(
            target: "jobs",
            job_id = %ctx.job_id,
            older_than_hours = self.older_than_hours,
            "executing release cleanup"
        );

        match self.releases.delete_older_than(self.older_than_hours).await {
            Ok(deleted) => {
                info!(target: "jobs", job_id = %ctx.job_id, deleted, "release cleanup completed");
                Ok(JobResult::Success)
            }
            Err(err) => Ok(JobResult::Failure {
                error: err.to_string(),
                retry: true,
            }),
        }
    }

    fn max_retries(&self) -> u32 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use sievarr_domain::{FilterId, Release, ReleaseActionStatus, ReleaseId};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Records deletions and can park a run until released.
    #[derive(Default)]
    struct FakeReleases {
        stored: Mutex<Vec<Release>>,
        gate: Option<Arc<Notify>>,
        entered: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl ReleaseRepository for FakeReleases {
        async fn store(&self, release: &Release) -> Result<ReleaseId> {
            self.stored.lock().expect("lock").push(release.clone());
            Ok(release.id)
        }

        async fn store_action_status(&self, _status: &ReleaseActionStatus) -> Result<()> {
            Ok(())
        }

        async fn store_approved(
            &self,
            release: &Release,
            _status: &ReleaseActionStatus,
        ) -> Result<ReleaseId> {
            self.store(release).await
        }

        async fn find_history_by_filter_id(&self, _filter_id: FilterId) -> Result<Vec<Release>> {
            Ok(Vec::new())
        }

        async fn get_by_id(&self, _id: ReleaseId) -> Result<Option<Release>> {
            Ok(None)
        }

        async fn list_recent(&self, _limit: i64) -> Result<Vec<Release>> {
            Ok(self.stored.lock().expect("lock").clone())
        }

        async fn list_action_statuses(
            &self,
            _release_id: ReleaseId,
        ) -> Result<Vec<ReleaseActionStatus>> {
            Ok(Vec::new())
        }

        async fn delete_older_than(&self, hours: u32) -> Result<u64> {
            self.entered.notify_one();
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let cutoff = Utc::now() - Duration::hours(i64::from(hours));
            let mut stored = self.stored.lock().expect("lock");
            let before = stored.len();
            stored.retain(|r| r.timestamp >= cutoff);
            Ok((before - stored.len()) as u64)
        }
    }

    #[tokio::test]
    async fn deletes_only_old_releases() {
        let repo = Arc::new(FakeReleases::default());
        let mut old = Release::new("Old.Movie.2001.1080p.BluRay.x264-GRP");
        old.timestamp = Utc::now() - Duration::hours(48);
        repo.store(&old).await.expect("store");
        repo.store(&Release::new("New.Movie.2024.1080p.WEB.x264-GRP"))
            .await
            .expect("store");

        let job = ReleaseCleanupJob::new(repo.clone(), 24);
        let result = job
            .execute(JobContext::new("release-cleanup"))
            .await
            .expect("execute");

        assert_eq!(result, JobResult::Success);
        let remaining = repo.list_recent(10).await.expect("list");
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].release_name.starts_with("New.Movie"));
    }

    #[tokio::test]
    async fn overlapping_run_is_skipped() {
        let gate = Arc::new(Notify::new());
        let repo = Arc::new(FakeReleases {
            gate: Some(gate.clone()),
            ..FakeReleases::default()
        });
        let entered = repo.entered.clone();
        let job = Arc::new(ReleaseCleanupJob::new(repo, 24));

        let first = {
            let job = job.clone();
            tokio::spawn(async move { job.execute(JobContext::new("release-cleanup")).await })
        };
        entered.notified().await;

        let second = job
            .execute(JobContext::new("release-cleanup"))
            .await
            .expect("second run");
        assert!(matches!(second, JobResult::Skipped { .. }));

        gate.notify_one();
        let first = first.await.expect("join").expect("first run");
        assert_eq!(first, JobResult::Success);

        // the flag is cleared once the first run finishes
        gate.notify_one();
        let third = job.execute(JobContext::new("release-cleanup")).await.expect("third");
        assert_eq!(third, JobResult::Success);
    }
}
