// SPDX-License-Identifier: GPL-3.0-or-later
use crate::job::{Job, JobContext, JobResult};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

/// Job schedule configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Run at fixed intervals, first run immediately
    Interval(Duration),
    /// Run once immediately, then never again
    Once,
}

struct RegisteredJob {
    job: Arc<dyn Job>,
    schedule: Schedule,
}

/// Job registry that manages and executes scheduled jobs
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<String, RegisteredJob>>>,
    max_concurrent: usize,
}

impl JobRegistry {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub async fn register(
        &self,
        job_id: impl Into<String>,
        job: impl Job + 'static,
        schedule: Schedule,
    ) {
        let job_id = job_id.into();
        let registered = RegisteredJob {
            job: Arc::new(job) as Arc<dyn Job>,
            schedule,
        };

        let mut jobs = self.jobs.write().await;
        info!(target: "registry", %job_id, job_type = registered.job.job_type(), "registering job");
        jobs.insert(job_id, registered);
    }

    pub async fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Run a registered job once, right now, without retries.
    pub async fn run_now(&self, job_id: &str) -> Result<JobResult> {
        let job = self
            .jobs
            .read()
            .await
            .get(job_id)
            .map(|registered| registered.job.clone())
            .ok_or_else(|| anyhow!("unknown job: {job_id}"))?;
        job.execute(JobContext::new(job_id)).await
    }

    /// Spawn one driver task per registered job. Each driver runs its job
    /// in place, so aborting a handle also cancels a run in progress.
    /// Dropping the handles does not stop them.
    pub async fn start(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        info!(target: "registry", max_concurrent = self.max_concurrent, "starting job registry");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let jobs = self.jobs.read().await;
        let mut handles = Vec::with_capacity(jobs.len());

        for (job_id, registered) in jobs.iter() {
            let job_id = job_id.clone();
            let job = registered.job.clone();
            let semaphore = semaphore.clone();

            let handle = match registered.schedule.clone() {
                Schedule::Interval(period) => tokio::spawn(async move {
                    let mut ticker = interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        ticker.tick().await;
                        // Run inside the driver so aborting it cancels an in-flight run.
                        if let Ok(_permit) = semaphore.clone().acquire_owned().await {
                            Self::execute_job(job_id.clone(), job.clone()).await;
                        }
                    }
                }),
                Schedule::Once => tokio::spawn(async move {
                    if let Ok(_permit) = semaphore.acquire_owned().await {
                        Self::execute_job(job_id, job).await;
                    }
                }),
            };
            handles.push(handle);
        }

        info!(target: "registry", "job registry started with {} jobs", jobs.len());
        handles
    }

    /// Execute a single job with retry logic, returning the last result.
    async fn execute_job(job_id: String, job: Arc<dyn Job>) -> Option<JobResult> {
        let mut ctx = JobContext::new(&job_id);
        let max_attempts = if job.is_retriable() {
            job.max_retries() + 1
        } else {
            1
        };

        loop {
            info!(
                target: "registry",
                job_id = %job_id,
                job_type = job.job_type(),
                attempt = ctx.attempt,
                max_attempts,
                "executing job"
            );

            let retry = match job.execute(ctx.clone()).await {
                Ok(JobResult::Success) => {
                    info!(
                        target: "registry",
                        job_id = %job_id,
                        job_type = job.job_type(),
                        attempts = ctx.attempt,
                        "job completed successfully"
                    );
                    return Some(JobResult::Success);
                }
                Ok(JobResult::Skipped { reason }) => {
                    info!(target: "registry", job_id = %job_id, %reason, "job run skipped");
                    return Some(JobResult::Skipped { reason });
                }
                Ok(JobResult::Failure { error, retry }) => {
                    error!(
                        target: "registry",
                        job_id = %job_id,
                        job_type = job.job_type(),
                        attempts = ctx.attempt,
                        %error,
                        retry,
                        "job failed"
                    );
                    if !retry {
                        return Some(JobResult::Failure { error, retry });
                    }
                    true
                }
                Err(err) => {
                    error!(
                        target: "registry",
                        job_id = %job_id,
                        job_type = job.job_type(),
                        attempts = ctx.attempt,
                        error = %err,
                        "job execution error"
                    );
                    job.is_retriable()
                }
            };

            if !retry || ctx.attempt >= max_attempts {
                error!(target: "registry", job_id = %job_id, "job exhausted all retry attempts");
                return None;
            }

            let delay = Duration::from_secs(job.retry_delay_seconds());
            warn!(target: "registry", job_id = %job_id, ?delay, "retrying job after delay");
            tokio::time::sleep(delay).await;
            ctx = ctx.next_attempt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::sync::Notify;

    struct CountingJob {
        runs: Arc<AtomicU32>,
        fail_first: u32,
    }

    #[async_trait::async_trait]
    impl Job for CountingJob {
        fn job_type(&self) -> &'static str {
            "counting"
        }

        fn name(&self) -> String {
            "Counting".to_string()
        }

        async fn execute(&self, _ctx: JobContext) -> Result<JobResult> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if run <= self.fail_first {
                return Ok(JobResult::Failure {
                    error: "not yet".to_string(),
                    retry: true,
                });
            }
            Ok(JobResult::Success)
        }

        fn retry_delay_seconds(&self) -> u64 {
            0
        }
    }

    #[tokio::test]
    async fn run_now_executes_registered_job() {
        let registry = JobRegistry::new(2);
        let runs = Arc::new(AtomicU32::new(0));
        registry
            .register(
                "counting",
                CountingJob {
                    runs: runs.clone(),
                    fail_first: 0,
                },
                Schedule::Once,
            )
            .await;

        assert_eq!(registry.job_ids().await, vec!["counting".to_string()]);
        let result = registry.run_now("counting").await.expect("run");
        assert_eq!(result, JobResult::Success);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(registry.run_now("missing").await.is_err());
    }

    #[tokio::test]
    async fn failures_are_retried() {
        let runs = Arc::new(AtomicU32::new(0));
        let job: Arc<dyn Job> = Arc::new(CountingJob {
            runs: runs.clone(),
            fail_first: 2,
        });

        let result = JobRegistry::execute_job("counting".to_string(), job).await;
        assert_eq!(result, Some(JobResult::Success));
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let runs = Arc::new(AtomicU32::new(0));
        let job: Arc<dyn Job> = Arc::new(CountingJob {
            runs: runs.clone(),
            fail_first: u32::MAX,
        });

        let result = JobRegistry::execute_job("counting".to_string(), job).await;
        assert_eq!(result, None);
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn once_schedule_runs_after_start() {
        let registry = Arc::new(JobRegistry::new(1));
        let runs = Arc::new(AtomicU32::new(0));
        registry
            .register(
                "counting",
                CountingJob {
                    runs: runs.clone(),
                    fail_first: 0,
                },
                Schedule::Once,
            )
            .await;

        let handles = registry.start().await;
        for handle in handles {
            handle.await.expect("job task");
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    struct BlockingJob {
        started: Arc<Notify>,
        cancelled: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl Job for BlockingJob {
        fn job_type(&self) -> &'static str {
            "blocking"
        }

        fn name(&self) -> String {
            "Blocking".to_string()
        }

        async fn execute(&self, _ctx: JobContext) -> Result<JobResult> {
            let _flag = SetOnDrop(self.cancelled.clone());
            self.started.notify_one();
            std::future::pending::<()>().await;
            Ok(JobResult::Success)
        }
    }

    #[tokio::test]
    async fn aborting_drivers_cancels_running_jobs() {
        let registry = Arc::new(JobRegistry::new(1));
        let started = Arc::new(Notify::new());
        let cancelled = Arc::new(AtomicBool::new(false));
        registry
            .register(
                "blocking",
                BlockingJob {
                    started: started.clone(),
                    cancelled: cancelled.clone(),
                },
                Schedule::Interval(Duration::from_secs(3600)),
            )
            .await;

        let handles = registry.start().await;
        started.notified().await;
        assert!(!cancelled.load(Ordering::SeqCst));

        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            assert!(handle.await.expect_err("aborted").is_cancelled());
        }
        assert!(cancelled.load(Ordering::SeqCst));
    }
}
