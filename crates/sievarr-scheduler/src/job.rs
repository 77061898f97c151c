// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::fmt;

/// Execution context handed to a job run
#[derive(Clone, Debug)]
pub struct JobContext {
    pub job_id: String,
    pub execution_time: DateTime<Utc>,
    pub attempt: u32,
}

impl JobContext {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            execution_time: Utc::now(),
            attempt: 1,
        }
    }

    pub fn next_attempt(&self) -> Self {
        Self {
            job_id: self.job_id.clone(),
            execution_time: Utc::now(),
            attempt: self.attempt + 1,
        }
    }
}

/// Outcome of a single job run
#[derive(Debug, PartialEq, Eq)]
pub enum JobResult {
    Success,
    /// The run did not start, e.g. because a previous run is still active.
    Skipped { reason: String },
    Failure { error: String, retry: bool },
}

/// Core trait for all background jobs
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// Unique identifier for this job type
    fn job_type(&self) -> &'static str;

    /// Human-readable job name
    fn name(&self) -> String;

    async fn execute(&self, ctx: JobContext) -> Result<JobResult>;

    fn is_retriable(&self) -> bool {
        true
    }

    fn max_retries(&self) -> u32 {
        3
    }

    /// Backoff delay in seconds between retries
    fn retry_delay_seconds(&self) -> u64 {
        60
    }
}

impl fmt::Debug for dyn Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("type", &self.job_type())
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_count_up() {
        let ctx = JobContext::new("release-cleanup");
        assert_eq!(ctx.attempt, 1);
        let retry = ctx.next_attempt();
        assert_eq!(retry.attempt, 2);
        assert_eq!(retry.job_id, "release-cleanup");
        assert!(retry.execution_time >= ctx.execution_time);
    }
}
