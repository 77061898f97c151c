// SPDX-License-Identifier: GPL-3.0-or-later

//! Ingestion entry point: evaluate a release and append accepted ones to the
//! accepting filter's history.

use std::sync::Arc;

use sievarr_domain::{
    DomainEvent, Release, ReleaseActionStatus, ReleaseApproved, ReleaseApprovedPayload,
    ReleaseFilterStatus, ReleaseRejected, ReleaseRejectedPayload, Validate, ValidationError,
};
use sievarr_infrastructure::repositories::ReleaseRepository;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::events::EventPublisher;
use crate::matching::{MatchResult, MatchingError, ReleaseMatcher};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("invalid release: {0:?}")]
    Validation(Vec<ValidationError>),
    #[error(transparent)]
    Matching(#[from] MatchingError),
    #[error("failed to store release: {0}")]
    Storage(#[from] anyhow::Error),
}

pub struct ReleaseProcessor<P: EventPublisher> {
    matcher: Arc<ReleaseMatcher>,
    releases: Arc<dyn ReleaseRepository>,
    events: P,
}

impl<P: EventPublisher> ReleaseProcessor<P> {
    pub fn new(
        matcher: Arc<ReleaseMatcher>,
        releases: Arc<dyn ReleaseRepository>,
        events: P,
    ) -> Self {
        Self {
            matcher,
            releases,
            events,
        }
    }

    pub fn matcher(&self) -> &Arc<ReleaseMatcher> {
        &self.matcher
    }

    /// Evaluate `release` and store it when a filter accepts it.
    ///
    /// The accepting filter stays locked until the release and its
    /// `PUSH_APPROVED` status are written, so a concurrent evaluation under
    /// the same filter sees this release as history.
    pub async fn process(&self, mut release: Release) -> Result<MatchResult, ProcessError> {
        release.validate().map_err(ProcessError::Validation)?;

        let decision = self.matcher.evaluate_locked(&release).await?;
        let result = decision.result;

        let (filter_id, filter_name) = match (result.filter_id, result.filter_name.clone()) {
            (Some(id), Some(name)) if result.accepted => (id, name),
            _ => {
                release.filter_status = ReleaseFilterStatus::FilterRejected;
                debug!(
                    target: "processor",
                    release = %release.release_name,
                    indexer = %release.indexer,
                    duplicate = result.duplicate,
                    "release rejected"
                );
                let event: ReleaseRejected = DomainEvent::new(
                    "release.rejected",
                    ReleaseRejectedPayload {
                        release_name: release.release_name.clone(),
                        indexer: release.indexer.clone(),
                        duplicate: result.duplicate,
                        rejections: result.rejections.clone(),
                    },
                );
                self.events.publish(&event);
                return Ok(result);
            }
        };

        release.filter_id = Some(filter_id);
        release.filter_status = ReleaseFilterStatus::FilterApproved;

        let status = ReleaseActionStatus::approved(release.id, filter_id, filter_name.clone());
        let stored = self.releases.store_approved(&release, &status).await;
        drop(decision.guard);

        let release_id = stored.map_err(|err| {
            error!(
                target: "processor",
                release = %release.release_name,
                filter = %filter_name,
                error = %err,
                "failed to store approved release"
            );
            ProcessError::Storage(err)
        })?;

        info!(
            target: "processor",
            release = %release.release_name,
            release_id = %release_id,
            filter = %filter_name,
            "release approved"
        );
        let event: ReleaseApproved = DomainEvent::new(
            "release.approved",
            ReleaseApprovedPayload {
                release_id,
                filter_id,
                filter_name,
                release_name: release.release_name.clone(),
            },
        );
        self.events.publish(&event);

        Ok(result)
    }

    /// Process a batch in order, stopping at the first failure so the
    /// caller can retry from that release.
    pub async fn process_many(
        &self,
        releases: Vec<Release>,
    ) -> Result<Vec<MatchResult>, ProcessError> {
        let mut results = Vec::with_capacity(releases.len());
        for release in releases {
            results.push(self.process(release).await?);
        }
        Ok(results)
    }
}
