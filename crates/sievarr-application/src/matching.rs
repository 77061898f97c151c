// SPDX-License-Identifier: GPL-3.0-or-later

//! Filter selection for incoming releases.
//!
//! Filters bound to the release's indexer are tried highest priority first.
//! The first filter whose criteria pass and whose history holds no duplicate
//! accepts the release; otherwise the release is rejected with the reasons
//! collected from every filter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use serde::Serialize;
use sievarr_domain::{FilterId, Release};
use sievarr_infrastructure::repositories::{
    DuplicateProfileRepository, FilterRepository, ReleaseRepository,
};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::duplicates::find_duplicate;
use crate::filter_criteria::check_filter;

pub const NO_ACTIVE_FILTERS: &str = "no active filters";

/// Errors that can occur during release matching
#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Result type for matching operations
pub type MatchingResult<T> = Result<T, MatchingError>;

/// Outcome of evaluating one release against its indexer's filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub filter_id: Option<FilterId>,
    pub filter_name: Option<String>,
    pub accepted: bool,
    /// Criteria passed for at least one filter, but each such filter
    /// already had the release in its history.
    pub duplicate: bool,
    pub rejections: Vec<String>,
}

impl MatchResult {
    fn accepted(filter_id: FilterId, filter_name: String) -> Self {
        Self {
            filter_id: Some(filter_id),
            filter_name: Some(filter_name),
            accepted: true,
            duplicate: false,
            rejections: Vec::new(),
        }
    }

    fn rejected(duplicate: bool, rejections: Vec<String>) -> Self {
        Self {
            filter_id: None,
            filter_name: None,
            accepted: false,
            duplicate,
            rejections,
        }
    }
}

/// One async mutex per filter, created on first use.
///
/// An entry stays in the table while any guard or waiter holds its mutex;
/// entries nobody references are pruned on the next `lock` call.
#[derive(Clone, Default)]
pub struct FilterLocks {
    locks: Arc<StdMutex<HashMap<FilterId, Arc<Mutex<()>>>>>,
}

impl FilterLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, filter_id: FilterId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(filter_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of filters with a live mutex.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An accepting decision together with the filter lock taken for its
/// duplicate check, if one ran.
pub(crate) struct LockedDecision {
    pub result: MatchResult,
    pub guard: Option<OwnedMutexGuard<()>>,
}

/// Selects the filter that takes a release.
pub struct ReleaseMatcher {
    filters: Arc<dyn FilterRepository>,
    profiles: Arc<dyn DuplicateProfileRepository>,
    releases: Arc<dyn ReleaseRepository>,
    locks: FilterLocks,
}

impl ReleaseMatcher {
    pub fn new(
        filters: Arc<dyn FilterRepository>,
        profiles: Arc<dyn DuplicateProfileRepository>,
        releases: Arc<dyn ReleaseRepository>,
    ) -> Self {
        Self {
            filters,
            profiles,
            releases,
            locks: FilterLocks::new(),
        }
    }

    pub fn locks(&self) -> &FilterLocks {
        &self.locks
    }

    /// Evaluate `release` without storing anything.
    pub async fn evaluate(&self, release: &Release) -> MatchingResult<MatchResult> {
        let decision = self.evaluate_locked(release).await?;
        Ok(decision.result)
    }

    /// Evaluate and, on acceptance, keep holding the accepting filter's lock
    /// so the caller can persist the release before anyone else compares
    /// against that filter's history.
    pub(crate) async fn evaluate_locked(&self, release: &Release) -> MatchingResult<LockedDecision> {
        let filters = self
            .filters
            .find_by_indexer_identifier(&release.indexer)
            .await?;

        if filters.is_empty() {
            warn!(
                target: "matching",
                indexer = %release.indexer,
                release = %release.release_name,
                "no active filters for indexer"
            );
            return Ok(LockedDecision {
                result: MatchResult::rejected(false, vec![NO_ACTIVE_FILTERS.to_string()]),
                guard: None,
            });
        }

        let mut rejections = Vec::new();
        let mut criteria_passed = false;

        for filter in filters {
            let reasons = check_filter(&filter, release);
            if !reasons.is_empty() {
                debug!(
                    target: "matching",
                    filter = %filter.name,
                    release = %release.release_name,
                    rejections = ?reasons,
                    "filter criteria rejected release"
                );
                rejections.extend(reasons);
                continue;
            }
            criteria_passed = true;

            let profile = self.profiles.find_by_filter_id(filter.id).await?;
            if profile.enabled_fields().is_empty() {
                info!(
                    target: "matching",
                    filter = %filter.name,
                    release = %release.release_name,
                    "release accepted, no duplicate profile"
                );
                return Ok(LockedDecision {
                    result: MatchResult::accepted(filter.id, filter.name),
                    guard: None,
                });
            }

            let guard = self.locks.lock(filter.id).await;
            let history = self.releases.find_history_by_filter_id(filter.id).await?;

            match find_duplicate(release, &profile, &history) {
                Some(existing) => {
                    debug!(
                        target: "matching",
                        filter = %filter.name,
                        release = %release.release_name,
                        existing = %existing.release_name,
                        "duplicate under filter"
                    );
                    rejections.push(format!(
                        "duplicate release. filter: {} profile: {} existing: {}",
                        filter.name, profile.name, existing.release_name
                    ));
                }
                None => {
                    info!(
                        target: "matching",
                        filter = %filter.name,
                        release = %release.release_name,
                        history = history.len(),
                        "release accepted"
                    );
                    return Ok(LockedDecision {
                        result: MatchResult::accepted(filter.id, filter.name),
                        guard: Some(guard),
                    });
                }
            }
        }

        debug!(
            target: "matching",
            release = %release.release_name,
            duplicate = criteria_passed,
            "release rejected by all filters"
        );
        Ok(LockedDecision {
            result: MatchResult::rejected(criteria_passed, rejections),
            guard: None,
        })
    }
}
