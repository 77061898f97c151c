// SPDX-License-Identifier: GPL-3.0-or-later
use sievarr_config::AppConfig;
pub mod duplicates;
pub mod events;
pub mod filter_criteria;
pub mod filters;
pub mod indexers;
pub mod matching;
pub mod processor;
pub mod profiles;
pub mod release_parsing;

#[cfg(test)]
mod test_support;

pub use duplicates::{find_duplicate, is_duplicate};
pub use events::{EventPublisher, InMemoryEventBus, TracingEventPublisher};
pub use filters::{FilterError, FilterService};
pub use indexers::{IndexerError, IndexerService};
pub use matching::{MatchResult, MatchingError, MatchingResult, ReleaseMatcher};
pub use processor::{ProcessError, ReleaseProcessor};
pub use profiles::{DuplicateProfileService, ProfileError};
pub use release_parsing::{parse_release_name, try_parse_release_name, ParseError};

use sievarr_infrastructure::repositories::{
    DuplicateProfileRepository, FilterRepository, IndexerRepository, ReleaseRepository,
};
use std::sync::Arc;
use tracing::info;

/// Services shared by the HTTP layer and background workers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub profiles: Arc<DuplicateProfileService>,
    pub filters: Arc<FilterService>,
    pub indexers: Arc<IndexerService>,
    pub processor: Arc<ReleaseProcessor<TracingEventPublisher>>,
    pub releases: Arc<dyn ReleaseRepository>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        profiles: Arc<dyn DuplicateProfileRepository>,
        filters: Arc<dyn FilterRepository>,
        indexers: Arc<dyn IndexerRepository>,
        releases: Arc<dyn ReleaseRepository>,
    ) -> Self {
        let matcher = Arc::new(ReleaseMatcher::new(
            filters.clone(),
            profiles.clone(),
            releases.clone(),
        ));
        Self {
            config,
            profiles: Arc::new(DuplicateProfileService::new(profiles.clone(), filters.clone())),
            filters: Arc::new(FilterService::new(filters, profiles, indexers.clone())),
            indexers: Arc::new(IndexerService::new(indexers)),
            processor: Arc::new(ReleaseProcessor::new(
                matcher,
                releases.clone(),
                TracingEventPublisher,
            )),
            releases,
        }
    }

    pub fn matcher(&self) -> &Arc<ReleaseMatcher> {
        self.processor.matcher()
    }

    pub fn on_start(&self) {
        info!(
            target: "application",
            auth = self.config.auth.api_key.is_some(),
            retention = self.config.retention.enabled,
            "application state initialized"
        );
    }
}
