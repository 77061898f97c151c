// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Result;
use sievarr_domain::{
    DuplicateProfileId, DuplicateReleaseProfile, Filter, FilterId, Indexer, IndexerId, Release,
    ReleaseActionStatus, ReleaseId,
};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Typed failures carried inside `anyhow::Error` so callers can downcast.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

// ============================================================================
// Repository Traits
// ============================================================================

/// Generic repository for CRUD operations on a domain entity
#[async_trait::async_trait]
pub trait Repository<T, Id>: Send + Sync {
    async fn create(&self, entity: T) -> Result<T>;
    async fn get_by_id(&self, id: Id) -> Result<Option<T>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<T>>;
    /// Fails with [`RepositoryError::NotFound`] when the row does not exist.
    async fn update(&self, entity: T) -> Result<T>;
    async fn delete(&self, id: Id) -> Result<()>;
}

/// Duplicate profile store
#[async_trait::async_trait]
pub trait DuplicateProfileRepository:
    Repository<DuplicateReleaseProfile, DuplicateProfileId>
{
    /// Profile attached to the filter, or the all-false default when the
    /// filter has none.
    async fn find_by_filter_id(&self, filter_id: FilterId) -> Result<DuplicateReleaseProfile>;
}

/// Filter repository with indexer bindings
#[async_trait::async_trait]
pub trait FilterRepository: Repository<Filter, FilterId> {
    /// Enabled filters reachable from an enabled indexer through an enabled
    /// binding, highest priority first, then name, then id.
    async fn find_by_indexer_identifier(&self, identifier: &str) -> Result<Vec<Filter>>;
    async fn find_by_duplicate_profile(&self, profile_id: DuplicateProfileId)
        -> Result<Vec<Filter>>;
    async fn connect_indexer(
        &self,
        filter_id: FilterId,
        indexer_id: IndexerId,
        enabled: bool,
    ) -> Result<()>;
    async fn disconnect_indexer(&self, filter_id: FilterId, indexer_id: IndexerId) -> Result<()>;
}

#[async_trait::async_trait]
pub trait IndexerRepository: Repository<Indexer, IndexerId> {
    async fn get_by_identifier(&self, identifier: &str) -> Result<Option<Indexer>>;
}

/// Release history store
#[async_trait::async_trait]
pub trait ReleaseRepository: Send + Sync {
    /// Inserts the release, or updates its filter fields if the id exists.
    async fn store(&self, release: &Release) -> Result<ReleaseId>;
    async fn store_action_status(&self, status: &ReleaseActionStatus) -> Result<()>;
    /// Stores the release and its action status atomically: either both
    /// rows are written or neither is.
    async fn store_approved(
        &self,
        release: &Release,
        status: &ReleaseActionStatus,
    ) -> Result<ReleaseId>;
    /// Releases stored under the filter whose latest action status is
    /// `PUSH_APPROVED`, newest first.
    async fn find_history_by_filter_id(&self, filter_id: FilterId) -> Result<Vec<Release>>;
    async fn get_by_id(&self, id: ReleaseId) -> Result<Option<Release>>;
    async fn list_recent(&self, limit: i64) -> Result<Vec<Release>>;
    async fn list_action_statuses(&self, release_id: ReleaseId)
        -> Result<Vec<ReleaseActionStatus>>;
    /// Removes releases (and their statuses) older than `hours`, returning
    /// the number of releases deleted.
    async fn delete_older_than(&self, hours: u32) -> Result<u64>;
}
