// SPDX-License-Identifier: GPL-3.0-or-later

//! Filter management: criteria, duplicate profile attachment and indexer
//! bindings.

use std::sync::Arc;

use chrono::Utc;
use sievarr_domain::{
    DuplicateProfileId, Filter, FilterId, IndexerId, Validate, ValidationError,
};
use sievarr_infrastructure::repositories::{
    DuplicateProfileRepository, FilterRepository, IndexerRepository, RepositoryError,
};
use thiserror::Error;
use tracing::info;

use crate::filter_criteria::parse_size;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid filter")]
    Validation(Vec<ValidationError>),
    #[error("filter not found: {0}")]
    NotFound(FilterId),
    #[error("indexer not found: {0}")]
    IndexerNotFound(IndexerId),
    #[error("storage error: {0}")]
    Storage(anyhow::Error),
}

impl FilterError {
    fn from_repository(err: anyhow::Error, id: FilterId) -> Self {
        match err.downcast_ref::<RepositoryError>() {
            Some(RepositoryError::NotFound { .. }) => Self::NotFound(id),
            _ => Self::Storage(err),
        }
    }
}

pub type FilterResult<T> = Result<T, FilterError>;

pub struct FilterService {
    filters: Arc<dyn FilterRepository>,
    profiles: Arc<dyn DuplicateProfileRepository>,
    indexers: Arc<dyn IndexerRepository>,
}

impl FilterService {
    pub fn new(
        filters: Arc<dyn FilterRepository>,
        profiles: Arc<dyn DuplicateProfileRepository>,
        indexers: Arc<dyn IndexerRepository>,
    ) -> Self {
        Self {
            filters,
            profiles,
            indexers,
        }
    }

    pub async fn list(&self, limit: i64, offset: i64) -> FilterResult<Vec<Filter>> {
        self.filters
            .list(limit, offset)
            .await
            .map_err(FilterError::Storage)
    }

    pub async fn get(&self, id: FilterId) -> FilterResult<Filter> {
        self.filters
            .get_by_id(id)
            .await
            .map_err(FilterError::Storage)?
            .ok_or(FilterError::NotFound(id))
    }

    pub async fn create(&self, mut filter: Filter) -> FilterResult<Filter> {
        self.check(&filter).await?;
        let now = Utc::now();
        filter.id = FilterId::new();
        filter.created_at = now;
        filter.updated_at = now;

        let created = self
            .filters
            .create(filter)
            .await
            .map_err(FilterError::Storage)?;
        info!(
            target: "application",
            filter_id = %created.id,
            name = %created.name,
            priority = created.priority,
            indexers = created.indexers.len(),
            "filter created"
        );
        Ok(created)
    }

    /// Replace the stored filter `id`, including its indexer list.
    pub async fn update(&self, id: FilterId, mut filter: Filter) -> FilterResult<Filter> {
        self.check(&filter).await?;
        let existing = self.get(id).await?;
        filter.id = id;
        filter.created_at = existing.created_at;
        filter.updated_at = Utc::now();

        let updated = self
            .filters
            .update(filter)
            .await
            .map_err(|err| FilterError::from_repository(err, id))?;
        info!(target: "application", filter_id = %id, "filter updated");
        Ok(updated)
    }

    /// Delete a filter together with its bindings and release history.
    pub async fn delete(&self, id: FilterId) -> FilterResult<()> {
        self.filters
            .delete(id)
            .await
            .map_err(|err| FilterError::from_repository(err, id))?;
        info!(target: "application", filter_id = %id, "filter deleted");
        Ok(())
    }

    pub async fn connect_indexer(
        &self,
        filter_id: FilterId,
        indexer_id: IndexerId,
        enabled: bool,
    ) -> FilterResult<()> {
        self.get(filter_id).await?;
        self.require_indexer(indexer_id).await?;
        self.filters
            .connect_indexer(filter_id, indexer_id, enabled)
            .await
            .map_err(FilterError::Storage)?;
        info!(target: "application", %filter_id, %indexer_id, enabled, "indexer bound to filter");
        Ok(())
    }

    pub async fn disconnect_indexer(
        &self,
        filter_id: FilterId,
        indexer_id: IndexerId,
    ) -> FilterResult<()> {
        self.get(filter_id).await?;
        self.filters
            .disconnect_indexer(filter_id, indexer_id)
            .await
            .map_err(FilterError::Storage)?;
        info!(target: "application", %filter_id, %indexer_id, "indexer unbound from filter");
        Ok(())
    }

    async fn require_indexer(&self, id: IndexerId) -> FilterResult<()> {
        match self.indexers.get_by_id(id).await.map_err(FilterError::Storage)? {
            Some(_) => Ok(()),
            None => Err(FilterError::IndexerNotFound(id)),
        }
    }

    /// Field validation plus the references a filter makes.
    async fn check(&self, filter: &Filter) -> FilterResult<()> {
        let mut errors = filter.validate().err().unwrap_or_default();

        for (field, value) in [("min_size", &filter.min_size), ("max_size", &filter.max_size)] {
            if !value.trim().is_empty() && parse_size(value).is_err() {
                errors.push(ValidationError {
                    field,
                    message: format!("unrecognized size: {value}"),
                });
            }
        }

        if let Some(profile_id) = filter.duplicate_profile_id {
            if !self.profile_exists(profile_id).await? {
                errors.push(ValidationError {
                    field: "duplicate_profile_id",
                    message: format!("duplicate profile not found: {profile_id}"),
                });
            }
        }

        for indexer_id in &filter.indexers {
            let found = self
                .indexers
                .get_by_id(*indexer_id)
                .await
                .map_err(FilterError::Storage)?;
            if found.is_none() {
                errors.push(ValidationError {
                    field: "indexers",
                    message: format!("indexer not found: {indexer_id}"),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FilterError::Validation(errors))
        }
    }

    async fn profile_exists(&self, id: DuplicateProfileId) -> FilterResult<bool> {
        Ok(self
            .profiles
            .get_by_id(id)
            .await
            .map_err(FilterError::Storage)?
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StoreFixture;
    use sievarr_domain::{DuplicateField, DuplicateReleaseProfile, Release};
    use sievarr_infrastructure::repositories::Repository;

    fn service(fx: &StoreFixture) -> FilterService {
        FilterService::new(
            Arc::new(fx.store.clone()),
            Arc::new(fx.store.clone()),
            Arc::new(fx.store.clone()),
        )
    }

    #[tokio::test]
    async fn created_filter_with_profile_and_indexer_takes_releases() {
        let fx = StoreFixture::new("tracker");
        let profile = Repository::<DuplicateReleaseProfile, DuplicateProfileId>::create(
            &fx.store,
            DuplicateReleaseProfile::new("title").with(DuplicateField::Title),
        )
        .await
        .expect("create profile");

        let mut draft = Filter::new("movies");
        draft.duplicate_profile_id = Some(profile.id);
        draft.indexers = vec![fx.indexer.id];
        let created = service(&fx).create(draft).await.expect("create");

        let mut release = Release::new("Inkheart.2008.1080p.BluRay.x264-GROUP");
        release.indexer = "tracker".to_string();
        let result = fx.store.matcher().evaluate(&release).await.expect("evaluate");
        assert!(result.accepted);
        assert_eq!(result.filter_id, Some(created.id));
    }

    #[tokio::test]
    async fn unknown_references_and_bad_sizes_are_rejected() {
        let fx = StoreFixture::new("tracker");
        let mut draft = Filter::new("movies");
        draft.duplicate_profile_id = Some(DuplicateProfileId::new());
        draft.indexers = vec![IndexerId::new()];
        draft.min_size = "lots".to_string();

        match service(&fx).create(draft).await {
            Err(FilterError::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
                assert_eq!(fields, vec!["min_size", "duplicate_profile_id", "indexers"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_attaches_profile_and_keeps_creation_time() {
        let fx = StoreFixture::new("tracker");
        let svc = service(&fx);
        let created = svc.create(Filter::new("movies")).await.expect("create");
        let profile = Repository::<DuplicateReleaseProfile, DuplicateProfileId>::create(
            &fx.store,
            DuplicateReleaseProfile::new("group").with(DuplicateField::Group),
        )
        .await
        .expect("create profile");

        let mut replacement = Filter::new("movies v2");
        replacement.duplicate_profile_id = Some(profile.id);
        let updated = svc.update(created.id, replacement).await.expect("update");

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(
            svc.get(created.id).await.expect("get").duplicate_profile_id,
            Some(profile.id)
        );
        assert!(matches!(
            svc.update(FilterId::new(), Filter::new("ghost")).await,
            Err(FilterError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn connect_requires_existing_filter_and_indexer() {
        let fx = StoreFixture::new("tracker");
        let svc = service(&fx);
        let tracker = fx.indexer.clone();
        let filter = svc.create(Filter::new("movies")).await.expect("create");

        assert!(matches!(
            svc.connect_indexer(filter.id, IndexerId::new(), true).await,
            Err(FilterError::IndexerNotFound(_))
        ));
        assert!(matches!(
            svc.connect_indexer(FilterId::new(), tracker.id, true).await,
            Err(FilterError::NotFound(_))
        ));

        svc.connect_indexer(filter.id, tracker.id, true)
            .await
            .expect("connect");
        let mut release = Release::new("Movie.2020.1080p.WEB.x264-GRP");
        release.indexer = "tracker".to_string();
        assert!(fx.store.matcher().evaluate(&release).await.expect("evaluate").accepted);

        svc.disconnect_indexer(filter.id, tracker.id)
            .await
            .expect("disconnect");
        assert!(!fx.store.matcher().evaluate(&release).await.expect("evaluate").accepted);
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let fx = StoreFixture::new("tracker");
        assert!(matches!(
            service(&fx).delete(FilterId::new()).await,
            Err(FilterError::NotFound(_))
        ));
    }
}
