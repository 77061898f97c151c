// SPDX-License-Identifier: GPL-3.0-or-later

//! Indexers: the announce sources releases are tagged with.

use std::sync::Arc;

use chrono::Utc;
use sievarr_domain::{Indexer, IndexerId, Validate, ValidationError};
use sievarr_infrastructure::repositories::{IndexerRepository, RepositoryError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("invalid indexer")]
    Validation(Vec<ValidationError>),
    #[error("indexer not found: {0}")]
    NotFound(IndexerId),
    #[error("indexer identifier already in use: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(anyhow::Error),
}

impl IndexerError {
    fn from_repository(err: anyhow::Error, id: IndexerId) -> Self {
        match err.downcast_ref::<RepositoryError>() {
            Some(RepositoryError::NotFound { .. }) => Self::NotFound(id),
            Some(RepositoryError::Conflict(message)) => Self::Conflict(message.clone()),
            None => Self::Storage(err),
        }
    }
}

pub type IndexerResult<T> = Result<T, IndexerError>;

pub struct IndexerService {
    indexers: Arc<dyn IndexerRepository>,
}

impl IndexerService {
    pub fn new(indexers: Arc<dyn IndexerRepository>) -> Self {
        Self { indexers }
    }

    pub async fn list(&self, limit: i64, offset: i64) -> IndexerResult<Vec<Indexer>> {
        self.indexers
            .list(limit, offset)
            .await
            .map_err(IndexerError::Storage)
    }

    pub async fn get(&self, id: IndexerId) -> IndexerResult<Indexer> {
        self.indexers
            .get_by_id(id)
            .await
            .map_err(IndexerError::Storage)?
            .ok_or(IndexerError::NotFound(id))
    }

    pub async fn create(&self, mut indexer: Indexer) -> IndexerResult<Indexer> {
        indexer.validate().map_err(IndexerError::Validation)?;
        self.ensure_identifier_free(&indexer.identifier, None).await?;
        let now = Utc::now();
        indexer.id = IndexerId::new();
        indexer.created_at = now;
        indexer.updated_at = now;

        let created = self
            .indexers
            .create(indexer)
            .await
            .map_err(IndexerError::Storage)?;
        info!(
            target: "application",
            indexer_id = %created.id,
            identifier = %created.identifier,
            "indexer created"
        );
        Ok(created)
    }

    pub async fn update(&self, id: IndexerId, mut indexer: Indexer) -> IndexerResult<Indexer> {
        indexer.validate().map_err(IndexerError::Validation)?;
        let existing = self.get(id).await?;
        self.ensure_identifier_free(&indexer.identifier, Some(id))
            .await?;
        indexer.id = id;
        indexer.created_at = existing.created_at;
        indexer.updated_at = Utc::now();

        let updated = self
            .indexers
            .update(indexer)
            .await
            .map_err(|err| IndexerError::from_repository(err, id))?;
        info!(target: "application", indexer_id = %id, "indexer updated");
        Ok(updated)
    }

    /// Delete an indexer and every filter binding to it.
    pub async fn delete(&self, id: IndexerId) -> IndexerResult<()> {
        self.indexers
            .delete(id)
            .await
            .map_err(|err| IndexerError::from_repository(err, id))?;
        info!(target: "application", indexer_id = %id, "indexer deleted");
        Ok(())
    }

    async fn ensure_identifier_free(
        &self,
        identifier: &str,
        owner: Option<IndexerId>,
    ) -> IndexerResult<()> {
        let holder = self
            .indexers
            .get_by_identifier(identifier)
            .await
            .map_err(IndexerError::Storage)?;
        match holder {
            Some(other) if Some(other.id) != owner => {
                warn!(target: "application", %identifier, "indexer identifier taken");
                Err(IndexerError::Conflict(identifier.to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StoreFixture;

    fn service(fx: &StoreFixture) -> IndexerService {
        IndexerService::new(Arc::new(fx.store.clone()))
    }

    #[tokio::test]
    async fn identifiers_are_unique() {
        let fx = StoreFixture::new("tracker");
        let svc = service(&fx);

        let err = svc
            .create(Indexer::new("tracker", "Another Tracker"))
            .await
            .expect_err("taken");
        assert!(matches!(err, IndexerError::Conflict(ref id) if id == "tracker"));

        let created = svc
            .create(Indexer::new("usenet", "Usenet"))
            .await
            .expect("create");
        let err = svc
            .update(created.id, Indexer::new("tracker", "Usenet"))
            .await
            .expect_err("taken on update");
        assert!(matches!(err, IndexerError::Conflict(_)));

        let renamed = svc
            .update(created.id, Indexer::new("usenet", "Usenet Renamed"))
            .await
            .expect("keep own identifier");
        assert_eq!(renamed.created_at, created.created_at);
        assert_eq!(svc.list(50, 0).await.expect("list").len(), 2);
    }

    #[tokio::test]
    async fn blank_identifier_is_invalid() {
        let fx = StoreFixture::new("tracker");
        match service(&fx).create(Indexer::new(" ", "Blank")).await {
            Err(IndexerError::Validation(errors)) => {
                assert_eq!(errors[0].field, "identifier");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn deleting_indexer_unbinds_filters() {
        let mut fx = StoreFixture::new("tracker");
        fx.add_filter(sievarr_domain::Filter::new("movies"), None);
        let svc = service(&fx);

        svc.delete(fx.indexer.id).await.expect("delete");
        assert!(matches!(
            svc.delete(fx.indexer.id).await,
            Err(IndexerError::NotFound(_))
        ));

        let mut release = sievarr_domain::Release::new("Movie.2020.1080p.WEB.x264-GRP");
        release.indexer = "tracker".to_string();
        let result = fx.store.matcher().evaluate(&release).await.expect("evaluate");
        assert_eq!(result.rejections, vec![crate::matching::NO_ACTIVE_FILTERS.to_string()]);
    }
}
