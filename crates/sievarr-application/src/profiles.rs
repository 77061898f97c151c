// SPDX-License-Identifier: GPL-3.0-or-later

//! Duplicate profile management with validation and in-use checks.

use std::sync::Arc;

use chrono::Utc;
use sievarr_domain::{DuplicateProfileId, DuplicateReleaseProfile, Validate, ValidationError};
use sievarr_infrastructure::repositories::{
    DuplicateProfileRepository, FilterRepository, RepositoryError,
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("invalid duplicate profile")]
    Validation(Vec<ValidationError>),
    #[error("duplicate profile not found: {0}")]
    NotFound(DuplicateProfileId),
    #[error("duplicate profile is used by filters: {}", filters.join(", "))]
    InUse { filters: Vec<String> },
    #[error("{0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(anyhow::Error),
}

impl ProfileError {
    fn from_repository(err: anyhow::Error, id: DuplicateProfileId) -> Self {
        match err.downcast_ref::<RepositoryError>() {
            Some(RepositoryError::NotFound { .. }) => Self::NotFound(id),
            Some(RepositoryError::Conflict(message)) => Self::Conflict(message.clone()),
            None => Self::Storage(err),
        }
    }
}

pub type ProfileResult<T> = Result<T, ProfileError>;

pub struct DuplicateProfileService {
    profiles: Arc<dyn DuplicateProfileRepository>,
    filters: Arc<dyn FilterRepository>,
}

impl DuplicateProfileService {
    pub fn new(
        profiles: Arc<dyn DuplicateProfileRepository>,
        filters: Arc<dyn FilterRepository>,
    ) -> Self {
        Self { profiles, filters }
    }

    pub async fn list(&self, limit: i64, offset: i64) -> ProfileResult<Vec<DuplicateReleaseProfile>> {
        self.profiles
            .list(limit, offset)
            .await
            .map_err(ProfileError::Storage)
    }

    pub async fn get(&self, id: DuplicateProfileId) -> ProfileResult<DuplicateReleaseProfile> {
        self.profiles
            .get_by_id(id)
            .await
            .map_err(ProfileError::Storage)?
            .ok_or(ProfileError::NotFound(id))
    }

    /// Store a new profile under a fresh id.
    pub async fn create(
        &self,
        mut profile: DuplicateReleaseProfile,
    ) -> ProfileResult<DuplicateReleaseProfile> {
        profile.validate().map_err(ProfileError::Validation)?;
        let now = Utc::now();
        profile.id = DuplicateProfileId::new();
        profile.created_at = now;
        profile.updated_at = now;

        let created = self
            .profiles
            .create(profile)
            .await
            .map_err(ProfileError::Storage)?;
        info!(
            target: "application",
            profile_id = %created.id,
            name = %created.name,
            fields = created.enabled_fields().len(),
            "duplicate profile created"
        );
        Ok(created)
    }

    /// Replace the stored profile `id`. Last write wins.
    pub async fn update(
        &self,
        id: DuplicateProfileId,
        mut profile: DuplicateReleaseProfile,
    ) -> ProfileResult<DuplicateReleaseProfile> {
        profile.validate().map_err(ProfileError::Validation)?;
        let existing = self.get(id).await?;
        profile.id = id;
        profile.created_at = existing.created_at;
        profile.updated_at = Utc::now();

        let updated = self
            .profiles
            .update(profile)
            .await
            .map_err(|err| ProfileError::from_repository(err, id))?;
        info!(target: "application", profile_id = %id, "duplicate profile updated");
        Ok(updated)
    }

    /// Delete a profile no filter refers to.
    pub async fn delete(&self, id: DuplicateProfileId) -> ProfileResult<()> {
        let users = self
            .filters
            .find_by_duplicate_profile(id)
            .await
            .map_err(ProfileError::Storage)?;
        if !users.is_empty() {
            let filters: Vec<String> = users.into_iter().map(|f| f.name).collect();
            warn!(
                target: "application",
                profile_id = %id,
                filters = ?filters,
                "refusing to delete duplicate profile in use"
            );
            return Err(ProfileError::InUse { filters });
        }

        self.profiles
            .delete(id)
            .await
            .map_err(|err| ProfileError::from_repository(err, id))?;
        info!(target: "application", profile_id = %id, "duplicate profile deleted");
        Ok(())
    }
}
