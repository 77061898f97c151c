// SPDX-License-Identifier: GPL-3.0-or-later
//! In-memory repositories for service tests.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use sievarr_domain::{
    DuplicateProfileId, DuplicateReleaseProfile, Filter, FilterId, Indexer, IndexerId, Release,
    ReleaseActionStatus, ReleaseId, ReleasePushStatus,
};
use sievarr_infrastructure::repositories::{
    DuplicateProfileRepository, FilterRepository, IndexerRepository, ReleaseRepository,
    Repository, RepositoryError,
};

use crate::matching::ReleaseMatcher;

#[derive(Default)]
struct Inner {
    profiles: Vec<DuplicateReleaseProfile>,
    filters: Vec<Filter>,
    indexers: Vec<Indexer>,
    /// (filter, indexer, enabled)
    bindings: Vec<(FilterId, IndexerId, bool)>,
    releases: Vec<Release>,
    statuses: Vec<ReleaseActionStatus>,
    fail_reads: bool,
    fail_writes: bool,
}

impl Inner {
    fn bind(&mut self, filter_id: FilterId, indexer_id: IndexerId, enabled: bool) {
        match self
            .bindings
            .iter_mut()
            .find(|(f, i, _)| *f == filter_id && *i == indexer_id)
        {
            Some(binding) => binding.2 = enabled,
            None => self.bindings.push((filter_id, indexer_id, enabled)),
        }
    }

    /// Mirror `filter.indexers`, keeping the enabled flag of bindings that stay.
    fn rebind(&mut self, filter: &Filter) {
        self.bindings
            .retain(|(f, i, _)| *f != filter.id || filter.indexers.contains(i));
        for indexer_id in &filter.indexers {
            if !self
                .bindings
                .iter()
                .any(|(f, i, _)| *f == filter.id && i == indexer_id)
            {
                self.bindings.push((filter.id, *indexer_id, true));
            }
        }
    }

    fn upsert_release(&mut self, release: &Release) {
        match self.releases.iter_mut().find(|r| r.id == release.id) {
            Some(existing) => {
                existing.filter_id = release.filter_id;
                existing.filter_status = release.filter_status;
            }
            None => self.releases.push(release.clone()),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matcher(&self) -> ReleaseMatcher {
        ReleaseMatcher::new(
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
        )
    }

    pub fn fail_reads(&self, fail: bool) {
        self.inner.lock().expect("lock").fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().expect("lock").fail_writes = fail;
    }

    pub fn releases(&self) -> Vec<Release> {
        self.inner.lock().expect("lock").releases.clone()
    }

    pub fn statuses(&self) -> Vec<ReleaseActionStatus> {
        self.inner.lock().expect("lock").statuses.clone()
    }

    pub fn find_by_duplicate_profile_name(&self, name: &str) -> Option<DuplicateProfileId> {
        let inner = self.inner.lock().expect("lock");
        inner.profiles.iter().find(|p| p.name == name).map(|p| p.id)
    }

    fn check_read(&self) -> Result<()> {
        if self.inner.lock().expect("lock").fail_reads {
            return Err(anyhow!("storage unavailable"));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.inner.lock().expect("lock").fail_writes {
            return Err(anyhow!("storage unavailable"));
        }
        Ok(())
    }
}

/// A store plus one indexer that every added filter is bound to.
pub struct StoreFixture {
    pub store: InMemoryStore,
    pub indexer: Indexer,
}

impl StoreFixture {
    pub fn new(identifier: &str) -> Self {
        let store = InMemoryStore::new();
        let indexer = Indexer::new(identifier, identifier);
        store.inner.lock().expect("lock").indexers.push(indexer.clone());
        Self { store, indexer }
    }

    pub fn add_filter(
        &mut self,
        mut filter: Filter,
        profile: Option<DuplicateReleaseProfile>,
    ) -> FilterId {
        let mut inner = self.store.inner.lock().expect("lock");
        if let Some(mut profile) = profile {
            profile.id = DuplicateProfileId::new();
            filter.duplicate_profile_id = Some(profile.id);
            inner.profiles.push(profile);
        }
        let id = filter.id;
        filter.indexers = vec![self.indexer.id];
        inner.rebind(&filter);
        inner.filters.push(filter);
        id
    }

    pub fn add_history(&mut self, filter_id: FilterId, mut release: Release) {
        let mut inner = self.store.inner.lock().expect("lock");
        release.filter_id = Some(filter_id);
        inner
            .statuses
            .push(ReleaseActionStatus::approved(release.id, filter_id, "history"));
        inner.releases.push(release);
    }
}

#[async_trait::async_trait]
impl Repository<DuplicateReleaseProfile, DuplicateProfileId> for InMemoryStore {
    async fn create(&self, entity: DuplicateReleaseProfile) -> Result<DuplicateReleaseProfile> {
        self.check_write()?;
        self.inner.lock().expect("lock").profiles.push(entity.clone());
        Ok(entity)
    }

    async fn get_by_id(&self, id: DuplicateProfileId) -> Result<Option<DuplicateReleaseProfile>> {
        self.check_read()?;
        let inner = self.inner.lock().expect("lock");
        Ok(inner.profiles.iter().find(|p| p.id == id).cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<DuplicateReleaseProfile>> {
        self.check_read()?;
        let inner = self.inner.lock().expect("lock");
        let mut profiles = inner.profiles.clone();
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update(&self, entity: DuplicateReleaseProfile) -> Result<DuplicateReleaseProfile> {
        self.check_write()?;
        let mut inner = self.inner.lock().expect("lock");
        let slot = inner
            .profiles
            .iter_mut()
            .find(|p| p.id == entity.id)
            .ok_or_else(|| RepositoryError::not_found("duplicate profile", entity.id))?;
        *slot = entity.clone();
        Ok(entity)
    }

    async fn delete(&self, id: DuplicateProfileId) -> Result<()> {
        self.check_write()?;
        let mut inner = self.inner.lock().expect("lock");
        let before = inner.profiles.len();
        inner.profiles.retain(|p| p.id != id);
        if inner.profiles.len() == before {
            return Err(RepositoryError::not_found("duplicate profile", id).into());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DuplicateProfileRepository for InMemoryStore {
    async fn find_by_filter_id(&self, filter_id: FilterId) -> Result<DuplicateReleaseProfile> {
        self.check_read()?;
        let inner = self.inner.lock().expect("lock");
        let profile = inner
            .filters
            .iter()
            .find(|f| f.id == filter_id)
            .and_then(|f| f.duplicate_profile_id)
            .and_then(|pid| inner.profiles.iter().find(|p| p.id == pid).cloned());
        Ok(profile.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl Repository<Filter, FilterId> for InMemoryStore {
    async fn create(&self, entity: Filter) -> Result<Filter> {
        self.check_write()?;
        let mut inner = self.inner.lock().expect("lock");
        inner.rebind(&entity);
        inner.filters.push(entity.clone());
        Ok(entity)
    }

    async fn get_by_id(&self, id: FilterId) -> Result<Option<Filter>> {
        self.check_read()?;
        let inner = self.inner.lock().expect("lock");
        Ok(inner.filters.iter().find(|f| f.id == id).map(|f| {
            let mut filter = f.clone();
            filter.indexers = inner
                .bindings
                .iter()
                .filter(|(fid, _, _)| *fid == id)
                .map(|(_, i, _)| *i)
                .collect();
            filter
        }))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Filter>> {
        self.check_read()?;
        let inner = self.inner.lock().expect("lock");
        Ok(inner
            .filters
            .iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn update(&self, entity: Filter) -> Result<Filter> {
        self.check_write()?;
        let mut inner = self.inner.lock().expect("lock");
        let slot = inner
            .filters
            .iter_mut()
            .find(|f| f.id == entity.id)
            .ok_or_else(|| RepositoryError::not_found("filter", entity.id))?;
        *slot = entity.clone();
        inner.rebind(&entity);
        Ok(entity)
    }

    async fn delete(&self, id: FilterId) -> Result<()> {
        self.check_write()?;
        let mut inner = self.inner.lock().expect("lock");
        let before = inner.filters.len();
        inner.filters.retain(|f| f.id != id);
        if inner.filters.len() == before {
            return Err(RepositoryError::not_found("filter", id).into());
        }
        inner.bindings.retain(|(f, _, _)| *f != id);
        inner.releases.retain(|r| r.filter_id != Some(id));
        Ok(())
    }
}

#[async_trait::async_trait]
impl FilterRepository for InMemoryStore {
    async fn find_by_indexer_identifier(&self, identifier: &str) -> Result<Vec<Filter>> {
        self.check_read()?;
        let inner = self.inner.lock().expect("lock");
        let mut filters: Vec<Filter> = inner
            .filters
            .iter()
            .filter(|f| f.enabled)
            .filter(|f| {
                inner.bindings.iter().any(|(fid, iid, enabled)| {
                    *fid == f.id
                        && *enabled
                        && inner
                            .indexers
                            .iter()
                            .any(|i| i.id == *iid && i.enabled && i.identifier == identifier)
                })
            })
            .cloned()
            .collect();
        filters.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(filters)
    }

    async fn find_by_duplicate_profile(
        &self,
        profile_id: DuplicateProfileId,
    ) -> Result<Vec<Filter>> {
        self.check_read()?;
        let inner = self.inner.lock().expect("lock");
        Ok(inner
            .filters
            .iter()
            .filter(|f| f.duplicate_profile_id == Some(profile_id))
            .cloned()
            .collect())
    }

    async fn connect_indexer(
        &self,
        filter_id: FilterId,
        indexer_id: IndexerId,
        enabled: bool,
    ) -> Result<()> {
        self.check_write()?;
        self.inner
            .lock()
            .expect("lock")
            .bind(filter_id, indexer_id, enabled);
        Ok(())
    }

    async fn disconnect_indexer(&self, filter_id: FilterId, indexer_id: IndexerId) -> Result<()> {
        self.check_write()?;
        let mut inner = self.inner.lock().expect("lock");
        inner
            .bindings
            .retain(|(f, i, _)| *f != filter_id || *i != indexer_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Repository<Indexer, IndexerId> for InMemoryStore {
    async fn create(&self, entity: Indexer) -> Result<Indexer> {
        self.check_write()?;
        let mut inner = self.inner.lock().expect("lock");
        if inner.indexers.iter().any(|i| i.identifier == entity.identifier) {
            return Err(anyhow!("UNIQUE constraint failed: indexers.identifier"));
        }
        inner.indexers.push(entity.clone());
        Ok(entity)
    }

    async fn get_by_id(&self, id: IndexerId) -> Result<Option<Indexer>> {
        self.check_read()?;
        let inner = self.inner.lock().expect("lock");
        Ok(inner.indexers.iter().find(|i| i.id == id).cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Indexer>> {
        self.check_read()?;
        let inner = self.inner.lock().expect("lock");
        let mut indexers = inner.indexers.clone();
        indexers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(indexers
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update(&self, entity: Indexer) -> Result<Indexer> {
        self.check_write()?;
        let mut inner = self.inner.lock().expect("lock");
        let slot = inner
            .indexers
            .iter_mut()
            .find(|i| i.id == entity.id)
            .ok_or_else(|| RepositoryError::not_found("indexer", entity.id))?;
        *slot = entity.clone();
        Ok(entity)
    }

    async fn delete(&self, id: IndexerId) -> Result<()> {
        self.check_write()?;
        let mut inner = self.inner.lock().expect("lock");
        let before = inner.indexers.len();
        inner.indexers.retain(|i| i.id != id);
        if inner.indexers.len() == before {
            return Err(RepositoryError::not_found("indexer", id).into());
        }
        inner.bindings.retain(|(_, i, _)| *i != id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl IndexerRepository for InMemoryStore {
    async fn get_by_identifier(&self, identifier: &str) -> Result<Option<Indexer>> {
        self.check_read()?;
        let inner = self.inner.lock().expect("lock");
        Ok(inner.indexers.iter().find(|i| i.identifier == identifier).cloned())
    }
}

#[async_trait::async_trait]
impl ReleaseRepository for InMemoryStore {
    async fn store(&self, release: &Release) -> Result<ReleaseId> {
        self.check_write()?;
        self.inner.lock().expect("lock").upsert_release(release);
        Ok(release.id)
    }

    async fn store_approved(
        &self,
        release: &Release,
        status: &ReleaseActionStatus,
    ) -> Result<ReleaseId> {
        self.check_write()?;
        let mut inner = self.inner.lock().expect("lock");
        inner.upsert_release(release);
        inner.statuses.push(status.clone());
        Ok(release.id)
    }

    async fn store_action_status(&self, status: &ReleaseActionStatus) -> Result<()> {
        self.check_write()?;
        self.inner.lock().expect("lock").statuses.push(status.clone());
        Ok(())
    }

    async fn find_history_by_filter_id(&self, filter_id: FilterId) -> Result<Vec<Release>> {
        self.check_read()?;
        let inner = self.inner.lock().expect("lock");
        Ok(inner
            .releases
            .iter()
            .rev()
            .filter(|r| r.filter_id == Some(filter_id))
            .filter(|r| {
                inner
                    .statuses
                    .iter()
                    .rev()
                    .find(|s| s.release_id == r.id)
                    .is_some_and(|s| s.status == ReleasePushStatus::Approved)
            })
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: ReleaseId) -> Result<Option<Release>> {
        self.check_read()?;
        let inner = self.inner.lock().expect("lock");
        Ok(inner.releases.iter().find(|r| r.id == id).cloned())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Release>> {
        self.check_read()?;
        let inner = self.inner.lock().expect("lock");
        Ok(inner
            .releases
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_action_statuses(&self, release_id: ReleaseId) -> Result<Vec<ReleaseActionStatus>> {
        self.check_read()?;
        let inner = self.inner.lock().expect("lock");
        Ok(inner
            .statuses
            .iter()
            .filter(|s| s.release_id == release_id)
            .cloned()
            .collect())
    }

    async fn delete_older_than(&self, hours: u32) -> Result<u64> {
        self.check_write()?;
        let cutoff = Utc::now() - Duration::hours(i64::from(hours));
        let mut inner = self.inner.lock().expect("lock");
        let before = inner.releases.len();
        inner.releases.retain(|r| r.timestamp >= cutoff);
        let removed = (before - inner.releases.len()) as u64;
        let kept: Vec<ReleaseId> = inner.releases.iter().map(|r| r.id).collect();
        inner.statuses.retain(|s| kept.contains(&s.release_id));
        Ok(removed)
    }
}
