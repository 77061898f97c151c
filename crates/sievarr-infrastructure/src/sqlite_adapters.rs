// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use sievarr_domain::{
    ActionStatusId, DuplicateProfileId, DuplicateReleaseProfile, Filter, FilterId, Indexer,
    IndexerId, Release, ReleaseActionStatus, ReleaseFilterStatus, ReleaseId,
    ReleaseImplementation, ReleaseProtocol, ReleasePushStatus,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::repositories::{
    DuplicateProfileRepository, FilterRepository, IndexerRepository, ReleaseRepository,
    Repository, RepositoryError,
};

// ============================================================================
// Duplicate profiles
// ============================================================================

/// SQLx-backed duplicate profile repository
pub struct SqliteDuplicateProfileRepository {
    pool: SqlitePool,
}

impl SqliteDuplicateProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Repository<DuplicateReleaseProfile, DuplicateProfileId> for SqliteDuplicateProfileRepository {
    async fn create(&self, entity: DuplicateReleaseProfile) -> Result<DuplicateReleaseProfile> {
        debug!(target: "repository", profile_id = %entity.id, name = %entity.name, "creating duplicate profile");
        let q = r#"
            INSERT INTO release_profile_duplicate (
                id, name, protocol, release_name, hash, title, sub_title, year, month, day,
                source, resolution, codec, container, dynamic_range, audio, release_group,
                season, episode, website, proper, repack, edition, language, hybrid,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;
        sqlx::query(q)
            .bind(entity.id.to_string())
            .bind(entity.name.clone())
            .bind(entity.protocol)
            .bind(entity.release_name)
            .bind(entity.hash)
            .bind(entity.title)
            .bind(entity.sub_title)
            .bind(entity.year)
            .bind(entity.month)
            .bind(entity.day)
            .bind(entity.source)
            .bind(entity.resolution)
            .bind(entity.codec)
            .bind(entity.container)
            .bind(entity.dynamic_range)
            .bind(entity.audio)
            .bind(entity.group)
            .bind(entity.season)
            .bind(entity.episode)
            .bind(entity.website)
            .bind(entity.proper)
            .bind(entity.repack)
            .bind(entity.edition)
            .bind(entity.language)
            .bind(entity.hybrid)
            .bind(fmt_dt(&entity.created_at))
            .bind(fmt_dt(&entity.updated_at))
            .execute(&self.pool)
            .await?;
        Ok(entity)
    }

    async fn get_by_id(&self, id: DuplicateProfileId) -> Result<Option<DuplicateReleaseProfile>> {
        debug!(target: "repository", %id, "fetching duplicate profile by id");
        let row = sqlx::query("SELECT * FROM release_profile_duplicate WHERE id = ? LIMIT 1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_profile(&r)).transpose()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<DuplicateReleaseProfile>> {
        debug!(target: "repository", limit, offset, "listing duplicate profiles");
        let rows = sqlx::query(
            "SELECT * FROM release_profile_duplicate ORDER BY name, id LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_profile).collect()
    }

    async fn update(&self, entity: DuplicateReleaseProfile) -> Result<DuplicateReleaseProfile> {
        debug!(target: "repository", profile_id = %entity.id, "updating duplicate profile");
        let q = r#"
            UPDATE release_profile_duplicate SET
                name = ?, protocol = ?, release_name = ?, hash = ?, title = ?, sub_title = ?,
                year = ?, month = ?, day = ?, source = ?, resolution = ?, codec = ?,
                container = ?, dynamic_range = ?, audio = ?, release_group = ?, season = ?,
                episode = ?, website = ?, proper = ?, repack = ?, edition = ?, language = ?,
                hybrid = ?, updated_at = ?
            WHERE id = ?
        "#;
        let result = sqlx::query(q)
            .bind(entity.name.clone())
            .bind(entity.protocol)
            .bind(entity.release_name)
            .bind(entity.hash)
            .bind(entity.title)
            .bind(entity.sub_title)
            .bind(entity.year)
            .bind(entity.month)
            .bind(entity.day)
            .bind(entity.source)
            .bind(entity.resolution)
            .bind(entity.codec)
            .bind(entity.container)
            .bind(entity.dynamic_range)
            .bind(entity.audio)
            .bind(entity.group)
            .bind(entity.season)
            .bind(entity.episode)
            .bind(entity.website)
            .bind(entity.proper)
            .bind(entity.repack)
            .bind(entity.edition)
            .bind(entity.language)
            .bind(entity.hybrid)
            .bind(fmt_dt(&entity.updated_at))
            .bind(entity.id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("duplicate profile", entity.id).into());
        }
        Ok(entity)
    }

    async fn delete(&self, id: DuplicateProfileId) -> Result<()> {
        debug!(target: "repository", %id, "deleting duplicate profile");
        let mut tx = self.pool.begin().await?;

        let referencing: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM filters WHERE release_profile_duplicate_id = ? ORDER BY name",
        )
        .bind(id.to_string())
        .fetch_all(&mut *tx)
        .await?;
        if !referencing.is_empty() {
            return Err(RepositoryError::Conflict(format!(
                "duplicate profile {} is used by filters: {}",
                id,
                referencing.join(", ")
            ))
            .into());
        }

        let result = sqlx::query("DELETE FROM release_profile_duplicate WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("duplicate profile", id).into());
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl DuplicateProfileRepository for SqliteDuplicateProfileRepository {
    async fn find_by_filter_id(&self, filter_id: FilterId) -> Result<DuplicateReleaseProfile> {
        debug!(target: "repository", %filter_id, "fetching duplicate profile by filter");
        let row = sqlx::query(
            r#"
            SELECT p.* FROM release_profile_duplicate p
            JOIN filters f ON f.release_profile_duplicate_id = p.id
            WHERE f.id = ?
            LIMIT 1
            "#,
        )
        .bind(filter_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(r) => row_to_profile(&r),
            None => Ok(DuplicateReleaseProfile::default()),
        }
    }
}

fn row_to_profile(row: &SqliteRow) -> Result<DuplicateReleaseProfile> {
    let id_str: String = row.try_get("id")?;
    let created_at_s: String = row.try_get("created_at")?;
    let updated_at_s: String = row.try_get("updated_at")?;
    Ok(DuplicateReleaseProfile {
        id: DuplicateProfileId::from_uuid(Uuid::parse_str(&id_str)?),
        name: row.try_get("name")?,
        protocol: row.try_get("protocol")?,
        release_name: row.try_get("release_name")?,
        hash: row.try_get("hash")?,
        title: row.try_get("title")?,
        sub_title: row.try_get("sub_title")?,
        year: row.try_get("year")?,
        month: row.try_get("month")?,
        day: row.try_get("day")?,
        source: row.try_get("source")?,
        resolution: row.try_get("resolution")?,
        codec: row.try_get("codec")?,
        container: row.try_get("container")?,
        dynamic_range: row.try_get("dynamic_range")?,
        audio: row.try_get("audio")?,
        group: row.try_get("release_group")?,
        season: row.try_get("season")?,
        episode: row.try_get("episode")?,
        website: row.try_get("website")?,
        proper: row.try_get("proper")?,
        repack: row.try_get("repack")?,
        edition: row.try_get("edition")?,
        language: row.try_get("language")?,
        hybrid: row.try_get("hybrid")?,
        created_at: parse_dt(created_at_s)?,
        updated_at: parse_dt(updated_at_s)?,
    })
}

// ============================================================================
// Filters
// ============================================================================

/// SQLx-backed Filter repository
pub struct SqliteFilterRepository {
    pool: SqlitePool,
}

impl SqliteFilterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_indexer_ids(&self, filter_id: &str) -> Result<Vec<IndexerId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT indexer_id FROM filter_indexer WHERE filter_id = ? ORDER BY indexer_id",
        )
        .bind(filter_id)
        .fetch_all(&self.pool)
        .await?;
        ids.iter()
            .map(|s| Ok(IndexerId::from_uuid(Uuid::parse_str(s)?)))
            .collect()
    }

    async fn rows_to_filters(&self, rows: Vec<SqliteRow>) -> Result<Vec<Filter>> {
        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let mut filter = row_to_filter(&r)?;
            filter.indexers = self.load_indexer_ids(&filter.id.to_string()).await?;
            out.push(filter);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl Repository<Filter, FilterId> for SqliteFilterRepository {
    async fn create(&self, entity: Filter) -> Result<Filter> {
        debug!(target: "repository", filter_id = %entity.id, name = %entity.name, "creating filter");
        let q = r#"
            INSERT INTO filters (
                id, name, enabled, priority, release_profile_duplicate_id, min_size, max_size,
                use_regex, match_releases, except_releases, match_release_groups,
                except_release_groups, shows, seasons, episodes, years, months, days,
                resolutions, codecs, sources, containers, match_hdr, except_hdr,
                match_language, except_language, match_categories, except_categories,
                match_uploaders, except_uploaders, tags, except_tags, freeleech,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                      ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;
        let mut tx = self.pool.begin().await?;
        sqlx::query(q)
            .bind(entity.id.to_string())
            .bind(entity.name.clone())
            .bind(entity.enabled)
            .bind(entity.priority)
            .bind(entity.duplicate_profile_id.map(|p| p.to_string()))
            .bind(entity.min_size.clone())
            .bind(entity.max_size.clone())
            .bind(entity.use_regex)
            .bind(entity.match_releases.clone())
            .bind(entity.except_releases.clone())
            .bind(entity.match_release_groups.clone())
            .bind(entity.except_release_groups.clone())
            .bind(entity.shows.clone())
            .bind(entity.seasons.clone())
            .bind(entity.episodes.clone())
            .bind(entity.years.clone())
            .bind(entity.months.clone())
            .bind(entity.days.clone())
            .bind(to_json(&entity.resolutions)?)
            .bind(to_json(&entity.codecs)?)
            .bind(to_json(&entity.sources)?)
            .bind(to_json(&entity.containers)?)
            .bind(to_json(&entity.match_hdr)?)
            .bind(to_json(&entity.except_hdr)?)
            .bind(to_json(&entity.match_language)?)
            .bind(to_json(&entity.except_language)?)
            .bind(entity.match_categories.clone())
            .bind(entity.except_categories.clone())
            .bind(entity.match_uploaders.clone())
            .bind(entity.except_uploaders.clone())
            .bind(entity.tags.clone())
            .bind(entity.except_tags.clone())
            .bind(entity.freeleech)
            .bind(fmt_dt(&entity.created_at))
            .bind(fmt_dt(&entity.updated_at))
            .execute(&mut *tx)
            .await?;

        for indexer_id in &entity.indexers {
            sqlx::query("INSERT INTO filter_indexer (filter_id, indexer_id, enabled) VALUES (?, ?, 1)")
                .bind(entity.id.to_string())
                .bind(indexer_id.to_string())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(entity)
    }

    async fn get_by_id(&self, id: FilterId) -> Result<Option<Filter>> {
        debug!(target: "repository", %id, "fetching filter by id");
        let row = sqlx::query("SELECT * FROM filters WHERE id = ? LIMIT 1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => {
                let mut filter = row_to_filter(&r)?;
                filter.indexers = self.load_indexer_ids(&filter.id.to_string()).await?;
                Ok(Some(filter))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Filter>> {
        debug!(target: "repository", limit, offset, "listing filters");
        let rows = sqlx::query(
            "SELECT * FROM filters ORDER BY priority DESC, name ASC, id ASC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        self.rows_to_filters(rows).await
    }

    async fn update(&self, entity: Filter) -> Result<Filter> {
        debug!(target: "repository", filter_id = %entity.id, "updating filter");
        let q = r#"
            UPDATE filters SET
                name = ?, enabled = ?, priority = ?, release_profile_duplicate_id = ?,
                min_size = ?, max_size = ?, use_regex = ?, match_releases = ?,
                except_releases = ?, match_release_groups = ?, except_release_groups = ?,
                shows = ?, seasons = ?, episodes = ?, years = ?, months = ?, days = ?,
                resolutions = ?, codecs = ?, sources = ?, containers = ?, match_hdr = ?,
                except_hdr = ?, match_language = ?, except_language = ?,
                match_categories = ?, except_categories = ?, match_uploaders = ?,
                except_uploaders = ?, tags = ?, except_tags = ?, freeleech = ?,
                updated_at = ?
            WHERE id = ?
        "#;
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(q)
            .bind(entity.name.clone())
            .bind(entity.enabled)
            .bind(entity.priority)
            .bind(entity.duplicate_profile_id.map(|p| p.to_string()))
            .bind(entity.min_size.clone())
            .bind(entity.max_size.clone())
            .bind(entity.use_regex)
            .bind(entity.match_releases.clone())
            .bind(entity.except_releases.clone())
            .bind(entity.match_release_groups.clone())
            .bind(entity.except_release_groups.clone())
            .bind(entity.shows.clone())
            .bind(entity.seasons.clone())
            .bind(entity.episodes.clone())
            .bind(entity.years.clone())
            .bind(entity.months.clone())
            .bind(entity.days.clone())
            .bind(to_json(&entity.resolutions)?)
            .bind(to_json(&entity.codecs)?)
            .bind(to_json(&entity.sources)?)
            .bind(to_json(&entity.containers)?)
            .bind(to_json(&entity.match_hdr)?)
            .bind(to_json(&entity.except_hdr)?)
            .bind(to_json(&entity.match_language)?)
            .bind(to_json(&entity.except_language)?)
            .bind(entity.match_categories.clone())
            .bind(entity.except_categories.clone())
            .bind(entity.match_uploaders.clone())
            .bind(entity.except_uploaders.clone())
            .bind(entity.tags.clone())
            .bind(entity.except_tags.clone())
            .bind(entity.freeleech)
            .bind(fmt_dt(&entity.updated_at))
            .bind(entity.id.to_string())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("filter", entity.id).into());
        }

        // Keep existing bindings (and their enabled flag), add new ones, drop removed ones.
        let existing: Vec<String> =
            sqlx::query_scalar("SELECT indexer_id FROM filter_indexer WHERE filter_id = ?")
                .bind(entity.id.to_string())
                .fetch_all(&mut *tx)
                .await?;
        let wanted: Vec<String> = entity.indexers.iter().map(|i| i.to_string()).collect();
        for stale in existing.iter().filter(|id| !wanted.contains(id)) {
            sqlx::query("DELETE FROM filter_indexer WHERE filter_id = ? AND indexer_id = ?")
                .bind(entity.id.to_string())
                .bind(stale)
                .execute(&mut *tx)
                .await?;
        }
        for added in wanted.iter().filter(|id| !existing.contains(id)) {
            sqlx::query("INSERT INTO filter_indexer (filter_id, indexer_id, enabled) VALUES (?, ?, 1)")
                .bind(entity.id.to_string())
                .bind(added)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(entity)
    }

    async fn delete(&self, id: FilterId) -> Result<()> {
        debug!(target: "repository", %id, "deleting filter");
        let result = sqlx::query("DELETE FROM filters WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("filter", id).into());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl FilterRepository for SqliteFilterRepository {
    async fn find_by_indexer_identifier(&self, identifier: &str) -> Result<Vec<Filter>> {
        debug!(target: "repository", identifier, "fetching filters by indexer");
        let rows = sqlx::query(
            r#"
            SELECT f.* FROM filters f
            JOIN filter_indexer fi ON fi.filter_id = f.id
            JOIN indexers i ON i.id = fi.indexer_id
            WHERE i.identifier = ?
              AND i.enabled = 1
              AND fi.enabled = 1
              AND f.enabled = 1
            ORDER BY f.priority DESC, f.name ASC, f.id ASC
            "#,
        )
        .bind(identifier)
        .fetch_all(&self.pool)
        .await?;
        self.rows_to_filters(rows).await
    }

    async fn find_by_duplicate_profile(
        &self,
        profile_id: DuplicateProfileId,
    ) -> Result<Vec<Filter>> {
        debug!(target: "repository", %profile_id, "fetching filters by duplicate profile");
        let rows = sqlx::query(
            "SELECT * FROM filters WHERE release_profile_duplicate_id = ? ORDER BY name, id",
        )
        .bind(profile_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        self.rows_to_filters(rows).await
    }

    async fn connect_indexer(
        &self,
        filter_id: FilterId,
        indexer_id: IndexerId,
        enabled: bool,
    ) -> Result<()> {
        debug!(target: "repository", %filter_id, %indexer_id, enabled, "connecting indexer to filter");
        sqlx::query(
            r#"
            INSERT INTO filter_indexer (filter_id, indexer_id, enabled) VALUES (?, ?, ?)
            ON CONFLICT(filter_id, indexer_id) DO UPDATE SET enabled = excluded.enabled
            "#,
        )
        .bind(filter_id.to_string())
        .bind(indexer_id.to_string())
        .bind(enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn disconnect_indexer(&self, filter_id: FilterId, indexer_id: IndexerId) -> Result<()> {
        debug!(target: "repository", %filter_id, %indexer_id, "disconnecting indexer from filter");
        sqlx::query("DELETE FROM filter_indexer WHERE filter_id = ? AND indexer_id = ?")
            .bind(filter_id.to_string())
            .bind(indexer_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_filter(row: &SqliteRow) -> Result<Filter> {
    let id_str: String = row.try_get("id")?;
    let profile_id: Option<String> = row.try_get("release_profile_duplicate_id")?;
    let created_at_s: String = row.try_get("created_at")?;
    let updated_at_s: String = row.try_get("updated_at")?;
    Ok(Filter {
        id: FilterId::from_uuid(Uuid::parse_str(&id_str)?),
        name: row.try_get("name")?,
        enabled: row.try_get("enabled")?,
        priority: row.try_get("priority")?,
        duplicate_profile_id: profile_id
            .map(|s| Uuid::parse_str(&s).map(DuplicateProfileId::from_uuid))
            .transpose()?,
        indexers: Vec::new(),
        min_size: row.try_get("min_size")?,
        max_size: row.try_get("max_size")?,
        use_regex: row.try_get("use_regex")?,
        match_releases: row.try_get("match_releases")?,
        except_releases: row.try_get("except_releases")?,
        match_release_groups: row.try_get("match_release_groups")?,
        except_release_groups: row.try_get("except_release_groups")?,
        shows: row.try_get("shows")?,
        seasons: row.try_get("seasons")?,
        episodes: row.try_get("episodes")?,
        years: row.try_get("years")?,
        months: row.try_get("months")?,
        days: row.try_get("days")?,
        resolutions: json_list(row, "resolutions")?,
        codecs: json_list(row, "codecs")?,
        sources: json_list(row, "sources")?,
        containers: json_list(row, "containers")?,
        match_hdr: json_list(row, "match_hdr")?,
        except_hdr: json_list(row, "except_hdr")?,
        match_language: json_list(row, "match_language")?,
        except_language: json_list(row, "except_language")?,
        match_categories: row.try_get("match_categories")?,
        except_categories: row.try_get("except_categories")?,
        match_uploaders: row.try_get("match_uploaders")?,
        except_uploaders: row.try_get("except_uploaders")?,
        tags: row.try_get("tags")?,
        except_tags: row.try_get("except_tags")?,
        freeleech: row.try_get("freeleech")?,
        created_at: parse_dt(created_at_s)?,
        updated_at: parse_dt(updated_at_s)?,
    })
}

// ============================================================================
// Indexers
// ============================================================================

/// SQLx-backed Indexer repository
pub struct SqliteIndexerRepository {
    pool: SqlitePool,
}

impl SqliteIndexerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Repository<Indexer, IndexerId> for SqliteIndexerRepository {
    async fn create(&self, entity: Indexer) -> Result<Indexer> {
        debug!(target: "repository", indexer_id = %entity.id, identifier = %entity.identifier, "creating indexer");
        sqlx::query(
            r#"
            INSERT INTO indexers (id, identifier, name, enabled, implementation, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entity.id.to_string())
        .bind(entity.identifier.clone())
        .bind(entity.name.clone())
        .bind(entity.enabled)
        .bind(entity.implementation.to_string())
        .bind(fmt_dt(&entity.created_at))
        .bind(fmt_dt(&entity.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(entity)
    }

    async fn get_by_id(&self, id: IndexerId) -> Result<Option<Indexer>> {
        debug!(target: "repository", %id, "fetching indexer by id");
        let row = sqlx::query("SELECT * FROM indexers WHERE id = ? LIMIT 1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_indexer(&r)).transpose()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Indexer>> {
        debug!(target: "repository", limit, offset, "listing indexers");
        let rows = sqlx::query("SELECT * FROM indexers ORDER BY name LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_indexer).collect()
    }

    async fn update(&self, entity: Indexer) -> Result<Indexer> {
        debug!(target: "repository", indexer_id = %entity.id, "updating indexer");
        let result = sqlx::query(
            r#"
            UPDATE indexers SET identifier = ?, name = ?, enabled = ?, implementation = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(entity.identifier.clone())
        .bind(entity.name.clone())
        .bind(entity.enabled)
        .bind(entity.implementation.to_string())
        .bind(fmt_dt(&entity.updated_at))
        .bind(entity.id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("indexer", entity.id).into());
        }
        Ok(entity)
    }

    async fn delete(&self, id: IndexerId) -> Result<()> {
        debug!(target: "repository", %id, "deleting indexer");
        let result = sqlx::query("DELETE FROM indexers WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("indexer", id).into());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl IndexerRepository for SqliteIndexerRepository {
    async fn get_by_identifier(&self, identifier: &str) -> Result<Option<Indexer>> {
        debug!(target: "repository", identifier, "fetching indexer by identifier");
        let row = sqlx::query("SELECT * FROM indexers WHERE identifier = ? LIMIT 1")
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_indexer(&r)).transpose()
    }
}

fn row_to_indexer(row: &SqliteRow) -> Result<Indexer> {
    let id_str: String = row.try_get("id")?;
    let implementation: String = row.try_get("implementation")?;
    let created_at_s: String = row.try_get("created_at")?;
    let updated_at_s: String = row.try_get("updated_at")?;
    Ok(Indexer {
        id: IndexerId::from_uuid(Uuid::parse_str(&id_str)?),
        identifier: row.try_get("identifier")?,
        name: row.try_get("name")?,
        enabled: row.try_get("enabled")?,
        implementation: parse_implementation(&implementation)?,
        created_at: parse_dt(created_at_s)?,
        updated_at: parse_dt(updated_at_s)?,
    })
}

// ============================================================================
// Releases
// ============================================================================

/// SQLx-backed release history
pub struct SqliteReleaseRepository {
    pool: SqlitePool,
}

impl SqliteReleaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Upsert on `id`, so a release left behind by an interrupted write can be
/// stored again.
async fn insert_release(conn: &mut SqliteConnection, release: &Release) -> Result<()> {
    let q = r#"
        INSERT INTO releases (
            id, filter_id, filter_status, indexer, implementation, protocol, release_name,
            info_hash, size, title, sub_title, year, month, day, season, episode,
            resolution, source, codec, container, hdr, audio, release_group, website,
            edition, language, proper, repack, hybrid, category, categories, freeleech,
            uploader, tags, other, timestamp
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                  ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            filter_id = excluded.filter_id,
            filter_status = excluded.filter_status
    "#;
    sqlx::query(q)
        .bind(release.id.to_string())
        .bind(release.filter_id.map(|f| f.to_string()))
        .bind(release.filter_status.to_string())
        .bind(release.indexer.clone())
        .bind(release.implementation.to_string())
        .bind(release.protocol.to_string())
        .bind(release.release_name.clone())
        .bind(release.info_hash.clone())
        .bind(i64::try_from(release.size)?)
        .bind(release.title.clone())
        .bind(release.sub_title.clone())
        .bind(i64::from(release.year))
        .bind(i64::from(release.month))
        .bind(i64::from(release.day))
        .bind(i64::from(release.season))
        .bind(i64::from(release.episode))
        .bind(release.resolution.clone())
        .bind(release.source.clone())
        .bind(to_json(&release.codec)?)
        .bind(release.container.clone())
        .bind(to_json(&release.hdr)?)
        .bind(to_json(&release.audio)?)
        .bind(release.group.clone())
        .bind(release.website.clone())
        .bind(release.edition.clone())
        .bind(to_json(&release.language)?)
        .bind(release.proper)
        .bind(release.repack)
        .bind(release.hybrid)
        .bind(release.category.clone())
        .bind(to_json(&release.categories)?)
        .bind(release.freeleech)
        .bind(release.uploader.clone())
        .bind(to_json(&release.tags)?)
        .bind(to_json(&release.other)?)
        .bind(fmt_dt(&release.timestamp))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn insert_action_status(
    conn: &mut SqliteConnection,
    status: &ReleaseActionStatus,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO release_action_status (
            id, release_id, filter_id, filter, action, status, rejections, timestamp
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(status.id.to_string())
    .bind(status.release_id.to_string())
    .bind(status.filter_id.to_string())
    .bind(status.filter.clone())
    .bind(status.action.clone())
    .bind(status.status.to_string())
    .bind(to_json(&status.rejections)?)
    .bind(fmt_dt(&status.timestamp))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait::async_trait]
impl ReleaseRepository for SqliteReleaseRepository {
    async fn store(&self, release: &Release) -> Result<ReleaseId> {
        debug!(
            target: "repository",
            release_id = %release.id,
            release_name = %release.release_name,
            "storing release"
        );
        let mut conn = self.pool.acquire().await?;
        insert_release(&mut conn, release).await?;
        Ok(release.id)
    }

    async fn store_action_status(&self, status: &ReleaseActionStatus) -> Result<()> {
        debug!(
            target: "repository",
            release_id = %status.release_id,
            status = %status.status,
            "storing release action status"
        );
        let mut conn = self.pool.acquire().await?;
        insert_action_status(&mut conn, status).await
    }

    async fn store_approved(
        &self,
        release: &Release,
        status: &ReleaseActionStatus,
    ) -> Result<ReleaseId> {
        debug!(
            target: "repository",
            release_id = %release.id,
            release_name = %release.release_name,
            filter = %status.filter,
            "storing approved release"
        );
        let mut tx = self.pool.begin().await?;
        insert_release(&mut tx, release).await?;
        insert_action_status(&mut tx, status).await?;
        tx.commit().await?;
        Ok(release.id)
    }

    async fn find_history_by_filter_id(&self, filter_id: FilterId) -> Result<Vec<Release>> {
        debug!(target: "repository", %filter_id, "fetching release history");
        // One statement, so the evaluation reads a single snapshot.
        let rows = sqlx::query(
            r#"
            SELECT r.* FROM releases r
            WHERE r.filter_id = ?
              AND (
                SELECT s.status FROM release_action_status s
                WHERE s.release_id = r.id
                ORDER BY s.timestamp DESC, s.rowid DESC
                LIMIT 1
              ) = ?
            ORDER BY r.timestamp DESC, r.rowid DESC
            "#,
        )
        .bind(filter_id.to_string())
        .bind(ReleasePushStatus::Approved.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_release).collect()
    }

    async fn get_by_id(&self, id: ReleaseId) -> Result<Option<Release>> {
        debug!(target: "repository", %id, "fetching release by id");
        let row = sqlx::query("SELECT * FROM releases WHERE id = ? LIMIT 1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_release(&r)).transpose()
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Release>> {
        debug!(target: "repository", limit, "listing recent releases");
        let rows = sqlx::query("SELECT * FROM releases ORDER BY timestamp DESC, rowid DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_release).collect()
    }

    async fn list_action_statuses(
        &self,
        release_id: ReleaseId,
    ) -> Result<Vec<ReleaseActionStatus>> {
        debug!(target: "repository", %release_id, "listing release action statuses");
        let rows = sqlx::query(
            "SELECT * FROM release_action_status WHERE release_id = ? ORDER BY timestamp, rowid",
        )
        .bind(release_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_action_status).collect()
    }

    async fn delete_older_than(&self, hours: u32) -> Result<u64> {
        let cutoff = Utc::now() - Duration::hours(i64::from(hours));
        debug!(target: "repository", hours, cutoff = %cutoff, "deleting releases older than cutoff");
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM releases WHERE timestamp < ?")
            .bind(fmt_dt(&cutoff))
            .execute(&mut *tx)
            .await?;
        // Statuses normally go with their release through the cascade; sweep any strays.
        sqlx::query(
            "DELETE FROM release_action_status WHERE release_id NOT IN (SELECT id FROM releases)",
        )
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

fn row_to_release(row: &SqliteRow) -> Result<Release> {
    let id_str: String = row.try_get("id")?;
    let filter_id: Option<String> = row.try_get("filter_id")?;
    let filter_status: String = row.try_get("filter_status")?;
    let implementation: String = row.try_get("implementation")?;
    let protocol: String = row.try_get("protocol")?;
    let size: i64 = row.try_get("size")?;
    let timestamp: String = row.try_get("timestamp")?;
    Ok(Release {
        id: ReleaseId::from_uuid(Uuid::parse_str(&id_str)?),
        filter_id: filter_id
            .map(|s| Uuid::parse_str(&s).map(FilterId::from_uuid))
            .transpose()?,
        filter_status: parse_filter_status(&filter_status)?,
        indexer: row.try_get("indexer")?,
        implementation: parse_implementation(&implementation)?,
        protocol: parse_protocol(&protocol)?,
        release_name: row.try_get("release_name")?,
        info_hash: row.try_get("info_hash")?,
        size: u64::try_from(size)?,
        title: row.try_get("title")?,
        sub_title: row.try_get("sub_title")?,
        year: get_u32(row, "year")?,
        month: get_u32(row, "month")?,
        day: get_u32(row, "day")?,
        season: get_u32(row, "season")?,
        episode: get_u32(row, "episode")?,
        resolution: row.try_get("resolution")?,
        source: row.try_get("source")?,
        codec: json_list(row, "codec")?,
        container: row.try_get("container")?,
        hdr: json_list(row, "hdr")?,
        audio: json_list(row, "audio")?,
        group: row.try_get("release_group")?,
        website: row.try_get("website")?,
        edition: row.try_get("edition")?,
        language: json_list(row, "language")?,
        proper: row.try_get("proper")?,
        repack: row.try_get("repack")?,
        hybrid: row.try_get("hybrid")?,
        category: row.try_get("category")?,
        categories: json_list(row, "categories")?,
        freeleech: row.try_get("freeleech")?,
        uploader: row.try_get("uploader")?,
        tags: json_list(row, "tags")?,
        other: json_list(row, "other")?,
        timestamp: parse_dt(timestamp)?,
    })
}

fn row_to_action_status(row: &SqliteRow) -> Result<ReleaseActionStatus> {
    let id_str: String = row.try_get("id")?;
    let release_id: String = row.try_get("release_id")?;
    let filter_id: String = row.try_get("filter_id")?;
    let status: String = row.try_get("status")?;
    let timestamp: String = row.try_get("timestamp")?;
    Ok(ReleaseActionStatus {
        id: ActionStatusId::from_uuid(Uuid::parse_str(&id_str)?),
        release_id: ReleaseId::from_uuid(Uuid::parse_str(&release_id)?),
        filter_id: FilterId::from_uuid(Uuid::parse_str(&filter_id)?),
        filter: row.try_get("filter")?,
        action: row.try_get("action")?,
        status: parse_push_status(&status)?,
        rejections: json_list(row, "rejections")?,
        timestamp: parse_dt(timestamp)?,
    })
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn parse_protocol(s: &str) -> Result<ReleaseProtocol> {
    match s {
        "torrent" => Ok(ReleaseProtocol::Torrent),
        "usenet" => Ok(ReleaseProtocol::Usenet),
        other => Err(anyhow!("unknown release protocol: {}", other)),
    }
}

fn parse_implementation(s: &str) -> Result<ReleaseImplementation> {
    match s {
        "IRC" => Ok(ReleaseImplementation::Irc),
        "TORZNAB" => Ok(ReleaseImplementation::Torznab),
        "NEWZNAB" => Ok(ReleaseImplementation::Newznab),
        "RSS" => Ok(ReleaseImplementation::Rss),
        "API" => Ok(ReleaseImplementation::Api),
        other => Err(anyhow!("unknown release implementation: {}", other)),
    }
}

fn parse_filter_status(s: &str) -> Result<ReleaseFilterStatus> {
    match s {
        "PENDING" => Ok(ReleaseFilterStatus::Pending),
        "FILTER_APPROVED" => Ok(ReleaseFilterStatus::FilterApproved),
        "FILTER_REJECTED" => Ok(ReleaseFilterStatus::FilterRejected),
        other => Err(anyhow!("unknown filter status: {}", other)),
    }
}

fn parse_push_status(s: &str) -> Result<ReleasePushStatus> {
    match s {
        "PENDING" => Ok(ReleasePushStatus::Pending),
        "PUSH_APPROVED" => Ok(ReleasePushStatus::Approved),
        "PUSH_REJECTED" => Ok(ReleasePushStatus::Rejected),
        "PUSH_ERROR" => Ok(ReleasePushStatus::Error),
        other => Err(anyhow!("unknown push status: {}", other)),
    }
}

fn get_u32(row: &SqliteRow, column: &str) -> Result<u32> {
    let value: i64 = row.try_get(column)?;
    Ok(u32::try_from(value)?)
}

fn json_list(row: &SqliteRow, column: &str) -> Result<Vec<String>> {
    let raw: String = row.try_get(column)?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&raw)?)
}

fn to_json(values: &[String]) -> Result<String> {
    Ok(serde_json::to_string(values)?)
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn fmt_dt(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_dt(s: String) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Ok(dt.with_timezone(&Utc));
    }
    // SQLite CURRENT_TIMESTAMP default: "YYYY-MM-DD HH:MM:SS"
    let ndt = NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")?;
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
}

// ============================================================================
// Tests
// ============================================================================
