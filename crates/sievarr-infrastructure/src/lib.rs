// SPDX-License-Identifier: GPL-3.0-or-later
pub mod repositories;
pub mod sqlite_adapters;

use anyhow::Result;
use sievarr_config::AppConfig;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

/// Rewrites a `sqlite://` file url into an absolute, create-if-missing url.
/// In-memory urls are returned untouched.
fn normalize_sqlite_url(url: &str) -> Result<String> {
    if !url.starts_with("sqlite://") || is_in_memory(url) {
        return Ok(url.to_string());
    }

    let db_path = url.trim_start_matches("sqlite://");
    let db_path = db_path.split('?').next().unwrap_or(db_path);
    let path = Path::new(db_path);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
            info!(target: "infrastructure", path = %parent.display(), "created database directory");
        }
    }

    let absolute_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    // SQLite accepts forward slashes on every platform
    let path_str = absolute_path.to_string_lossy().replace('\\', "/");
    Ok(format!("sqlite://{}?mode=rwc", path_str))
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:")
}

/// Connect the pool and apply embedded migrations.
pub async fn init_database(config: &AppConfig) -> Result<SqlitePool> {
    info!(target: "infrastructure", "initializing database");

    let db_url = normalize_sqlite_url(&config.database.url)?;
    // Every connection to `:memory:` would get its own empty database.
    let max_connections = if is_in_memory(&db_url) {
        1
    } else {
        config.database.pool_max_size.max(1)
    };

    info!(target: "infrastructure", db_url = %db_url, max_connections, "connecting to database");
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(&db_url)
        .await?;

    info!(target: "infrastructure", "running migrations");
    sqlx::migrate!("../../migrations").run(&pool).await?;

    info!(target: "infrastructure", "database initialized successfully");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_url_is_untouched() {
        assert_eq!(
            normalize_sqlite_url("sqlite::memory:").unwrap(),
            "sqlite::memory:"
        );
        assert_eq!(
            normalize_sqlite_url("sqlite://:memory:").unwrap(),
            "sqlite://:memory:"
        );
    }

    #[test]
    fn relative_file_url_becomes_absolute() {
        let url = normalize_sqlite_url("sqlite://sievarr.db").unwrap();
        assert!(url.starts_with("sqlite://"));
        assert!(url.ends_with("sievarr.db?mode=rwc"));
        let path = url.trim_start_matches("sqlite://").trim_end_matches("?mode=rwc");
        assert!(Path::new(path).is_absolute());
    }

    #[test]
    fn windows_separators_are_normalized() {
        let url = normalize_sqlite_url("sqlite://data\\sievarr.db").unwrap();
        assert!(!url.contains('\\'));
        assert!(url.ends_with("data/sievarr.db?mode=rwc"));
    }

    #[tokio::test]
    async fn init_database_runs_migrations_in_memory() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        let pool = init_database(&config).await.expect("init database");

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'releases'",
        )
        .fetch_one(&pool)
        .await
        .expect("query sqlite_master");
        assert_eq!(count, 1);
    }
}
