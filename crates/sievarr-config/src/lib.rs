// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::Path;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_max_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://sievarr.db".to_string(),
            pool_max_size: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7474,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Emit newline-delimited JSON instead of the human readable format.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub max_concurrent_jobs: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
        }
    }
}

/// Release history retention. History older than `older_than_hours` is
/// removed, which also bounds what the duplicate check has to scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub enabled: bool,
    pub older_than_hours: u32,
    pub interval_seconds: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            older_than_hours: 24 * 30,
            interval_seconds: 6 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// When unset the API accepts unauthenticated requests.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub telemetry: TelemetryConfig,
    pub scheduler: SchedulerConfig,
    pub retention: RetentionConfig,
    pub auth: AuthConfig,
}

/// Load configuration from defaults, optional TOML file, and environment overrides (prefix: SIEVARR_).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("SIEVARR_").split("__"));

    let config: AppConfig = figment.extract()?;
    info!(
        target: "config",
        database = %config.database.url,
        retention_enabled = config.retention.enabled,
        "configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_file_or_env() {
        Jail::expect_with(|_jail| {
            let config = load(None).expect("load defaults");
            assert_eq!(config.database.url, "sqlite://sievarr.db");
            assert_eq!(config.http.port, 7474);
            assert!(config.retention.enabled);
            assert_eq!(config.retention.older_than_hours, 720);
            assert!(config.auth.api_key.is_none());
            Ok(())
        });
    }

    #[test]
    fn toml_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "sievarr.toml",
                r#"
                    [http]
                    port = 9000

                    [retention]
                    older_than_hours = 48
                "#,
            )?;

            let config = load(Some(Path::new("sievarr.toml"))).expect("load toml");
            assert_eq!(config.http.port, 9000);
            assert_eq!(config.http.host, "127.0.0.1");
            assert_eq!(config.retention.older_than_hours, 48);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("sievarr.toml", "[http]\nport = 9000\n")?;
            jail.set_env("SIEVARR_HTTP__PORT", "9100");
            jail.set_env("SIEVARR_AUTH__API_KEY", "secret");

            let config = load(Some(Path::new("sievarr.toml"))).expect("load env");
            assert_eq!(config.http.port, 9100);
            assert_eq!(config.auth.api_key.as_deref(), Some("secret"));
            Ok(())
        });
    }
}
