// SPDX-License-Identifier: GPL-3.0-or-later
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::serve;
use sievarr_api::router;
use sievarr_application::AppState;
use sievarr_config::{load as load_config, HttpConfig, TelemetryConfig};
use sievarr_infrastructure::init_database;
use sievarr_infrastructure::sqlite_adapters::{
    SqliteDuplicateProfileRepository, SqliteFilterRepository, SqliteIndexerRepository,
    SqliteReleaseRepository,
};
use sievarr_scheduler::Scheduler;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path(std::env::args().nth(1), std::env::var("SIEVARR_CONFIG").ok());
    let config = load_config(config_path.as_deref())?;
    init_tracing(&config.telemetry);
    info!(target: "cli", config = ?config_path, "starting sievarr");

    let pool = init_database(&config).await?;
    let profiles = Arc::new(SqliteDuplicateProfileRepository::new(pool.clone()));
    let filters = Arc::new(SqliteFilterRepository::new(pool.clone()));
    let indexers = Arc::new(SqliteIndexerRepository::new(pool.clone()));
    let releases = Arc::new(SqliteReleaseRepository::new(pool));

    let state = AppState::new(
        config.clone(),
        profiles,
        filters,
        indexers,
        releases.clone(),
    );
    state.on_start();

    let scheduler = Scheduler::new(config.clone(), releases);
    scheduler.register_jobs().await;
    let scheduler_handle = scheduler.start();

    let listener = TcpListener::bind(bind_addr(&config.http)?).await?;
    let addr = listener.local_addr()?;
    info!(target: "cli", "listening on {}", addr);

    serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler_handle.abort();
    info!(target: "cli", "shutdown complete");
    Ok(())
}

/// An explicit argument beats `SIEVARR_CONFIG`.
fn config_path(arg: Option<String>, env: Option<String>) -> Option<PathBuf> {
    arg.or(env)
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
}

fn init_tracing(telemetry: &TelemetryConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(telemetry.log_level.as_str()));
    let registry = tracing_subscriber::registry().with(env_filter);

    if telemetry.json {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_names(true).with_level(true))
            .init();
    }
}

fn bind_addr(http: &HttpConfig) -> Result<SocketAddr> {
    let addr = format!("{}:{}", http.host, http.port);
    addr.parse()
        .with_context(|| format!("invalid listen address {addr}"))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut interrupt), Ok(mut terminate)) => {
                tokio::select! {
                    _ = interrupt.recv() => {},
                    _ = terminate.recv() => {},
                }
            }
            _ => {
                tracing::warn!(target: "cli", "unix signal handlers unavailable, using ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!(target: "cli", "shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_addr_parsing() {
        let http = HttpConfig {
            host: "127.0.0.1".to_string(),
            port: 7474,
        };
        let addr = bind_addr(&http).expect("addr");
        assert_eq!(addr.port(), 7474);
        assert!(addr.is_ipv4());
    }

    #[test]
    fn test_bind_addr_ipv6() {
        let http = HttpConfig {
            host: "[::1]".to_string(),
            port: 8080,
        };
        let addr = bind_addr(&http).expect("addr");
        assert_eq!(addr.port(), 8080);
        assert!(addr.is_ipv6());
    }

    #[test]
    fn test_bind_addr_rejects_garbage() {
        let http = HttpConfig {
            host: "not a host".to_string(),
            port: 1,
        };
        assert!(bind_addr(&http).is_err());
    }

    #[test]
    fn config_path_precedence() {
        assert_eq!(
            config_path(Some("a.toml".into()), Some("b.toml".into())),
            Some(PathBuf::from("a.toml"))
        );
        assert_eq!(
            config_path(None, Some("b.toml".into())),
            Some(PathBuf::from("b.toml"))
        );
        assert_eq!(config_path(None, Some(" ".into())), None);
        assert_eq!(config_path(None, None), None);
    }
}
