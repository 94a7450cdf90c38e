//! Cohort node - the daemon wiring.
//!
//! Architecture:
//! - Single daemon process with one shared RocksDB transaction store
//! - HTTP API for clients (deals, groups, redemptions)
//! - Settlement sweeper on a fixed interval
//! - Unix admin socket for local operator commands (cohort-admin CLI)

use crate::admin_socket::AdminSocket;
use crate::api;
use crate::clock::SystemClock;
use crate::engine::{Engine, DEFAULT_RECENT_GROUPS};
use crate::error::{Error, Result};
use crate::reputation::StoredReputation;
use crate::storage::{Storage, DEFAULT_LOCK_TIMEOUT};
use crate::sweeper::{Sweeper, DEFAULT_SWEEP_INTERVAL};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a cohort node.
#[derive(Debug, Clone)]
pub struct CohortConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Admin socket path (for cohort-admin CLI)
    pub admin_socket: PathBuf,

    pub sweep_interval: Duration,

    /// How long a writer waits for a group's row lock
    pub lock_timeout: Duration,

    /// Groups listed on a deal detail
    pub recent_groups: usize,
}

impl Default for CohortConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("./cohort-data");
        Self {
            admin_socket: data_dir.join("admin.sock"),
            data_dir,
            api_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            recent_groups: DEFAULT_RECENT_GROUPS,
        }
    }
}

impl CohortConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let data_dir = var("COHORT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let admin_socket = var("COHORT_ADMIN_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("admin.sock"));

        Ok(Self {
            api_addr: parse_var(&var, "COHORT_API_ADDR")?.unwrap_or(defaults.api_addr),
            sweep_interval: parse_var(&var, "COHORT_SWEEP_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            lock_timeout: parse_var(&var, "COHORT_LOCK_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.lock_timeout),
            recent_groups: parse_var(&var, "COHORT_RECENT_GROUPS")?
                .unwrap_or(defaults.recent_groups),
            data_dir,
            admin_socket,
        })
    }
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::InvalidInput(format!("invalid {}={:?}: {}", name, raw, e)))
        })
        .transpose()
}

/// Shared state for the node - one engine shared by every component.
pub struct CohortState {
    pub engine: Arc<Engine>,
    pub sweeper: Arc<Sweeper>,
    pub config: CohortConfig,
}

/// A cohort node instance.
pub struct CohortNode {
    state: Arc<CohortState>,
}

impl CohortNode {
    /// Open storage and build the engine.
    pub fn new(config: CohortConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let storage = Arc::new(Storage::open_with_lock_timeout(
            &config.data_dir,
            config.lock_timeout,
        )?);
        let reputation = Arc::new(StoredReputation::new(Arc::clone(&storage)));
        let engine = Arc::new(
            Engine::new(storage, reputation, Arc::new(SystemClock))?
                .with_recent_groups_limit(config.recent_groups),
        );
        let sweeper = Arc::new(Sweeper::new(Arc::clone(&engine), config.sweep_interval));

        Ok(Self {
            state: Arc::new(CohortState {
                engine,
                sweeper,
                config,
            }),
        })
    }

    /// Get the shared state (for API handlers).
    pub fn state(&self) -> Arc<CohortState> {
        Arc::clone(&self.state)
    }

    /// Run the node (starts sweeper, admin socket, and HTTP server).
    pub async fn run(self) -> Result<()> {
        let config = &self.state.config;
        tracing::info!("Cohort node starting");
        tracing::info!("  API: http://{}", config.api_addr);
        tracing::info!("  Admin: {:?}", config.admin_socket);
        tracing::info!("  Data: {:?}", config.data_dir);

        tokio::spawn(Arc::clone(&self.state.sweeper).run());

        let admin_socket = AdminSocket::new(
            Arc::clone(&self.state.engine),
            Arc::clone(&self.state.sweeper),
            config.admin_socket.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = admin_socket.run().await {
                tracing::error!("Admin socket error: {}", e);
            }
        });

        let app = api::build_router(self.state());

        let listener = tokio::net::TcpListener::bind(config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", config.api_addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = CohortConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./cohort-data"));
        assert_eq!(config.admin_socket, PathBuf::from("./cohort-data/admin.sock"));
        assert_eq!(config.api_addr.port(), 8080);
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.lock_timeout, Duration::from_millis(2000));
        assert_eq!(config.recent_groups, 10);
    }

    #[test]
    fn env_overrides() {
        let config = CohortConfig::from_lookup(lookup(&[
            ("COHORT_DATA_DIR", "/var/lib/cohort"),
            ("COHORT_API_ADDR", "127.0.0.1:9100"),
            ("COHORT_SWEEP_INTERVAL_SECS", "5"),
            ("COHORT_RECENT_GROUPS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.admin_socket, PathBuf::from("/var/lib/cohort/admin.sock"));
        assert_eq!(config.api_addr.port(), 9100);
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.recent_groups, 3);
    }

    #[test]
    fn malformed_value_is_an_error() {
        let err = CohortConfig::from_lookup(lookup(&[("COHORT_LOCK_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("COHORT_LOCK_TIMEOUT_MS"));
    }
}
