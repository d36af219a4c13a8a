//! Configuration management

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/snapforge";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Fixed poll interval for warehouse query status checks (§4.1 step 2).
pub const WAREHOUSE_POLL_INTERVAL_SECS: u64 = 2;

/// Default page size for warehouse result pagination.
pub const DEFAULT_WAREHOUSE_PAGE_SIZE: i64 = 5000;

/// Upper read timeout for a single warehouse HTTP call (§5).
pub const DEFAULT_WAREHOUSE_HTTP_TIMEOUT_SECS: u64 = 300;

/// Coordinator wait-for-phases timeout (§4.5 step 5, §5).
pub const DEFAULT_PHASE_WAIT_TIMEOUT_SECS: u64 = 600;

/// Bulk-op coordinator wait-for-batches timeout (§4.7 step 8, §5).
pub const DEFAULT_BULK_OP_TIMEOUT_SECS: u64 = 1800;

/// Default bulk-op batch size (§4.7 step 4).
pub const DEFAULT_BULK_OP_BATCH_SIZE: u32 = 50;

/// Default spacing between fan-out publishes so the queue group round-robins
/// across distinct workers (§4.5 step 4).
pub const DEFAULT_FANOUT_STAGGER_MS: u64 = 50;

/// Default number of in-process Phase Worker replicas (§5: "≥ 3").
pub const DEFAULT_PHASE_WORKER_REPLICAS: usize = 3;

/// Default number of in-process Bulk Op Worker replicas.
pub const DEFAULT_BULK_OP_WORKER_REPLICAS: usize = 3;

/// Default per-environment rate-limit quota for the external M3 API, in
/// operations per second.
pub const DEFAULT_M3_RATE_LIMIT_PER_SEC: u32 = 5;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub warehouse: WarehouseConfig,
    pub engine: EngineConfig,
    pub m3: M3Config,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Connection details for the analytical warehouse's SQL-over-HTTP service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub base_url: String,
    pub bearer_token: String,
    pub page_size: i64,
    pub http_timeout_secs: u64,
}

impl WarehouseConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(WAREHOUSE_POLL_INTERVAL_SECS)
    }
}

/// Tunables for the refresh and bulk-op pipelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub phase_wait_timeout_secs: u64,
    pub bulk_op_timeout_secs: u64,
    pub bulk_op_batch_size: u32,
    pub fanout_stagger_ms: u64,
    pub phase_worker_replicas: usize,
    pub bulk_op_worker_replicas: usize,
    pub m3_rate_limit_per_sec: u32,
}

impl EngineConfig {
    pub fn phase_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.phase_wait_timeout_secs)
    }

    pub fn bulk_op_timeout(&self) -> Duration {
        Duration::from_secs(self.bulk_op_timeout_secs)
    }

    pub fn fanout_stagger(&self) -> Duration {
        Duration::from_millis(self.fanout_stagger_ms)
    }
}

/// Connection details for the external M3 API a Bulk Op Worker executes
/// operations against. The call shapes themselves are out of scope (§1); this
/// only carries what the worker needs to reach the API and gate its own
/// call rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct M3Config {
    pub base_url: String,
    pub api_token: String,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: env_or("SNAPFORGE_HOST", DEFAULT_SERVER_HOST),
                port: env_parse_or("SNAPFORGE_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_parse_or(
                    "SNAPFORGE_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            database: DatabaseConfig {
                url: env_or("DATABASE_URL", DEFAULT_DATABASE_URL),
                max_connections: env_parse_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                min_connections: env_parse_or(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                ),
                connect_timeout_secs: env_parse_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_parse_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                ),
            },
            cors: CorsConfig {
                allowed_origins: env_or("CORS_ALLOWED_ORIGINS", DEFAULT_CORS_ALLOWED_ORIGIN)
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                allow_credentials: env_parse_or("CORS_ALLOW_CREDENTIALS", true),
            },
            warehouse: WarehouseConfig {
                base_url: std::env::var("WAREHOUSE_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:9090".to_string()),
                bearer_token: std::env::var("WAREHOUSE_BEARER_TOKEN").unwrap_or_default(),
                page_size: env_parse_or("WAREHOUSE_PAGE_SIZE", DEFAULT_WAREHOUSE_PAGE_SIZE),
                http_timeout_secs: env_parse_or(
                    "WAREHOUSE_HTTP_TIMEOUT_SECS",
                    DEFAULT_WAREHOUSE_HTTP_TIMEOUT_SECS,
                ),
            },
            engine: EngineConfig {
                phase_wait_timeout_secs: env_parse_or(
                    "PHASE_WAIT_TIMEOUT_SECS",
                    DEFAULT_PHASE_WAIT_TIMEOUT_SECS,
                ),
                bulk_op_timeout_secs: env_parse_or(
                    "BULK_OP_TIMEOUT_SECS",
                    DEFAULT_BULK_OP_TIMEOUT_SECS,
                ),
                bulk_op_batch_size: env_parse_or(
                    "BULK_OP_BATCH_SIZE",
                    DEFAULT_BULK_OP_BATCH_SIZE,
                ),
                fanout_stagger_ms: env_parse_or(
                    "FANOUT_STAGGER_MS",
                    DEFAULT_FANOUT_STAGGER_MS,
                ),
                phase_worker_replicas: env_parse_or(
                    "PHASE_WORKER_REPLICAS",
                    DEFAULT_PHASE_WORKER_REPLICAS,
                ),
                bulk_op_worker_replicas: env_parse_or(
                    "BULK_OP_WORKER_REPLICAS",
                    DEFAULT_BULK_OP_WORKER_REPLICAS,
                ),
                m3_rate_limit_per_sec: env_parse_or(
                    "M3_RATE_LIMIT_PER_SEC",
                    DEFAULT_M3_RATE_LIMIT_PER_SEC,
                ),
            },
            m3: M3Config {
                base_url: std::env::var("M3_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:9091".to_string()),
                api_token: std::env::var("M3_API_TOKEN").unwrap_or_default(),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.warehouse.page_size <= 0 {
            anyhow::bail!("Warehouse page_size must be greater than 0");
        }

        if self.engine.phase_worker_replicas == 0 {
            anyhow::bail!("At least one phase worker replica is required");
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
            warehouse: WarehouseConfig {
                base_url: "http://localhost:9090".to_string(),
                bearer_token: String::new(),
                page_size: DEFAULT_WAREHOUSE_PAGE_SIZE,
                http_timeout_secs: DEFAULT_WAREHOUSE_HTTP_TIMEOUT_SECS,
            },
            engine: EngineConfig {
                phase_wait_timeout_secs: DEFAULT_PHASE_WAIT_TIMEOUT_SECS,
                bulk_op_timeout_secs: DEFAULT_BULK_OP_TIMEOUT_SECS,
                bulk_op_batch_size: DEFAULT_BULK_OP_BATCH_SIZE,
                fanout_stagger_ms: DEFAULT_FANOUT_STAGGER_MS,
                phase_worker_replicas: DEFAULT_PHASE_WORKER_REPLICAS,
                bulk_op_worker_replicas: DEFAULT_BULK_OP_WORKER_REPLICAS,
                m3_rate_limit_per_sec: DEFAULT_M3_RATE_LIMIT_PER_SEC,
            },
            m3: M3Config {
                base_url: "http://localhost:9091".to_string(),
                api_token: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_min_greater_than_max_connections() {
        let mut config = Config::default();
        config.database.min_connections = 50;
        config.database.max_connections = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_phase_worker_replicas() {
        let mut config = Config::default();
        config.engine.phase_worker_replicas = 0;
        assert!(config.validate().is_err());
    }
}
