use chronicle_api::http::{CorsConfig, HttpLoggingConfig, HttpServerConfig};
use common::postgres::PostgresConfig;
use config::{Config, ConfigError, Environment};
use ingest_worker::IngestPipelineConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // HTTP configuration
    /// Address the HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path the API is mounted under, without trailing slash
    #[serde(default)]
    pub prefix: String,

    /// CORS allowed origins (comma-separated list, "*" for all origins)
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: String,

    /// Request paths that are not logged (comma-separated prefixes)
    #[serde(default)]
    pub http_ignored_paths: String,

    /// Key for the last-user lookup. Empty disables the endpoint.
    #[serde(default)]
    pub api_key: String,

    // Pipeline configuration
    /// Number of transformer workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Seconds between batch writes
    #[serde(default = "default_write_interval_secs")]
    pub write_interval_secs: u64,

    // PostgreSQL configuration
    /// PostgreSQL host
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    /// PostgreSQL port
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    /// PostgreSQL database name
    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    /// PostgreSQL username
    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    /// PostgreSQL password
    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    /// Maximum pooled PostgreSQL connections
    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_cors_allowed_origins() -> String {
    "*".to_string()
}

fn default_workers() -> usize {
    10
}

fn default_write_interval_secs() -> u64 {
    15
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "chronicle".to_string()
}

fn default_postgres_username() -> String {
    "chronicle".to_string()
}

fn default_postgres_password() -> String {
    "chronicle".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    5
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("log_level", &self.log_level)
            .field("listen_addr", &self.listen_addr)
            .field("prefix", &self.prefix)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("http_ignored_paths", &self.http_ignored_paths)
            .field("api_key_set", &!self.api_key.is_empty())
            .field("workers", &self.workers)
            .field("write_interval_secs", &self.write_interval_secs)
            .field("postgres_host", &self.postgres_host)
            .field("postgres_port", &self.postgres_port)
            .field("postgres_database", &self.postgres_database)
            .field("postgres_username", &self.postgres_username)
            .field("postgres_max_pool_size", &self.postgres_max_pool_size)
            .finish()
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(Environment::with_prefix("CHRONICLE"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Message(
                "CHRONICLE_WORKERS must be at least 1".to_string(),
            ));
        }
        if self.write_interval_secs == 0 {
            return Err(ConfigError::Message(
                "CHRONICLE_WRITE_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> IngestPipelineConfig {
        IngestPipelineConfig {
            workers: self.workers,
            write_interval: Duration::from_secs(self.write_interval_secs),
        }
    }

    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
        }
    }

    pub fn http_server_config(&self) -> HttpServerConfig {
        let ignored_paths: Vec<String> = self
            .http_ignored_paths
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        HttpServerConfig {
            listen_addr: self.listen_addr.clone(),
            prefix: self.prefix.clone(),
            logging_config: HttpLoggingConfig::new(ignored_paths),
            cors_config: CorsConfig::from_comma_separated(&self.cors_allowed_origins),
        }
    }
}
