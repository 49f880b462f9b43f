//! Configuration handling for the ClickHouse MCP Server.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use crate::db::client::ClickHouseSettings;
use crate::db::cursor_cache::{
    DEFAULT_CURSOR_CAPACITY, DEFAULT_CURSOR_SWEEP_INTERVAL_SECS, DEFAULT_CURSOR_TTL_SECS,
};
use crate::db::pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::error::{DbError, DbResult};
use crate::models::{DEFAULT_QUERY_POOL_SIZE, DEFAULT_QUERY_TIMEOUT_SECS};
use clap::{ArgAction, Parser, ValueEnum};
use std::time::Duration;
use url::Url;

pub const DEFAULT_CLICKHOUSE_URL: &str = "http://localhost:8123";
pub const DEFAULT_CLICKHOUSE_USER: &str = "default";
pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_MCP_ENDPOINT: &str = "/mcp";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SEND_RECEIVE_TIMEOUT_SECS: u64 = 300;

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP (for web clients)
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// ClickHouse MCP Server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "clickhouse-mcp-server", version, about)]
pub struct Config {
    /// ClickHouse HTTP interface URL
    #[arg(long, default_value = DEFAULT_CLICKHOUSE_URL, env = "CLICKHOUSE_URL")]
    pub url: String,

    /// ClickHouse user
    #[arg(long, default_value = DEFAULT_CLICKHOUSE_USER, env = "CLICKHOUSE_USER")]
    pub user: String,

    /// ClickHouse password (sensitive - not logged)
    #[arg(long, env = "CLICKHOUSE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Default database for queries
    #[arg(long, env = "CLICKHOUSE_DATABASE")]
    pub database: Option<String>,

    /// Verify TLS certificates
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        env = "CLICKHOUSE_VERIFY"
    )]
    pub verify: bool,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "CLICKHOUSE_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Per-request send/receive timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_SEND_RECEIVE_TIMEOUT_SECS,
        env = "CLICKHOUSE_SEND_RECEIVE_TIMEOUT"
    )]
    pub send_receive_timeout: u64,

    /// run_select_query timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "CLICKHOUSE_MCP_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Maximum number of concurrently executing queries
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_POOL_SIZE,
        env = "CLICKHOUSE_MCP_QUERY_POOL_SIZE"
    )]
    pub query_pool_size: usize,

    /// Default list_tables page size
    #[arg(
        long,
        default_value_t = DEFAULT_PAGE_SIZE,
        env = "CLICKHOUSE_MCP_PAGE_SIZE"
    )]
    pub page_size: usize,

    /// Maximum number of live pagination cursors
    #[arg(
        long,
        default_value_t = DEFAULT_CURSOR_CAPACITY,
        env = "CLICKHOUSE_MCP_CURSOR_CACHE_CAPACITY"
    )]
    pub cursor_cache_capacity: usize,

    /// Pagination cursor lifetime in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CURSOR_TTL_SECS,
        env = "CLICKHOUSE_MCP_CURSOR_TTL"
    )]
    pub cursor_ttl: u64,

    /// Interval between expired cursor sweeps in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CURSOR_SWEEP_INTERVAL_SECS,
        env = "CLICKHOUSE_MCP_CURSOR_SWEEP_INTERVAL"
    )]
    pub cursor_sweep_interval: u64,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "CLICKHOUSE_MCP_SERVER_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "CLICKHOUSE_MCP_BIND_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "CLICKHOUSE_MCP_BIND_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "CLICKHOUSE_MCP_ENDPOINT"
    )]
    pub mcp_endpoint: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "CLICKHOUSE_MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "CLICKHOUSE_MCP_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            url: DEFAULT_CLICKHOUSE_URL.to_string(),
            user: DEFAULT_CLICKHOUSE_USER.to_string(),
            password: None,
            database: None,
            verify: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            send_receive_timeout: DEFAULT_SEND_RECEIVE_TIMEOUT_SECS,
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            query_pool_size: DEFAULT_QUERY_POOL_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            cursor_cache_capacity: DEFAULT_CURSOR_CAPACITY,
            cursor_ttl: DEFAULT_CURSOR_TTL_SECS,
            cursor_sweep_interval: DEFAULT_CURSOR_SWEEP_INTERVAL_SECS,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> DbResult<()> {
        self.parsed_url()?;

        if self.query_pool_size == 0 {
            return Err(DbError::invalid_input("query_pool_size must be at least 1"));
        }
        if self.query_timeout == 0 {
            return Err(DbError::invalid_input("query_timeout must be at least 1 second"));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(DbError::invalid_input(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if self.cursor_cache_capacity == 0 {
            return Err(DbError::invalid_input(
                "cursor_cache_capacity must be at least 1",
            ));
        }
        if self.cursor_ttl == 0 {
            return Err(DbError::invalid_input("cursor_ttl must be at least 1 second"));
        }
        if self.cursor_sweep_interval == 0 {
            return Err(DbError::invalid_input(
                "cursor_sweep_interval must be at least 1 second",
            ));
        }
        if !self.mcp_endpoint.starts_with('/') {
            return Err(DbError::invalid_input("mcp_endpoint must start with '/'"));
        }

        Ok(())
    }

    fn parsed_url(&self) -> DbResult<Url> {
        let url = Url::parse(&self.url)
            .map_err(|e| DbError::invalid_input(format!("Invalid ClickHouse URL: {}", e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(DbError::invalid_input(format!(
                "Unsupported ClickHouse URL scheme '{}', expected http or https",
                other
            ))),
        }
    }

    /// Build client settings from this configuration.
    pub fn clickhouse_settings(&self) -> DbResult<ClickHouseSettings> {
        Ok(ClickHouseSettings {
            url: self.parsed_url()?,
            user: self.user.clone(),
            password: self.password.clone().filter(|p| !p.is_empty()),
            database: self.database.clone().filter(|d| !d.is_empty()),
            verify: self.verify,
            connect_timeout: self.connect_timeout_duration(),
            send_receive_timeout: self.send_receive_timeout_duration(),
        })
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn send_receive_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.send_receive_timeout)
    }

    pub fn cursor_ttl_duration(&self) -> Duration {
        Duration::from_secs(self.cursor_ttl)
    }

    pub fn cursor_sweep_interval_duration(&self) -> Duration {
        Duration::from_secs(self.cursor_sweep_interval)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transport, TransportMode::Stdio);
        assert_eq!(config.url, DEFAULT_CLICKHOUSE_URL);
        assert_eq!(config.user, "default");
        assert_eq!(config.query_pool_size, 10);
        assert_eq!(config.page_size, 50);
        assert!(config.verify);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_match_cli_defaults() {
        let parsed = Config::try_parse_from(["clickhouse-mcp-server"]).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.query_timeout, defaults.query_timeout);
        assert_eq!(parsed.cursor_ttl, defaults.cursor_ttl);
        assert_eq!(parsed.cursor_cache_capacity, defaults.cursor_cache_capacity);
        assert_eq!(parsed.mcp_endpoint, defaults.mcp_endpoint);
    }

    #[test]
    fn test_parse_flags() {
        let config = Config::try_parse_from([
            "clickhouse-mcp-server",
            "--url",
            "https://ch.example.com:8443",
            "--verify",
            "false",
            "--query-pool-size",
            "4",
            "--transport",
            "http",
        ])
        .unwrap();
        assert_eq!(config.url, "https://ch.example.com:8443");
        assert!(!config.verify);
        assert_eq!(config.query_pool_size, 4);
        assert_eq!(config.transport, TransportMode::Http);
    }

    #[test]
    fn test_timeout_durations() {
        let config = Config {
            query_timeout: 60,
            connect_timeout: 15,
            cursor_ttl: 120,
            ..Config::default()
        };
        assert_eq!(config.query_timeout_duration(), Duration::from_secs(60));
        assert_eq!(config.connect_timeout_duration(), Duration::from_secs(15));
        assert_eq!(config.cursor_ttl_duration(), Duration::from_secs(120));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        for config in [
            Config {
                query_pool_size: 0,
                ..Config::default()
            },
            Config {
                page_size: 0,
                ..Config::default()
            },
            Config {
                cursor_cache_capacity: 0,
                ..Config::default()
            },
            Config {
                cursor_ttl: 0,
                ..Config::default()
            },
        ] {
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = Config {
            url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            url: "tcp://localhost:9000".to_string(),
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Unsupported ClickHouse URL scheme"));
    }

    #[test]
    fn test_clickhouse_settings_drop_empty_values() {
        let config = Config {
            password: Some(String::new()),
            database: Some(String::new()),
            ..Config::default()
        };
        let settings = config.clickhouse_settings().unwrap();
        assert!(settings.password.is_none());
        assert!(settings.database.is_none());
        assert_eq!(settings.url.as_str(), "http://localhost:8123/");
    }
}
