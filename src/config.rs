//! Configuration handling for the IoTDB MCP Server.
//!
//! This module provides configuration management via CLI arguments and environment variables.
//! Configuration is parsed once at startup and is immutable afterwards.

use crate::error::{DbError, DbResult};
use chrono::{FixedOffset, Offset, Utc};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_IOTDB_HOST: &str = "127.0.0.1";
pub const DEFAULT_IOTDB_PORT: u16 = 6667;
pub const DEFAULT_IOTDB_USER: &str = "root";
pub const DEFAULT_IOTDB_PASSWORD: &str = "root";
pub const DEFAULT_IOTDB_DATABASE: &str = "test";
pub const DEFAULT_EXPORT_PATH: &str = "/tmp";

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// Session pool defaults
pub const DEFAULT_POOL_SIZE: usize = 100;
pub const DEFAULT_FETCH_SIZE: usize = 1024;
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_MAX_RETRY: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;

/// Upper bound passed to IoTDB's REST `row_limit`. IoTDB fails the query rather than
/// truncating when a result is larger.
pub const DEFAULT_ROW_LIMIT: usize = 1_000_000;

pub const DEFAULT_TIME_ZONE: &str = "+00:00";

/// SQL dialect of the IoTDB instance. Selects the exposed tool set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    /// Tree model: paths like `root.ln.wf01.wt01`
    Tree,
    /// Table model: relational tables inside a database
    #[default]
    Table,
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tree => write!(f, "tree"),
            Self::Table => write!(f, "table"),
        }
    }
}

/// Unit of the raw timestamps IoTDB returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TimestampPrecision {
    #[default]
    Ms,
    Us,
    Ns,
}

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// HTTP with Server-Sent Events (for web clients)
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

/// Configuration for the IoTDB MCP Server.
#[derive(Clone, Parser)]
#[command(
    name = "iotdb-mcp-server",
    about = "MCP server for Apache IoTDB - enables AI assistants to query and export time-series data",
    version,
    author
)]
pub struct Config {
    /// IoTDB host
    #[arg(long, default_value = DEFAULT_IOTDB_HOST, env = "IOTDB_HOST")]
    pub host: String,

    /// IoTDB port serving the REST interface
    #[arg(long, default_value_t = DEFAULT_IOTDB_PORT, env = "IOTDB_PORT")]
    pub port: u16,

    /// IoTDB username
    #[arg(long, default_value = DEFAULT_IOTDB_USER, env = "IOTDB_USER")]
    pub user: String,

    /// IoTDB password
    #[arg(long, default_value = DEFAULT_IOTDB_PASSWORD, env = "IOTDB_PASSWORD")]
    pub password: String,

    /// IoTDB database name (table dialect)
    #[arg(long, default_value = DEFAULT_IOTDB_DATABASE, env = "IOTDB_DATABASE")]
    pub database: String,

    /// SQL dialect (tree or table)
    #[arg(long, value_enum, default_value = "table", env = "IOTDB_SQL_DIALECT")]
    pub sql_dialect: SqlDialect,

    /// Directory for exported files
    #[arg(long, default_value = DEFAULT_EXPORT_PATH, env = "IOTDB_EXPORT_PATH")]
    pub export_path: PathBuf,

    /// Maximum number of concurrently checked-out sessions
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE, env = "IOTDB_POOL_SIZE")]
    pub pool_size: usize,

    /// Rows fetched per batch
    #[arg(long, default_value_t = DEFAULT_FETCH_SIZE, env = "IOTDB_FETCH_SIZE")]
    pub fetch_size: usize,

    /// How long a request waits for a free session, in milliseconds
    #[arg(long, default_value_t = DEFAULT_WAIT_TIMEOUT_MS, env = "IOTDB_WAIT_TIMEOUT_MS")]
    pub wait_timeout_ms: u64,

    /// Connection attempts retried before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_RETRY, env = "IOTDB_MAX_RETRY")]
    pub max_retry: u32,

    /// UTC offset used when rendering timestamps (e.g. +08:00)
    #[arg(long, default_value = DEFAULT_TIME_ZONE, env = "IOTDB_TIME_ZONE")]
    pub time_zone: String,

    /// Precision of IoTDB timestamps
    #[arg(long, value_enum, default_value = "ms", env = "IOTDB_TIMESTAMP_PRECISION")]
    pub timestamp_precision: TimestampPrecision,

    /// Maximum rows IoTDB may return for one query
    #[arg(long, default_value_t = DEFAULT_ROW_LIMIT, env = "IOTDB_ROW_LIMIT")]
    pub row_limit: usize,

    /// Backend request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_QUERY_TIMEOUT_SECS, env = "IOTDB_QUERY_TIMEOUT")]
    pub query_timeout: u64,

    /// Backend connect timeout in seconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, env = "IOTDB_CONNECT_TIMEOUT")]
    pub connect_timeout: u64,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "MCP_HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "MCP_HTTP_PORT")]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(long, default_value = DEFAULT_MCP_ENDPOINT, env = "MCP_ENDPOINT")]
    pub mcp_endpoint: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,
}

// Keeps the password out of startup logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("sql_dialect", &self.sql_dialect)
            .field("export_path", &self.export_path)
            .field("pool_size", &self.pool_size)
            .field("fetch_size", &self.fetch_size)
            .field("wait_timeout_ms", &self.wait_timeout_ms)
            .field("max_retry", &self.max_retry)
            .field("time_zone", &self.time_zone)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            host: DEFAULT_IOTDB_HOST.to_string(),
            port: DEFAULT_IOTDB_PORT,
            user: DEFAULT_IOTDB_USER.to_string(),
            password: DEFAULT_IOTDB_PASSWORD.to_string(),
            database: DEFAULT_IOTDB_DATABASE.to_string(),
            sql_dialect: SqlDialect::Table,
            export_path: PathBuf::from(DEFAULT_EXPORT_PATH),
            pool_size: DEFAULT_POOL_SIZE,
            fetch_size: DEFAULT_FETCH_SIZE,
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            max_retry: DEFAULT_MAX_RETRY,
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            timestamp_precision: TimestampPrecision::Ms,
            row_limit: DEFAULT_ROW_LIMIT,
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Validate values clap cannot check on its own.
    pub fn validate(&self) -> DbResult<()> {
        if self.host.trim().is_empty() {
            return Err(DbError::config("host must not be empty"));
        }
        if self.pool_size == 0 {
            return Err(DbError::config("pool_size must be greater than 0"));
        }
        if self.fetch_size == 0 {
            return Err(DbError::config("fetch_size must be greater than 0"));
        }
        if self.row_limit == 0 {
            return Err(DbError::config("row_limit must be greater than 0"));
        }
        if self.sql_dialect == SqlDialect::Table && self.database.trim().is_empty() {
            return Err(DbError::config(
                "database must be set when using the table dialect",
            ));
        }
        self.time_zone_offset()?;
        self.rest_base_url()?;
        Ok(())
    }

    /// Parse the configured time zone into a fixed UTC offset.
    pub fn time_zone_offset(&self) -> DbResult<FixedOffset> {
        let tz = self.time_zone.trim();
        if tz.eq_ignore_ascii_case("utc") || tz.eq_ignore_ascii_case("z") {
            return Ok(Utc.fix());
        }
        tz.parse::<FixedOffset>().map_err(|e| {
            DbError::config(format!(
                "Invalid time zone '{}': {}. Use an offset like +08:00",
                tz, e
            ))
        })
    }

    /// Base URL of the IoTDB REST service.
    pub fn rest_base_url(&self) -> DbResult<Url> {
        Url::parse(&format!("http://{}:{}/", self.host, self.port))
            .map_err(|e| DbError::config(format!("Invalid IoTDB address: {e}")))
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Get the session wait timeout as a Duration.
    pub fn wait_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
