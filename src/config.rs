//! Configuration handling for the chunked SQL gateway.
//!
//! This module provides configuration management via CLI arguments and environment variables,
//! plus the chunk sizing policy used by the query gateway.

use clap::{Parser, ValueEnum};

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Statement slot acquire timeout when the connect timeout is zero.
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Concurrent statements allowed on the live handle.
pub const DEFAULT_MAX_STATEMENTS: u32 = 4;

// Chunk sizing defaults
pub const DEFAULT_CHUNK_SIZE: u64 = 1000;
pub const DEFAULT_CHUNK_DIVISOR: u64 = 10;
pub const MAX_CHUNK_SIZE: u64 = 10000;

/// Chunk sizing policy for reads.
///
/// The chunk size starts at `base`, grows to `total_rows / divisor` for large
/// result sets, and is capped at `max`. `fixed` bypasses the computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    pub base: u64,
    pub divisor: u64,
    pub max: u64,
    pub fixed: Option<u64>,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_CHUNK_SIZE,
            divisor: DEFAULT_CHUNK_DIVISOR,
            max: MAX_CHUNK_SIZE,
            fixed: None,
        }
    }
}

impl ChunkPolicy {
    /// Policy that always uses the given chunk size.
    pub fn fixed(size: u64) -> Self {
        Self {
            fixed: Some(size),
            ..Self::default()
        }
    }

    /// Compute the chunk size for a result set of `total_rows` rows.
    pub fn chunk_size(&self, total_rows: u64) -> u64 {
        if let Some(size) = self.fixed {
            return size.max(1);
        }

        let mut size = self.base;
        let scaled = total_rows / self.divisor.max(1);
        if size < scaled {
            size = scaled;
        }
        size.min(self.max).max(1)
    }

    /// Validate the policy and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.base == 0 {
            return Err("chunk base size must be greater than 0".to_string());
        }
        if self.divisor == 0 {
            return Err("chunk divisor must be greater than 0".to_string());
        }
        if self.max < self.base {
            return Err(format!(
                "maximum chunk size ({}) cannot be smaller than the base size ({})",
                self.max, self.base
            ));
        }
        if self.fixed == Some(0) {
            return Err("fixed chunk size must be greater than 0".to_string());
        }
        Ok(())
    }
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

/// Configuration for the gateway server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "chunked-sql-gateway",
    about = "Chunked query gateway over a single SQL connection, exposed as MCP tools",
    version,
    author
)]
pub struct Config {
    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "GATEWAY_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "GATEWAY_HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "GATEWAY_HTTP_PORT")]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(long, default_value = DEFAULT_MCP_ENDPOINT, env = "GATEWAY_ENDPOINT")]
    pub mcp_endpoint: String,

    /// Address to connect to at startup (e.g. postgres://host:5432/db, sqlite:data.db)
    #[arg(long, value_name = "URL", env = "GATEWAY_ADDRESS")]
    pub address: Option<String>,

    /// Username for the startup connection
    #[arg(long, env = "GATEWAY_USERNAME", default_value = "")]
    pub username: String,

    /// Password for the startup connection
    #[arg(long, env = "GATEWAY_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Database name for the startup connection (overrides the address path)
    #[arg(long, env = "GATEWAY_DATABASE")]
    pub database: Option<String>,

    /// Connection timeout in seconds, used when a connect call does not give one
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "GATEWAY_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Maximum statements executed concurrently on the connection
    #[arg(long, default_value_t = DEFAULT_MAX_STATEMENTS, env = "GATEWAY_MAX_STATEMENTS")]
    pub max_statements: u32,

    /// Base chunk size for reads
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, env = "GATEWAY_CHUNK_SIZE")]
    pub chunk_size: u64,

    /// Divisor applied to the row count when growing the chunk size
    #[arg(long, default_value_t = DEFAULT_CHUNK_DIVISOR, env = "GATEWAY_CHUNK_DIVISOR")]
    pub chunk_divisor: u64,

    /// Upper bound on the chunk size
    #[arg(long, default_value_t = MAX_CHUNK_SIZE, env = "GATEWAY_MAX_CHUNK_SIZE")]
    pub max_chunk_size: u64,

    /// Use this chunk size for every read instead of computing one
    #[arg(long, env = "GATEWAY_FIXED_CHUNK_SIZE")]
    pub fixed_chunk_size: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "GATEWAY_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "GATEWAY_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            address: None,
            username: String::new(),
            password: String::new(),
            database: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_statements: DEFAULT_MAX_STATEMENTS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_divisor: DEFAULT_CHUNK_DIVISOR,
            max_chunk_size: MAX_CHUNK_SIZE,
            fixed_chunk_size: None,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Chunk policy assembled from the CLI flags.
    pub fn chunk_policy(&self) -> Result<ChunkPolicy, String> {
        let policy = ChunkPolicy {
            base: self.chunk_size,
            divisor: self.chunk_divisor,
            max: self.max_chunk_size,
            fixed: self.fixed_chunk_size,
        };
        policy.validate()?;
        Ok(policy)
    }
}
