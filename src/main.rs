//! Chunked SQL Gateway - Main entry point.
//!
//! Serves chunked, concurrent query execution over one SQL connection
//! (SQLite, PostgreSQL, MySQL) as MCP tools.

use chunked_sql_gateway::config::{Config, TransportMode};
use chunked_sql_gateway::db::{QueryGateway, SqlxDriver};
use chunked_sql_gateway::mcp::ConnectDefaults;
use chunked_sql_gateway::models::ConnectionConfig;
use chunked_sql_gateway::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber. Output goes to stderr because stdout
/// carries the stdio protocol.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();

    init_tracing(&config);

    let policy = match config.chunk_policy() {
        Ok(policy) => policy,
        Err(e) => {
            eprintln!("Error: invalid chunk settings: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        transport = %config.transport,
        max_statements = config.max_statements,
        "Starting Chunked SQL Gateway v{}",
        env!("CARGO_PKG_VERSION")
    );

    let gateway = Arc::new(QueryGateway::new(Arc::new(SqlxDriver::new()), policy));
    let defaults = ConnectDefaults {
        timeout_secs: config.connect_timeout,
        max_statements: config.max_statements,
    };

    // Optional startup connection; clients can still call `connect` later
    if let Some(address) = &config.address {
        let conn_config = ConnectionConfig::new(
            address.clone(),
            config.username.clone(),
            config.password.clone(),
            config.connect_timeout,
        )?
        .with_database(config.database.clone())
        .with_max_statements(config.max_statements);

        info!(address = %conn_config.masked_address(), "Connecting at startup");
        if let Err(e) = gateway.connect(conn_config).await {
            // The configuration is kept; the first operation retries the connect
            warn!(error = %e, "Startup connection failed");
        }
    }

    let result = match config.transport {
        TransportMode::Stdio => {
            let transport = StdioTransport::new(gateway, defaults);
            transport.run().await
        }
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            let transport = HttpTransport::new(
                gateway,
                defaults,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            );
            transport.run().await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
