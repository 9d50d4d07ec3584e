//! Connection tools.
//!
//! This module implements the `connect`, `disconnect`, and `status` MCP tools.

use crate::db::QueryGateway;
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, ConnectionState, DatabaseType};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Input for the connect tool.
#[derive(Clone, Deserialize, JsonSchema)]
pub struct ConnectInput {
    /// Database address, e.g. postgres://host:5432/app, mysql://host:3306/app, sqlite:data.db
    pub address: String,
    /// Username (ignored for SQLite)
    #[serde(default)]
    pub username: String,
    /// Password (ignored for SQLite)
    #[serde(default)]
    pub password: String,
    /// Connect timeout in seconds, also bounding the wait for a statement slot.
    /// 0 connects without limit and waits up to 30s for a slot. Default: server setting
    #[serde(default, alias = "timeoutInSeconds")]
    pub timeout_in_seconds: Option<u64>,
    /// Database to use instead of the one in the address
    #[serde(default, alias = "databaseName")]
    pub database: Option<String>,
}

impl std::fmt::Debug for ConnectInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectInput")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("timeout_in_seconds", &self.timeout_in_seconds)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

/// Output from the connect tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ConnectOutput {
    pub connected: bool,
    /// Address with the password masked
    pub address: String,
    pub database_type: DatabaseType,
}

/// Output from the disconnect tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DisconnectOutput {
    pub disconnected: bool,
}

/// Output from the status tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct StatusOutput {
    /// disconnected, connecting, or connected
    pub state: ConnectionState,
    /// Address of the current configuration, password masked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_type: Option<DatabaseType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// RFC 3339 time the live connection was established
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<String>,
    /// Connections established after the first one
    pub reconnects: u64,
}

pub struct ConnectionToolHandler {
    gateway: Arc<QueryGateway>,
    default_timeout_secs: u64,
    max_statements: u32,
}

impl ConnectionToolHandler {
    pub fn new(gateway: Arc<QueryGateway>, default_timeout_secs: u64, max_statements: u32) -> Self {
        Self {
            gateway,
            default_timeout_secs,
            max_statements,
        }
    }

    pub async fn connect(&self, input: ConnectInput) -> DbResult<ConnectOutput> {
        let timeout = input.timeout_in_seconds.unwrap_or(self.default_timeout_secs);
        let config = ConnectionConfig::new(input.address, input.username, input.password, timeout)
            .map_err(|e| DbError::invalid_input(e.to_string()))?
            .with_database(input.database)
            .with_max_statements(self.max_statements);

        let address = config.masked_address();
        let database_type = config.db_type;
        self.gateway.connect(config).await?;

        Ok(ConnectOutput {
            connected: true,
            address,
            database_type,
        })
    }

    pub async fn disconnect(&self) -> DbResult<DisconnectOutput> {
        self.gateway.disconnect().await?;
        Ok(DisconnectOutput { disconnected: true })
    }

    pub async fn status(&self) -> StatusOutput {
        let status = self.gateway.status().await;
        info!(state = %status.state, reconnects = status.reconnects, "Status requested");
        StatusOutput {
            state: status.state,
            address: status.address,
            database_type: status.database_type,
            database: status.database,
            connected_at: status.connected_at.map(|t| t.to_rfc3339()),
            reconnects: status.reconnects,
        }
    }
}
