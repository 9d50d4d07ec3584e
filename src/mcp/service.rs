//! MCP service implementation using rmcp.
//!
//! This module defines the GatewayService struct exposing the gateway's
//! connect, get_data, write_data, disconnect, and status operations as
//! MCP tools.

use crate::config::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_STATEMENTS};
use crate::db::QueryGateway;
use crate::models::WriteResult;
use crate::tools::connection::{
    ConnectInput, ConnectOutput, ConnectionToolHandler, DisconnectOutput, StatusOutput,
};
use crate::tools::data::{DataToolHandler, GetDataOutput, StatementInput};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

/// Values applied to `connect` calls that leave them out.
#[derive(Debug, Clone, Copy)]
pub struct ConnectDefaults {
    pub timeout_secs: u64,
    pub max_statements: u32,
}

impl Default for ConnectDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_statements: DEFAULT_MAX_STATEMENTS,
        }
    }
}

#[derive(Clone)]
pub struct GatewayService {
    /// Shared gateway owning the single connection
    gateway: Arc<QueryGateway>,
    defaults: ConnectDefaults,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl GatewayService {
    pub fn new(gateway: Arc<QueryGateway>, defaults: ConnectDefaults) -> Self {
        Self {
            gateway,
            defaults,
            tool_router: Self::tool_router(),
        }
    }

    fn connection_handler(&self) -> ConnectionToolHandler {
        ConnectionToolHandler::new(
            self.gateway.clone(),
            self.defaults.timeout_secs,
            self.defaults.max_statements,
        )
    }

    fn data_handler(&self) -> DataToolHandler {
        DataToolHandler::new(self.gateway.clone())
    }
}

#[tool_router]
impl GatewayService {
    #[tool(
        description = "Connect to a database, replacing any existing connection.\nAddress forms: postgres://host:5432/db, mysql://host:3306/db, sqlite:path.db.\nCredentials are passed separately from the address."
    )]
    async fn connect(
        &self,
        Parameters(input): Parameters<ConnectInput>,
    ) -> Result<Json<ConnectOutput>, McpError> {
        self.connection_handler()
            .connect(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Run a read query and return all rows.\nRows are returned as `fragments`: each fragment is a JSON array of row objects, in result order.\nConcatenate the arrays to get the full result.\nReconnects once automatically if the connection was lost."
    )]
    async fn get_data(
        &self,
        Parameters(input): Parameters<StatementInput>,
    ) -> Result<Json<GetDataOutput>, McpError> {
        self.data_handler()
            .get_data(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Execute a data-modifying statement (INSERT, UPDATE, DELETE, DDL).\nReturns {\"affectedRows\": n}.\nReconnects once automatically if the connection was lost."
    )]
    async fn write_data(
        &self,
        Parameters(input): Parameters<StatementInput>,
    ) -> Result<Json<WriteResult>, McpError> {
        self.data_handler()
            .write_data(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "Close the current connection. Safe to call when not connected.")]
    async fn disconnect(&self) -> Result<Json<DisconnectOutput>, McpError> {
        self.connection_handler()
            .disconnect()
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "Report the connection state, address, and reconnect count.")]
    async fn status(&self) -> Json<StatusOutput> {
        Json(self.connection_handler().status().await)
    }
}

#[tool_handler]
impl ServerHandler for GatewayService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "chunked-sql-gateway".to_owned(),
                title: Some("Chunked SQL Gateway".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Query gateway over a single SQL connection.\n\
                \n\
                ## Workflow\n\
                1. Call `connect` with the database address and credentials\n\
                2. Use `get_data` for queries that return rows\n\
                3. Use `write_data` for statements that modify data\n\
                4. Call `disconnect` when done\n\
                \n\
                ## Results\n\
                `get_data` returns `fragments`, a list of JSON array strings.\n\
                Each fragment holds consecutive rows; concatenating them in order\n\
                gives the complete result. Large results are split into chunks\n\
                that run concurrently.\n\
                \n\
                ## Values\n\
                - DECIMAL/NUMERIC: exact JSON numbers\n\
                - Binary: base64 strings\n\
                - NULL: JSON null\n\
                \n\
                ## Notes\n\
                Queries run more than once (a count pass plus one pass per chunk),\n\
                so they must return the same rows each time."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkPolicy;
    use crate::db::SqlxDriver;

    fn create_test_service() -> GatewayService {
        let gateway = Arc::new(QueryGateway::new(
            Arc::new(SqlxDriver::new()),
            ChunkPolicy::default(),
        ));
        GatewayService::new(gateway, ConnectDefaults::default())
    }

    #[test]
    fn test_gateway_service_creation() {
        let service = create_test_service();
        assert_eq!(service.defaults.max_statements, DEFAULT_MAX_STATEMENTS);
    }

    #[test]
    fn test_server_info() {
        let service = create_test_service();
        let info = service.get_info();
        assert_eq!(info.server_info.name, "chunked-sql-gateway");
        assert!(info.capabilities.tools.is_some());
    }

    #[test]
    fn test_tool_router_lists_gateway_tools() {
        let service = create_test_service();
        let mut names: Vec<String> = service
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["connect", "disconnect", "get_data", "status", "write_data"]
        );
    }
}
