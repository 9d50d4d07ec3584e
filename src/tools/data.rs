//! Data tools.
//!
//! This module implements the `get_data` and `write_data` MCP tools.

use crate::db::QueryGateway;
use crate::error::{DbError, DbResult};
use crate::models::WriteResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Input for the get_data and write_data tools.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct StatementInput {
    /// SQL statement to run
    pub query: String,
}

impl StatementInput {
    fn validated(&self) -> DbResult<&str> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(DbError::invalid_input("query cannot be empty"));
        }
        Ok(query)
    }
}

/// Output from the get_data tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GetDataOutput {
    /// One JSON array of row objects per chunk, in result order
    pub fragments: Vec<String>,
}

pub struct DataToolHandler {
    gateway: Arc<QueryGateway>,
}

impl DataToolHandler {
    pub fn new(gateway: Arc<QueryGateway>) -> Self {
        Self { gateway }
    }

    pub async fn get_data(&self, input: StatementInput) -> DbResult<GetDataOutput> {
        let result = self.gateway.read(input.validated()?).await?;
        Ok(GetDataOutput {
            fragments: result.into_json_fragments(),
        })
    }

    pub async fn write_data(&self, input: StatementInput) -> DbResult<WriteResult> {
        self.gateway.write(input.validated()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_input_rejects_blank_query() {
        let input: StatementInput = serde_json::from_str(r#"{"query": "   "}"#).unwrap();
        assert!(matches!(
            input.validated(),
            Err(DbError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_statement_input_trims_query() {
        let input: StatementInput = serde_json::from_str(r#"{"query": " SELECT 1 \n"}"#).unwrap();
        assert_eq!(input.validated().unwrap(), "SELECT 1");
    }
}
