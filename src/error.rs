//! Error types for the chunked SQL gateway.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Every variant that originates in the database keeps the driver's SQLSTATE so that
//! the lifecycle manager can decide whether the failure is transient.

use crate::config::DEFAULT_ACQUIRE_TIMEOUT_SECS;
use thiserror::Error;

/// Fixed error code reported across the dispatch boundary.
pub const DATABASE_ERROR_CODE: &str = "DATABASE_ERROR";

/// SQLSTATE used for transport failures that carry no diagnostic code of their own
/// (communication link failure).
pub const SQLSTATE_LINK_FAILURE: &str = "08S01";

/// SQLSTATE used when the live handle no longer exists.
pub const SQLSTATE_CONNECTION_DOES_NOT_EXIST: &str = "08003";

/// SQLSTATE used when a connect attempt exceeds its timeout.
pub const SQLSTATE_TIMEOUT_EXPIRED: &str = "HYT00";

#[derive(Error, Debug)]
pub enum DbError {
    /// Connect or reconnect failed (unreachable server, bad credentials, timeout).
    #[error("Connection failed: {message}")]
    Connection {
        message: String,
        sql_state: Option<String>,
    },

    /// Raw execution error as reported by the driver, not yet classified.
    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "08S01" for a dropped link
        sql_state: Option<String>,
    },

    /// Transient connection-level failure; the gateway retries these once.
    #[error("Transient query error: {message}")]
    TransientQuery {
        message: String,
        sql_state: Option<String>,
    },

    /// Any execution error that is not retried.
    #[error("Query failed: {message}")]
    FatalQuery {
        message: String,
        sql_state: Option<String>,
    },

    #[error("Serialization error in column '{column}': {message}")]
    Serialization { column: String, message: String },

    #[error("Disconnect failed: {message}")]
    Disconnect { message: String },

    #[error("Not connected: call connect first")]
    NotConnected,

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with an optional SQL state.
    pub fn connection(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Connection {
            message: message.into(),
            sql_state,
        }
    }

    /// Create an unclassified database error.
    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    pub fn transient_query(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::TransientQuery {
            message: message.into(),
            sql_state,
        }
    }

    pub fn fatal_query(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::FatalQuery {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a serialization error for the named column.
    pub fn serialization(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn disconnect(message: impl Into<String>) -> Self {
        Self::Disconnect {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// SQLSTATE attached to this error, if the driver reported one.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Connection { sql_state, .. }
            | Self::Database { sql_state, .. }
            | Self::TransientQuery { sql_state, .. }
            | Self::FatalQuery { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// Fixed code used at the dispatch boundary.
    pub fn code(&self) -> &'static str {
        DATABASE_ERROR_CODE
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection_error",
            Self::Database { .. } => "database_error",
            Self::TransientQuery { .. } => "transient_query_error",
            Self::FatalQuery { .. } => "fatal_query_error",
            Self::Serialization { .. } => "serialization_error",
            Self::Disconnect { .. } => "disconnect_error",
            Self::NotConnected => "not_connected",
            Self::Timeout { .. } => "timeout",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Reclassify an execution error as one that will not be retried.
    ///
    /// Errors that already name a more specific failure (serialization, connection,
    /// timeout) keep their variant.
    pub fn into_fatal(self) -> Self {
        match self {
            Self::Database { message, sql_state }
            | Self::TransientQuery { message, sql_state } => Self::FatalQuery { message, sql_state },
            other => other,
        }
    }

    /// Reclassify an execution error as transient.
    pub fn into_transient(self) -> Self {
        match self {
            Self::Database { message, sql_state } | Self::FatalQuery { message, sql_state } => {
                Self::TransientQuery { message, sql_state }
            }
            other => other,
        }
    }

    /// Diagnostic message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Connection { message, .. }
            | Self::Database { message, .. }
            | Self::TransientQuery { message, .. }
            | Self::FatalQuery { message, .. }
            | Self::Disconnect { message }
            | Self::InvalidInput { message }
            | Self::Internal { message } => message.clone(),
            _ => self.to_string(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// Transport-level failures carry no SQLSTATE in sqlx, so they are tagged with the
/// link-failure / missing-connection codes the lifecycle manager understands.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(msg.to_string(), None),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => DbError::database("No rows returned", None),
            sqlx::Error::PoolTimedOut => DbError::timeout(
                "statement slot acquire",
                DEFAULT_ACQUIRE_TIMEOUT_SECS as u32,
            ),
            sqlx::Error::PoolClosed => DbError::database(
                "Connection is closed",
                Some(SQLSTATE_CONNECTION_DOES_NOT_EXIST.to_string()),
            ),
            sqlx::Error::Io(io_err) => DbError::database(
                format!("I/O error: {}", io_err),
                Some(SQLSTATE_LINK_FAILURE.to_string()),
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(format!("TLS error: {}", tls_err), None),
            sqlx::Error::Protocol(msg) => DbError::database(
                format!("Protocol error: {}", msg),
                Some(SQLSTATE_LINK_FAILURE.to_string()),
            ),
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::database(format!("Type not found: {}", type_name), None)
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::database(format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::serialization(format!("{}", index), source.to_string())
            }
            sqlx::Error::Decode(source) => DbError::serialization("?", source.to_string()),
            sqlx::Error::AnyDriverError(err) => {
                DbError::connection(format!("Driver error: {}", err), None)
            }
            sqlx::Error::WorkerCrashed => DbError::database(
                "Database worker crashed",
                Some(SQLSTATE_LINK_FAILURE.to_string()),
            ),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Structured error payload attached to MCP errors.
fn error_data(err: &DbError) -> serde_json::Value {
    serde_json::json!({
        "code": err.code(),
        "kind": err.kind(),
        "sqlState": err.sql_state(),
    })
}

/// Convert DbError to MCP ErrorData.
///
/// Every error crosses the boundary with the fixed `DATABASE_ERROR` code in `data`;
/// caller mistakes map to invalid_params, everything else to internal_error.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        let data = Some(error_data(&err));
        match &err {
            DbError::InvalidInput { .. } | DbError::NotConnected => {
                rmcp::ErrorData::invalid_params(err.message(), data)
            }
            DbError::FatalQuery {
                message,
                sql_state: Some(code),
            } => rmcp::ErrorData::internal_error(format!("{} (SQLSTATE: {})", message, code), data),
            _ => rmcp::ErrorData::internal_error(err.message(), data),
        }
    }
}
