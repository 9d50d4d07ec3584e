//! MCP tool implementations.
//!
//! - `connection`: connect, disconnect, status
//! - `data`: get_data (chunked read), write_data

pub mod connection;
pub mod data;

pub use connection::{
    ConnectInput, ConnectOutput, ConnectionToolHandler, DisconnectOutput, StatusOutput,
};
pub use data::{DataToolHandler, GetDataOutput, StatementInput};
