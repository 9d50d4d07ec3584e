//! Chunked SQL Gateway Library
//!
//! Runs read queries as concurrent, ordered chunks and write statements with
//! one automatic reconnect, all over a single SQL connection, and exposes
//! both as MCP tools.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::{ChunkPolicy, Config};
pub use db::QueryGateway;
pub use error::{DbError, DbResult};
pub use mcp::GatewayService;
