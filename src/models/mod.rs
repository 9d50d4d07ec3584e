//! Data models for the chunked SQL gateway.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{
    ConnectionConfig, ConnectionConfigError, ConnectionState, ConnectionStatus, DatabaseType,
};
pub use query::{ChunkFragment, ChunkTask, ReadResult, WriteResult};
