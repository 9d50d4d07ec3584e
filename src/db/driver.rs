//! Driver traits.
//!
//! Core abstractions the gateway runs against:
//! - Driver: the connect primitive
//! - Session: one live handle that can count, stream, and execute statements
//!
//! [`crate::db::pool::SqlxDriver`] is the production implementation.

use crate::db::codec::{ColumnDescriptor, RawCell};
use crate::error::DbResult;
use crate::models::ConnectionConfig;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::fmt;
use std::sync::Arc;

/// One result row, read but not yet encoded.
#[derive(Debug, Clone)]
pub struct RawRow {
    /// Shared by every row of the same cursor.
    pub columns: Arc<[ColumnDescriptor]>,
    pub cells: Vec<RawCell>,
}

/// Forward-only cursor positioned at a start row.
///
/// Dropping the stream releases the statement and whatever the session
/// reserved for it.
pub type RowCursor<'a> = BoxStream<'a, DbResult<RawRow>>;

/// Opens live sessions.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Establish a new session. Fails with [`crate::error::DbError::Connection`].
    async fn connect(&self, config: &ConnectionConfig) -> DbResult<Arc<dyn Session>>;
}

/// A live database handle.
///
/// Concurrent calls must be safe: each cursor runs on its own statement.
#[async_trait]
pub trait Session: Send + Sync + fmt::Debug {
    /// Execute `sql` and count the rows it returns.
    async fn count_rows(&self, sql: &str) -> DbResult<u64>;

    /// Execute `sql` and stream its rows, skipping the first `start_row`.
    fn open_cursor<'a>(&'a self, sql: &'a str, start_row: u64) -> RowCursor<'a>;

    /// Execute a statement and return the affected-row count.
    async fn execute(&self, sql: &str) -> DbResult<u64>;

    /// Statements that can run at once without waiting for a slot.
    fn statement_slots(&self) -> usize;

    fn is_closed(&self) -> bool;

    async fn close(&self) -> DbResult<()>;
}
