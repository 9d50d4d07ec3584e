//! Chunk serializer.
//!
//! Renders one [`ChunkTask`] into a [`ChunkFragment`]: opens a fresh cursor,
//! skips to the task's start row, and encodes at most `chunk_size` rows through
//! the value codec.

use crate::db::codec::EncodedRow;
use crate::db::driver::{RawRow, Session};
use crate::error::{DbError, DbResult};
use crate::models::{ChunkFragment, ChunkTask};
use futures_util::{StreamExt, TryStreamExt};
use std::time::Instant;
use tracing::debug;

/// Render one chunk.
///
/// The cursor is dropped on every exit path. On error the rows read so far
/// are discarded; retrying is the caller's job.
pub async fn render_chunk(session: &dyn Session, task: &ChunkTask) -> DbResult<ChunkFragment> {
    let start = Instant::now();
    let limit = usize::try_from(task.chunk_size).unwrap_or(usize::MAX);
    let mut cursor = session
        .open_cursor(&task.query, task.start_row)
        .take(limit);

    let mut fragment = ChunkFragment::new(task.start_row);
    while let Some(row) = cursor.try_next().await? {
        fragment.rows.push(encode_row(row)?);
    }

    debug!(
        start_row = task.start_row,
        rows = fragment.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Chunk rendered"
    );
    Ok(fragment)
}

/// Encode a raw row as a JSON object keyed by column label.
pub fn encode_row(row: RawRow) -> DbResult<String> {
    let RawRow { columns, cells } = row;
    let values = columns
        .iter()
        .zip(cells)
        .map(|(column, cell)| {
            cell.encode()
                .map_err(|e| DbError::serialization(column.name.clone(), e.to_string()))
        })
        .collect::<DbResult<Vec<_>>>()?;

    EncodedRow {
        columns: &columns,
        values: &values,
    }
    .to_json()
    .map_err(|e| DbError::serialization("<row>", e.to_string()))
}
