//! Query gateway.
//!
//! Orchestrates reads and writes over the single live session:
//! - `read` counts the rows, sizes the chunks, renders them concurrently, and
//!   returns the fragments in offset order
//! - `write` executes one statement and returns the affected-row count
//!
//! Both paths share one bounded retry: a transient failure replaces the failed
//! session and allows exactly one more attempt.
//!
//! # Known costs
//!
//! A read executes its query once to count rows and once more per chunk. The
//! query must be deterministic and free of side effects for the chunks to line
//! up with the count.

use crate::config::ChunkPolicy;
use crate::db::driver::{Driver, Session};
use crate::db::lifecycle::{ConnectionManager, ErrorClass, classify};
use crate::db::serializer::render_chunk;
use crate::error::{DbError, DbResult};
use crate::models::{
    ChunkFragment, ChunkTask, ConnectionConfig, ConnectionStatus, ReadResult, WriteResult,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

type ChunkOutcome = (usize, DbResult<ChunkFragment>);

/// Chunked query gateway over one connection.
#[derive(Debug)]
pub struct QueryGateway {
    connection: ConnectionManager,
    policy: ChunkPolicy,
}

impl QueryGateway {
    pub fn new(driver: Arc<dyn Driver>, policy: ChunkPolicy) -> Self {
        Self {
            connection: ConnectionManager::new(driver),
            policy,
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn policy(&self) -> ChunkPolicy {
        self.policy
    }

    pub async fn connect(&self, config: ConnectionConfig) -> DbResult<()> {
        self.connection.connect(config).await
    }

    pub async fn disconnect(&self) -> DbResult<()> {
        self.connection.disconnect().await
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.connection.status().await
    }

    /// Run a read query and return its rows as ordered fragments.
    pub async fn read(&self, query: &str) -> DbResult<ReadResult> {
        let start = Instant::now();
        let result = self
            .with_retry("read", |session| self.read_once(session, query))
            .await?;

        info!(
            total_rows = result.total_rows,
            chunk_size = result.chunk_size,
            chunks = result.fragments.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Read completed"
        );
        Ok(result)
    }

    /// Run a write statement and return the affected-row count.
    pub async fn write(&self, query: &str) -> DbResult<WriteResult> {
        let start = Instant::now();
        let affected_rows = self
            .with_retry("write", |session| async move { session.execute(query).await })
            .await?;

        info!(
            affected_rows,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Write completed"
        );
        Ok(WriteResult { affected_rows })
    }

    /// Run `attempt` against the live session, retrying once on a replacement
    /// session when it fails transiently.
    ///
    /// Errors leave as their fatal form: a second transient failure becomes a
    /// [`DbError::FatalQuery`] and the session is discarded.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> DbResult<T>
    where
        F: FnMut(Arc<dyn Session>) -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let mut session = self.connection.ensure_connected(false).await?;
        let mut retried = false;

        loop {
            let err = match attempt(Arc::clone(&session)).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let err = match classify(&err) {
                ErrorClass::Transient => err.into_transient(),
                ErrorClass::Fatal => err.into_fatal(),
            };

            match err {
                DbError::TransientQuery { .. } if !retried => {
                    warn!(
                        operation,
                        sql_state = err.sql_state().unwrap_or_default(),
                        error = %err,
                        "Connection lost, reconnecting and retrying"
                    );
                    retried = true;
                    session = self.connection.reconnect_after(&session).await?;
                }
                DbError::TransientQuery { .. } => {
                    error!(operation, error = %err, "Retry failed after reconnect");
                    self.connection.invalidate(&session).await;
                    return Err(err.into_fatal());
                }
                err => {
                    error!(operation, error = %err, "Operation failed");
                    return Err(err);
                }
            }
        }
    }

    /// One full read attempt. Every spawned chunk task is joined before this
    /// returns, on success and on error.
    async fn read_once(&self, session: Arc<dyn Session>, query: &str) -> DbResult<ReadResult> {
        let total_rows = session.count_rows(query).await?;
        let chunk_size = self.policy.chunk_size(total_rows);
        let offsets = chunk_offsets(total_rows, chunk_size);
        let concurrency = session.statement_slots();

        debug!(
            total_rows,
            chunk_size,
            chunks = offsets.len(),
            concurrency,
            "Dispatching chunks"
        );

        let mut fragments: Vec<Option<ChunkFragment>> = vec![None; offsets.len()];
        let mut pending = offsets.iter().copied().enumerate();
        let mut tasks: JoinSet<ChunkOutcome> = JoinSet::new();
        // (offset, error) of the earliest failed chunk
        let mut failure: Option<(u64, DbError)> = None;

        for (index, offset) in pending.by_ref().take(concurrency.max(1)) {
            spawn_chunk(&mut tasks, &session, ChunkTask::new(query, offset, chunk_size), index);
        }

        while let Some(joined) = tasks.join_next().await {
            let (offset, outcome) = match joined {
                Ok((index, outcome)) => (offsets[index], outcome.map(|f| (index, f))),
                Err(e) => (
                    u64::MAX,
                    Err(DbError::internal(format!("Chunk task failed: {}", e))),
                ),
            };

            match outcome {
                Ok((index, fragment)) => fragments[index] = Some(fragment),
                Err(err) => {
                    if failure.as_ref().is_none_or(|(first, _)| offset < *first) {
                        failure = Some((offset, err));
                    }
                }
            }

            // No new chunks once one has failed; the rest just settle
            if failure.is_none() {
                if let Some((index, offset)) = pending.next() {
                    spawn_chunk(&mut tasks, &session, ChunkTask::new(query, offset, chunk_size), index);
                }
            }
        }

        if let Some((_, err)) = failure {
            return Err(err);
        }

        let fragments = fragments
            .into_iter()
            .map(|f| f.ok_or_else(|| DbError::internal("Chunk result missing")))
            .collect::<DbResult<Vec<_>>>()?;

        Ok(ReadResult {
            total_rows,
            chunk_size,
            fragments,
        })
    }
}

fn spawn_chunk(
    tasks: &mut JoinSet<ChunkOutcome>,
    session: &Arc<dyn Session>,
    task: ChunkTask,
    index: usize,
) {
    let session = Arc::clone(session);
    tasks.spawn(async move { (index, render_chunk(session.as_ref(), &task).await) });
}

/// Start offsets for a result of `total_rows` rows.
///
/// Steps from 0 through `total_rows` inclusive, so an exact multiple of the
/// chunk size ends with an empty chunk and an empty result still yields one.
pub fn chunk_offsets(total_rows: u64, chunk_size: u64) -> Vec<u64> {
    let step = usize::try_from(chunk_size.max(1)).unwrap_or(usize::MAX);
    (0..=total_rows).step_by(step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_offsets_partial_last_chunk() {
        assert_eq!(chunk_offsets(12, 5), vec![0, 5, 10]);
    }

    #[test]
    fn test_chunk_offsets_empty_result() {
        assert_eq!(chunk_offsets(0, 1000), vec![0]);
    }

    #[test]
    fn test_chunk_offsets_exact_multiple_includes_end() {
        assert_eq!(chunk_offsets(10, 5), vec![0, 5, 10]);
    }

    #[test]
    fn test_chunk_offsets_cover_every_row() {
        for total in [1u64, 999, 1000, 1001, 25_000] {
            let chunk = ChunkPolicy::default().chunk_size(total);
            let offsets = chunk_offsets(total, chunk);
            assert_eq!(offsets[0], 0);
            assert!(offsets.windows(2).all(|w| w[1] - w[0] == chunk));
            assert!(*offsets.last().unwrap() + chunk > total);
        }
    }
}
