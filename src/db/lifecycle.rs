//! Connection lifecycle management.
//!
//! [`ConnectionManager`] owns the single live session. It establishes the
//! session lazily or on demand, replaces it after connection loss, and
//! classifies errors as transient or fatal.
//!
//! All state sits behind one async mutex, so `ensure_connected` and
//! `reconnect_after` are safe check-then-act steps from any number of callers.

use crate::db::driver::{Driver, Session};
use crate::error::{DbError, DbResult, SQLSTATE_CONNECTION_DOES_NOT_EXIST};
use crate::models::{ConnectionConfig, ConnectionState, ConnectionStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// SQLSTATEs that mean the connection itself was lost.
///
/// Communication link failure, connection does not exist, connection failure,
/// and function sequence error on a closed connection.
pub const TRANSIENT_SQL_STATES: [&str; 4] = ["08S01", "08003", "08007", "HY010"];

/// Retry classification of an execution error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Resolved by reconnecting and retrying once.
    Transient,
    Fatal,
}

/// Classify an error by its SQLSTATE.
pub fn classify(error: &DbError) -> ErrorClass {
    match error.sql_state() {
        Some(state) if TRANSIENT_SQL_STATES.contains(&state) => ErrorClass::Transient,
        _ => ErrorClass::Fatal,
    }
}

struct Inner {
    config: Option<ConnectionConfig>,
    session: Option<Arc<dyn Session>>,
    state: ConnectionState,
    connected_at: Option<DateTime<Utc>>,
    established: u64,
}

/// Owner of the single live session.
pub struct ConnectionManager {
    driver: Arc<dyn Driver>,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager").finish_non_exhaustive()
    }
}

impl ConnectionManager {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            inner: Mutex::new(Inner {
                config: None,
                session: None,
                state: ConnectionState::Disconnected,
                connected_at: None,
                established: 0,
            }),
        }
    }

    /// Store `config` and force a fresh session.
    ///
    /// A prior session is discarded first; failures while closing it are logged
    /// and otherwise ignored.
    pub async fn connect(&self, config: ConnectionConfig) -> DbResult<()> {
        let mut inner = self.inner.lock().await;

        info!(
            address = %config.masked_address(),
            db_type = %config.db_type,
            timeout_secs = config.timeout_secs,
            "Connecting to database"
        );

        if let Some(previous) = inner.session.take() {
            discard(previous).await;
        }
        inner.config = Some(config);
        self.establish(&mut inner).await?;
        Ok(())
    }

    /// Return the live session, establishing one when there is none, the
    /// current one is closed, or `force` is set.
    pub async fn ensure_connected(&self, force: bool) -> DbResult<Arc<dyn Session>> {
        let mut inner = self.inner.lock().await;

        if !force {
            if let Some(session) = inner.session.as_ref().filter(|s| !s.is_closed()) {
                return Ok(Arc::clone(session));
            }
        }

        if let Some(previous) = inner.session.take() {
            discard(previous).await;
        }
        self.establish(&mut inner).await
    }

    /// Replace `failed` after connection loss.
    ///
    /// Only the failed session itself is torn down. When another caller has
    /// already replaced it, the newer session is returned untouched, so work
    /// still running on it is never interrupted.
    pub async fn reconnect_after(
        &self,
        failed: &Arc<dyn Session>,
    ) -> DbResult<Arc<dyn Session>> {
        let mut inner = self.inner.lock().await;

        if let Some(current) = inner.session.as_ref() {
            if !Arc::ptr_eq(current, failed) && !current.is_closed() {
                debug!("Connection already replaced by another operation");
                return Ok(Arc::clone(current));
            }
        }

        if let Some(previous) = inner.session.take() {
            discard(previous).await;
        }
        self.establish(&mut inner).await
    }

    /// Drop `failed` after it failed even following a reconnect.
    ///
    /// A newer session installed by another caller is left alone.
    pub async fn invalidate(&self, failed: &Arc<dyn Session>) {
        let mut inner = self.inner.lock().await;
        if !inner
            .session
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, failed))
        {
            return;
        }
        if let Some(session) = inner.session.take() {
            warn!("Discarding unusable connection");
            discard(session).await;
        }
        inner.state = ConnectionState::Disconnected;
        inner.connected_at = None;
    }

    /// Close the live session, if any. Idempotent.
    ///
    /// The configuration is kept, so the next operation reconnects lazily.
    pub async fn disconnect(&self) -> DbResult<()> {
        let mut inner = self.inner.lock().await;
        let session = inner.session.take();
        inner.state = ConnectionState::Disconnected;
        inner.connected_at = None;

        let Some(session) = session else {
            debug!("Disconnect requested with no live connection");
            return Ok(());
        };

        match session.close().await {
            Ok(()) => {
                info!("Disconnected from database");
                Ok(())
            }
            Err(e) if e.sql_state() == Some(SQLSTATE_CONNECTION_DOES_NOT_EXIST) => {
                debug!("Connection was already closed");
                Ok(())
            }
            Err(e) => Err(DbError::disconnect(e.message())),
        }
    }

    pub async fn status(&self) -> ConnectionStatus {
        let inner = self.inner.lock().await;
        ConnectionStatus {
            state: inner.state,
            address: inner.config.as_ref().map(ConnectionConfig::masked_address),
            database_type: inner.config.as_ref().map(|c| c.db_type),
            database: inner.config.as_ref().and_then(|c| c.database.clone()),
            connected_at: inner.connected_at,
            reconnects: inner.established.saturating_sub(1),
        }
    }

    /// The only path into `Connecting`.
    async fn establish(&self, inner: &mut Inner) -> DbResult<Arc<dyn Session>> {
        let Some(config) = inner.config.clone() else {
            return Err(DbError::NotConnected);
        };

        inner.state = ConnectionState::Connecting;
        match self.driver.connect(&config).await {
            Ok(session) => {
                inner.session = Some(Arc::clone(&session));
                inner.state = ConnectionState::Connected;
                inner.connected_at = Some(Utc::now());
                inner.established += 1;
                info!(
                    address = %config.masked_address(),
                    established = inner.established,
                    "Database connection established"
                );
                Ok(session)
            }
            Err(e) => {
                inner.state = ConnectionState::Disconnected;
                inner.connected_at = None;
                warn!(
                    address = %config.masked_address(),
                    error = %e,
                    "Failed to establish database connection"
                );
                Err(match e {
                    DbError::Connection { .. } => e,
                    other => {
                        let sql_state = other.sql_state().map(str::to_string);
                        DbError::connection(other.message(), sql_state)
                    }
                })
            }
        }
    }
}

async fn discard(session: Arc<dyn Session>) {
    if session.is_closed() {
        return;
    }
    if let Err(e) = session.close().await {
        warn!(error = %e, "Ignoring error while closing previous connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_transient_states() {
        for state in TRANSIENT_SQL_STATES {
            let err = DbError::database("lost", Some(state.to_string()));
            assert_eq!(classify(&err), ErrorClass::Transient, "{}", state);
        }
    }

    #[test]
    fn test_classify_everything_else_is_fatal() {
        let syntax = DbError::database("syntax error", Some("42000".to_string()));
        assert_eq!(classify(&syntax), ErrorClass::Fatal);

        let constraint = DbError::database("duplicate key", Some("23000".to_string()));
        assert_eq!(classify(&constraint), ErrorClass::Fatal);

        assert_eq!(classify(&DbError::database("no code", None)), ErrorClass::Fatal);
        assert_eq!(
            classify(&DbError::serialization("c", "bad value")),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn test_classify_connection_failure_family_only() {
        // 08001 (unable to connect) is not in the retry set
        let err = DbError::database("refused", Some("08001".to_string()));
        assert_eq!(classify(&err), ErrorClass::Fatal);
    }
}
