//! sqlx-backed driver.
//!
//! The live handle is a database-specific sqlx pool (MySqlPool, PgPool,
//! SqlitePool) bounded to `max_statements` connections. sqlx connections run one
//! statement at a time, so this bounded pool is what lets several chunk cursors
//! run concurrently behind a single logical session.

use crate::db::codec::ColumnDescriptor;
use crate::db::driver::{Driver, RawRow, RowCursor, Session};
use crate::db::types::{DecodeRow, describe};
use crate::error::{DbError, DbResult, SQLSTATE_TIMEOUT_EXPIRED};
use crate::models::{ConnectionConfig, DatabaseType};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt, future};
use sqlx::{
    Executor, MySqlPool, PgPool, SqlitePool, mysql::MySqlConnectOptions, mysql::MySqlPoolOptions,
    postgres::PgConnectOptions, postgres::PgPoolOptions, sqlite::SqliteConnectOptions,
    sqlite::SqlitePoolOptions,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Database-specific connection pool (avoids AnyPool limitations).
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    SQLite(SqlitePool),
}

impl DbPool {
    /// Close the connection pool.
    pub async fn close(&self) {
        impl_db_dispatch!(self, {
            MySql(pool) => pool.close().await,
            Postgres(pool) => pool.close().await,
            SQLite(pool) => pool.close().await,
        })
    }

    /// Upper bound on connections the pool will open.
    pub fn max_connections(&self) -> u32 {
        impl_db_dispatch!(self, {
            MySql(pool) => pool.options().get_max_connections(),
            Postgres(pool) => pool.options().get_max_connections(),
            SQLite(pool) => pool.options().get_max_connections(),
        })
    }

    pub fn is_closed(&self) -> bool {
        impl_db_dispatch!(self, {
            MySql(pool) => pool.is_closed(),
            Postgres(pool) => pool.is_closed(),
            SQLite(pool) => pool.is_closed(),
        })
    }

    /// Get the database type for this pool.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbPool::MySql(_) => DatabaseType::MySQL,
            DbPool::Postgres(_) => DatabaseType::PostgreSQL,
            DbPool::SQLite(_) => DatabaseType::SQLite,
        }
    }
}

/// Connect primitive backed by sqlx.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxDriver;

impl SqlxDriver {
    pub fn new() -> Self {
        Self
    }

    async fn create_pool(&self, config: &ConnectionConfig) -> DbResult<DbPool> {
        let url = config
            .connection_url()
            .map_err(|e| DbError::connection(e.to_string(), None))?;
        let acquire_timeout = config.acquire_timeout();
        let max_connections = max_connections(config);

        match config.db_type {
            DatabaseType::MySQL => {
                let options = MySqlConnectOptions::from_str(&url)
                    .map_err(|e| invalid_address(config.db_type, e))?
                    .charset("utf8mb4");

                let pool = MySqlPoolOptions::new()
                    .min_connections(1)
                    .max_connections(max_connections)
                    .acquire_timeout(acquire_timeout)
                    .test_before_acquire(true)
                    .connect_with(options)
                    .await
                    .map_err(|e| connect_error(config.db_type, e, acquire_timeout))?;
                Ok(DbPool::MySql(pool))
            }
            DatabaseType::PostgreSQL => {
                let options = PgConnectOptions::from_str(&url)
                    .map_err(|e| invalid_address(config.db_type, e))?;

                let pool = PgPoolOptions::new()
                    .min_connections(1)
                    .max_connections(max_connections)
                    .acquire_timeout(acquire_timeout)
                    .test_before_acquire(true)
                    .connect_with(options)
                    .await
                    .map_err(|e| connect_error(config.db_type, e, acquire_timeout))?;
                Ok(DbPool::Postgres(pool))
            }
            DatabaseType::SQLite => {
                let options = SqliteConnectOptions::from_str(&url)
                    .map_err(|e| invalid_address(config.db_type, e))?;

                let pool = SqlitePoolOptions::new()
                    .min_connections(1)
                    .max_connections(max_connections)
                    .acquire_timeout(acquire_timeout)
                    .test_before_acquire(true)
                    .connect_with(options)
                    .await
                    .map_err(|e| connect_error(config.db_type, e, acquire_timeout))?;
                Ok(DbPool::SQLite(pool))
            }
        }
    }
}

#[async_trait]
impl Driver for SqlxDriver {
    async fn connect(&self, config: &ConnectionConfig) -> DbResult<Arc<dyn Session>> {
        let pool = match config.timeout() {
            Some(limit) => tokio::time::timeout(limit, self.create_pool(config))
                .await
                .map_err(|_| {
                    DbError::connection(
                        format!("Connect timed out after {}s", limit.as_secs()),
                        Some(SQLSTATE_TIMEOUT_EXPIRED.to_string()),
                    )
                })??,
            None => self.create_pool(config).await?,
        };

        debug!(
            address = %config.masked_address(),
            db_type = %pool.db_type(),
            max_statements = pool.max_connections(),
            "Session established"
        );

        Ok(Arc::new(SqlxSession {
            pool,
            acquire_timeout: config.acquire_timeout(),
        }))
    }
}

/// Every connection of a `:memory:` SQLite pool would see its own database.
fn max_connections(config: &ConnectionConfig) -> u32 {
    let in_memory = config.address.contains(":memory:") || config.address.contains("mode=memory");
    if config.db_type == DatabaseType::SQLite && in_memory {
        1
    } else {
        config.max_statements.max(1)
    }
}

fn invalid_address(db_type: DatabaseType, error: sqlx::Error) -> DbError {
    DbError::connection(
        format!(
            "Invalid {} address: {}. {}",
            db_type,
            error,
            address_hint(db_type)
        ),
        None,
    )
}

/// Keep the driver's SQLSTATE and add a hint for the usual causes.
fn connect_error(
    db_type: DatabaseType,
    error: sqlx::Error,
    acquire_timeout: Duration,
) -> DbError {
    let suggestion = connection_suggestion(db_type, &error);
    let converted = session_error(error, acquire_timeout);
    let sql_state = converted.sql_state().map(str::to_string);
    DbError::connection(
        format!("Failed to connect: {}. {}", converted.message(), suggestion),
        sql_state,
    )
}

fn connection_suggestion(db_type: DatabaseType, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            db_type
        );
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify the username and password".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    address_hint(db_type).to_string()
}

fn address_hint(db_type: DatabaseType) -> &'static str {
    match db_type {
        DatabaseType::PostgreSQL => "Verify the address format: postgres://host:5432/db",
        DatabaseType::MySQL => "Verify the address format: mysql://host:3306/db",
        DatabaseType::SQLite => {
            "Verify the file path exists and is accessible: sqlite:path/to/db.sqlite"
        }
    }
}

/// Convert a sqlx error, reporting slot waits against the configured limit.
fn session_error(error: sqlx::Error, acquire_timeout: Duration) -> DbError {
    match error {
        sqlx::Error::PoolTimedOut => DbError::timeout(
            "statement slot acquire",
            u32::try_from(acquire_timeout.as_secs()).unwrap_or(u32::MAX),
        ),
        other => DbError::from(other),
    }
}

/// Live handle over a bounded sqlx pool.
#[derive(Debug)]
pub struct SqlxSession {
    pool: DbPool,
    acquire_timeout: Duration,
}

#[async_trait]
impl Session for SqlxSession {
    async fn count_rows(&self, sql: &str) -> DbResult<u64> {
        // Rows are streamed and dropped, never collected
        impl_db_dispatch!(&self.pool, {
            MySql(p) => count(p.fetch(sql), self.acquire_timeout).await,
            Postgres(p) => count(p.fetch(sql), self.acquire_timeout).await,
            SQLite(p) => count(p.fetch(sql), self.acquire_timeout).await,
        })
    }

    fn open_cursor<'a>(&'a self, sql: &'a str, start_row: u64) -> RowCursor<'a> {
        let db_type = self.pool.db_type();
        let acquire_timeout = self.acquire_timeout;
        impl_db_dispatch!(&self.pool, {
            MySql(p) => cursor(p.fetch(sql), start_row, db_type, acquire_timeout),
            Postgres(p) => cursor(p.fetch(sql), start_row, db_type, acquire_timeout),
            SQLite(p) => cursor(p.fetch(sql), start_row, db_type, acquire_timeout),
        })
    }

    async fn execute(&self, sql: &str) -> DbResult<u64> {
        let result = impl_db_dispatch!(&self.pool, {
            MySql(p) => sqlx::query(sql).execute(p).await.map(|r| r.rows_affected()),
            Postgres(p) => sqlx::query(sql).execute(p).await.map(|r| r.rows_affected()),
            SQLite(p) => sqlx::query(sql).execute(p).await.map(|r| r.rows_affected()),
        });
        result.map_err(|e| session_error(e, self.acquire_timeout))
    }

    fn statement_slots(&self) -> usize {
        self.pool.max_connections().max(1) as usize
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    async fn close(&self) -> DbResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

async fn count<R>(
    rows: BoxStream<'_, Result<R, sqlx::Error>>,
    acquire_timeout: Duration,
) -> DbResult<u64> {
    rows.map_err(|e| session_error(e, acquire_timeout))
        .try_fold(0u64, |n, _| future::ready(Ok(n + 1)))
        .await
}

/// Skip `start_row` rows without decoding them, then decode the rest.
fn cursor<'a, R>(
    rows: BoxStream<'a, Result<R, sqlx::Error>>,
    start_row: u64,
    db_type: DatabaseType,
    acquire_timeout: Duration,
) -> RowCursor<'a>
where
    R: DecodeRow + Send + 'a,
{
    let mut position = 0u64;
    let mut columns: Option<Arc<[ColumnDescriptor]>> = None;

    rows.map_err(move |e| session_error(e, acquire_timeout))
        .try_filter(move |_| {
            let keep = position >= start_row;
            position += 1;
            future::ready(keep)
        })
        .and_then(move |row| {
            let columns = Arc::clone(columns.get_or_insert_with(|| describe(&row, db_type).into()));
            future::ready(row.decode_cells(&columns).map(|cells| RawRow { columns, cells }))
        })
        .boxed()
}
