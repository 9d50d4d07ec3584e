//! Backend dispatch macro.
//!
//! Expands one arm per `DbPool` variant so each arm sees the concrete sqlx pool
//! type.

/// Macro for generating database dispatch match arms.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(&self.pool, {
///     MySql(p) => count(p.fetch(sql)).await,
///     Postgres(p) => count(p.fetch(sql)).await,
///     SQLite(p) => count(p.fetch(sql)).await,
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($pool:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $pool {
            $(
                $crate::db::pool::DbPool::$variant($p) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;
