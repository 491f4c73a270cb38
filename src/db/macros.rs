//! Database dispatch macro.
//!
//! Expands to a `match` over the [`DbPool`](crate::db::pool::DbPool) variants
//! so per-backend code paths read linearly at the call site.

/// Generate one match arm per `DbPool` variant.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(pool, {
///     MySql(p) => mysql::list_tables(p).await,
///     Postgres(p) => postgres::list_tables(p).await,
///     SQLite(p) => sqlite::list_tables(p).await,
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
