//! Database access layer.
//!
//! - Connection pool management
//! - Schema introspection
//! - Query execution and dry-run validation
//! - Statement classification for read-only connections
//! - Row decoding
//! - Database dispatch macro for reducing code duplication

#[macro_use]
pub mod macros;
pub mod executor;
pub mod pool;
pub mod schema;
pub mod statement;
pub mod types;
pub mod validator;

pub use executor::QueryExecutor;
pub use pool::DbPool;
pub use schema::SchemaIntrospector;
pub use statement::StatementKind;
pub use validator::QueryValidator;
