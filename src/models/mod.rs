//! Data models shared by the database layer and the tools.

pub mod connection;
pub mod query;
pub mod schema;

pub use connection::{ConnectionConfig, ConnectionConfigError, DatabaseType};
pub use query::{ColumnMetadata, InvalidKind, QueryResult, ValidationOutcome};
pub use schema::{ColumnDefinition, ForeignKey, SampleRows, TableDescriptor, TableSchema};
