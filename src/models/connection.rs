//! Connection-related data models.

use crate::config::{DatabaseConfig, PoolOptions};
use serde::{Deserialize, Serialize};

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Configuration for the database connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub id: String,
    pub db_type: DatabaseType,
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub connection_string: String,
    /// Default: false for safety
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub pool_options: PoolOptions,
}

impl ConnectionConfig {
    pub fn new(
        id: impl Into<String>,
        connection_string: impl Into<String>,
        writable: bool,
        pool_options: PoolOptions,
    ) -> Result<Self, ConnectionConfigError> {
        let id = id.into();
        let connection_string = connection_string.into();

        if id.is_empty() {
            return Err(ConnectionConfigError::EmptyId);
        }
        if !id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(ConnectionConfigError::InvalidId(id));
        }

        let db_type = DatabaseType::from_connection_string(&connection_string)
            .ok_or_else(|| ConnectionConfigError::UnknownDatabaseType(scheme_of(&connection_string)))?;

        Ok(Self {
            id,
            db_type,
            connection_string,
            writable,
            pool_options,
        })
    }

    /// Build from a parsed `--database` argument.
    pub fn from_database_config(config: &DatabaseConfig) -> Result<Self, ConnectionConfigError> {
        Self::new(
            config.id.clone(),
            config.connection_string.clone(),
            config.writable,
            config.pool_options.clone(),
        )
    }
}

// Only the scheme goes into errors; the rest may carry credentials.
fn scheme_of(connection_string: &str) -> String {
    connection_string
        .split_once(':')
        .map(|(scheme, _)| scheme.to_string())
        .unwrap_or_default()
}

/// Errors that can occur when creating a connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionConfigError {
    #[error("Connection ID cannot be empty")]
    EmptyId,

    #[error("Connection ID contains invalid characters: {0}")]
    InvalidId(String),

    #[error("Unknown database type '{0}', expected mysql, postgres or sqlite")]
    UnknownDatabaseType(String),
}
