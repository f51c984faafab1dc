use std::fmt;

use thiserror::Error;

use crate::types::SqlValue;

/// Which layer a [`DatabaseError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseErrorKind {
    /// Opening, checking out, or closing a pooled connection failed.
    ConnectionPool,
    /// The server rejected a statement.
    Query,
}

impl DatabaseErrorKind {
    /// Stable name of the kind, as reported to callers.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DatabaseErrorKind::ConnectionPool => "ConnectionPoolError",
            DatabaseErrorKind::Query => "QueryError",
        }
    }
}

impl fmt::Display for DatabaseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure reported by a driver, either while managing a connection or running a statement.
///
/// `code` carries the engine's own error code when there is one (a Postgres SQLSTATE such as
/// `42P01`, or the MySQL SQLSTATE).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct DatabaseError {
    pub code: Option<String>,
    pub kind: DatabaseErrorKind,
    pub message: String,
}

impl DatabaseError {
    /// Connection-level failure (connect, checkout, disconnect).
    pub fn connection_pool(message: impl Into<String>) -> Self {
        Self {
            code: None,
            kind: DatabaseErrorKind::ConnectionPool,
            message: message.into(),
        }
    }

    /// Statement failure, optionally tagged with the engine's error code.
    pub fn query(code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            kind: DatabaseErrorKind::Query,
            message: message.into(),
        }
    }

    /// `"ConnectionPoolError"` or `"QueryError"`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SqlScopedError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("No rows returned by: {sql}")]
    NotFound {
        sql: String,
        parameters: Vec<SqlValue>,
    },

    #[error("More than one row returned by: {sql}")]
    TooMany {
        sql: String,
        parameters: Vec<SqlValue>,
    },

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),
}

impl SqlScopedError {
    pub(crate) fn not_found(sql: &str, parameters: &[SqlValue]) -> Self {
        SqlScopedError::NotFound {
            sql: sql.to_string(),
            parameters: parameters.to_vec(),
        }
    }

    pub(crate) fn too_many(sql: &str, parameters: &[SqlValue]) -> Self {
        SqlScopedError::TooMany {
            sql: sql.to_string(),
            parameters: parameters.to_vec(),
        }
    }

    /// The driver error, if this is one.
    #[must_use]
    pub fn as_database_error(&self) -> Option<&DatabaseError> {
        match self {
            SqlScopedError::Database(err) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, SqlScopedError::NotFound { .. })
    }

    #[must_use]
    pub fn is_too_many(&self) -> bool {
        matches!(self, SqlScopedError::TooMany { .. })
    }
}
