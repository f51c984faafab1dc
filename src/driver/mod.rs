//! The capability every backend provides: open and close native connections, run a statement,
//! and issue the begin/commit/rollback triads for transactions and savepoints.
//!
//! Only `connect`, `disconnect` and `run_query` are required. The triads default to the SQL
//! both Postgres and MySQL understand; a backend overrides one when its dialect differs.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::results::QueryResult;
use crate::types::{IsolationLevel, SqlValue};

pub mod sandbox;

pub use sandbox::SandboxedDriver;

#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// The backend's own connection handle.
    type Connection: Send + 'static;

    /// Open a native connection.
    ///
    /// # Errors
    /// A `ConnectionPool` kind [`DatabaseError`] carrying the driver's message.
    async fn connect(&self, connection_string: &str) -> Result<Self::Connection, DatabaseError>;

    /// Close a native connection.
    ///
    /// # Errors
    /// A `ConnectionPool` kind [`DatabaseError`] if the close handshake fails.
    async fn disconnect(&self, connection: Self::Connection) -> Result<(), DatabaseError>;

    /// Run one statement with positional parameters.
    ///
    /// # Errors
    /// A `Query` kind [`DatabaseError`] with the engine's error code when the server rejects
    /// the statement.
    async fn run_query(
        &self,
        connection: &mut Self::Connection,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, DatabaseError>;

    /// Cheap, synchronous check the pool makes before reusing a connection.
    fn has_broken(&self, _connection: &mut Self::Connection) -> bool {
        false
    }

    async fn start_transaction(
        &self,
        connection: &mut Self::Connection,
        isolation: Option<IsolationLevel>,
    ) -> Result<QueryResult, DatabaseError> {
        match isolation {
            Some(level) => {
                let sql = format!("start transaction isolation level {}", level.as_sql());
                self.run_query(connection, &sql, &[]).await
            }
            None => self.run_query(connection, "start transaction", &[]).await,
        }
    }

    async fn start_savepoint(
        &self,
        connection: &mut Self::Connection,
        name: &str,
    ) -> Result<QueryResult, DatabaseError> {
        self.run_query(connection, &format!("savepoint {name}"), &[])
            .await
    }

    async fn rollback_transaction(
        &self,
        connection: &mut Self::Connection,
    ) -> Result<QueryResult, DatabaseError> {
        self.run_query(connection, "rollback", &[]).await
    }

    async fn rollback_savepoint(
        &self,
        connection: &mut Self::Connection,
        name: &str,
    ) -> Result<QueryResult, DatabaseError> {
        self.run_query(connection, &format!("rollback to {name}"), &[])
            .await
    }

    async fn commit_transaction(
        &self,
        connection: &mut Self::Connection,
    ) -> Result<QueryResult, DatabaseError> {
        self.run_query(connection, "commit", &[]).await
    }

    async fn commit_savepoint(
        &self,
        connection: &mut Self::Connection,
        name: &str,
    ) -> Result<QueryResult, DatabaseError> {
        self.run_query(connection, &format!("release savepoint {name}"), &[])
            .await
    }
}

/// Name of the savepoint opened by a transaction nested at `depth`.
#[must_use]
pub fn savepoint_name(depth: u32) -> String {
    format!("savepoint_{depth}")
}
