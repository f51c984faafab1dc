use async_trait::async_trait;

use super::Driver;
use crate::error::DatabaseError;
use crate::results::QueryResult;
use crate::types::{IsolationLevel, SqlValue};

/// Wraps a driver so that committing a top-level transaction rolls it back instead.
///
/// Everything else is delegated untouched, savepoint releases included: inside a sandboxed
/// transaction nested scopes behave normally, and the outer rollback discards all of it. Meant
/// for integration tests that must leave the database as they found it.
#[derive(Debug, Clone, Default)]
pub struct SandboxedDriver<D> {
    inner: D,
}

impl<D: Driver> SandboxedDriver<D> {
    #[must_use]
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn inner(&self) -> &D {
        &self.inner
    }
}

#[async_trait]
impl<D: Driver> Driver for SandboxedDriver<D> {
    type Connection = D::Connection;

    async fn connect(&self, connection_string: &str) -> Result<Self::Connection, DatabaseError> {
        self.inner.connect(connection_string).await
    }

    async fn disconnect(&self, connection: Self::Connection) -> Result<(), DatabaseError> {
        self.inner.disconnect(connection).await
    }

    async fn run_query(
        &self,
        connection: &mut Self::Connection,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, DatabaseError> {
        self.inner.run_query(connection, sql, params).await
    }

    fn has_broken(&self, connection: &mut Self::Connection) -> bool {
        self.inner.has_broken(connection)
    }

    async fn start_transaction(
        &self,
        connection: &mut Self::Connection,
        isolation: Option<IsolationLevel>,
    ) -> Result<QueryResult, DatabaseError> {
        self.inner.start_transaction(connection, isolation).await
    }

    async fn start_savepoint(
        &self,
        connection: &mut Self::Connection,
        name: &str,
    ) -> Result<QueryResult, DatabaseError> {
        self.inner.start_savepoint(connection, name).await
    }

    async fn rollback_transaction(
        &self,
        connection: &mut Self::Connection,
    ) -> Result<QueryResult, DatabaseError> {
        self.inner.rollback_transaction(connection).await
    }

    async fn rollback_savepoint(
        &self,
        connection: &mut Self::Connection,
        name: &str,
    ) -> Result<QueryResult, DatabaseError> {
        self.inner.rollback_savepoint(connection, name).await
    }

    async fn commit_transaction(
        &self,
        connection: &mut Self::Connection,
    ) -> Result<QueryResult, DatabaseError> {
        self.inner.rollback_transaction(connection).await
    }

    async fn commit_savepoint(
        &self,
        connection: &mut Self::Connection,
        name: &str,
    ) -> Result<QueryResult, DatabaseError> {
        self.inner.commit_savepoint(connection, name).await
    }
}
