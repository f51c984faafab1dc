use futures_util::future::BoxFuture;

use crate::compile::Compilable;
use crate::driver::Driver;
use crate::error::SqlScopedError;
use crate::pool::{ConnectionPool, PooledClient};
use crate::results::{QueryResult, Row};
use crate::types::{SqlValue, TransactionOptions};

/// A checked-out connection together with how deeply nested in transactions the caller is.
///
/// Depth 0 is outside any transaction, 1 is inside a top-level transaction, 2 inside its first
/// savepoint, and so on. A `Client` is a borrow: holding one gives exclusive use of the
/// connection, and entering a nested transaction borrows it again at the next depth.
pub struct Client<'c, D: Driver> {
    conn: &'c mut PooledClient<D>,
    pool: &'c ConnectionPool<D>,
    savepoint_depth: u32,
}

impl<'c, D: Driver> Client<'c, D> {
    pub(crate) fn new(
        conn: &'c mut PooledClient<D>,
        pool: &'c ConnectionPool<D>,
        savepoint_depth: u32,
    ) -> Self {
        Self {
            conn,
            pool,
            savepoint_depth,
        }
    }

    #[must_use]
    pub fn savepoint_depth(&self) -> u32 {
        self.savepoint_depth
    }

    /// The same connection, one transaction level deeper.
    #[must_use]
    pub fn bump_savepoint(self) -> Self {
        let depth = self.savepoint_depth + 1;
        self.with_savepoint_depth(depth)
    }

    pub(crate) fn with_savepoint_depth(self, savepoint_depth: u32) -> Self {
        Self {
            savepoint_depth,
            ..self
        }
    }

    /// Borrow this client for a shorter scope without giving it up.
    pub fn reborrow(&mut self) -> Client<'_, D> {
        Client {
            conn: &mut *self.conn,
            pool: self.pool,
            savepoint_depth: self.savepoint_depth,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &'c ConnectionPool<D> {
        self.pool
    }

    pub(crate) fn connection(&mut self) -> &mut PooledClient<D> {
        &mut *self.conn
    }

    /// # Errors
    /// See [`ConnectionPool::run_query`].
    pub async fn run_query(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, SqlScopedError> {
        let pool = self.pool;
        pool.run_query(Some(self.reborrow()), sql, params).await
    }

    /// # Errors
    /// See [`ConnectionPool::run_query_one`].
    pub async fn run_query_one(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Row, SqlScopedError> {
        let pool = self.pool;
        pool.run_query_one(Some(self.reborrow()), sql, params).await
    }

    /// # Errors
    /// See [`ConnectionPool::run_query_exactly_one`].
    pub async fn run_query_exactly_one(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Row, SqlScopedError> {
        let pool = self.pool;
        pool.run_query_exactly_one(Some(self.reborrow()), sql, params)
            .await
    }

    /// # Errors
    /// See [`ConnectionPool::run_query_rows`].
    pub async fn run_query_rows(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Row>, SqlScopedError> {
        let pool = self.pool;
        pool.run_query_rows(Some(self.reborrow()), sql, params).await
    }

    /// # Errors
    /// See [`ConnectionPool::run_query`].
    pub async fn run_compiled(
        &mut self,
        query: &(impl Compilable + ?Sized + Sync),
    ) -> Result<QueryResult, SqlScopedError> {
        let pool = self.pool;
        pool.run_query_compiled(Some(self.reborrow()), query).await
    }

    /// Run `work` in a savepoint on this connection, or in a transaction at depth 0.
    ///
    /// # Errors
    /// Whatever `work` returns, after its savepoint is rolled back, or a failure to open the
    /// savepoint.
    pub async fn transaction<T, E, F>(
        &mut self,
        options: TransactionOptions,
        work: F,
    ) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut Client<'_, D>) -> BoxFuture<'t, Result<T, E>> + Send,
        T: Send,
        E: From<SqlScopedError> + Send,
    {
        let pool = self.pool;
        pool.transaction(Some(self.reborrow()), options, work).await
    }
}

impl<D: Driver> std::fmt::Debug for Client<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("savepoint_depth", &self.savepoint_depth)
            .field("open_scopes", &self.conn.open_scopes())
            .finish_non_exhaustive()
    }
}
