//! Running statements on a pool, on the caller's client when one is given and on a connection
//! leased for the one statement otherwise.

use std::convert::identity;

use crate::client::Client;
use crate::compile::Compilable;
use crate::driver::Driver;
use crate::error::{DatabaseErrorKind, SqlScopedError};
use crate::pool::ConnectionPool;
use crate::results::{QueryResult, Row};
use crate::types::SqlValue;

impl<D: Driver> ConnectionPool<D> {
    /// Run one statement and pass its result through the after-query hooks.
    ///
    /// # Errors
    /// `SqlScopedError::Database` with a `Query` kind and the engine's code when the statement
    /// fails, or a `ConnectionPool` kind when no connection could be had; any error returned
    /// by a hook.
    pub async fn run_query<'a>(
        &'a self,
        existing: Option<Client<'a, D>>,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, SqlScopedError> {
        let mut scope = self.connect(existing, identity).await?;
        let result = {
            let mut client = scope.client();
            let depth = client.savepoint_depth();
            let conn = client.connection();
            conn.settle(depth).await?;
            let outcome = self
                .driver()
                .run_query(conn.native_mut()?, sql, params)
                .await;
            if let Err(err) = &outcome
                && err.kind == DatabaseErrorKind::ConnectionPool
            {
                conn.mark_broken();
            }
            outcome?
        };
        drop(scope);
        self.hooks().apply(result)
    }

    /// First row of the result; further rows are ignored.
    ///
    /// # Errors
    /// `SqlScopedError::NotFound` with the statement and parameters when there are no rows,
    /// plus everything [`ConnectionPool::run_query`] can return.
    pub async fn run_query_one<'a>(
        &'a self,
        existing: Option<Client<'a, D>>,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Row, SqlScopedError> {
        self.run_query(existing, sql, params)
            .await?
            .into_one(sql, params)
    }

    /// The single row of the result.
    ///
    /// # Errors
    /// `SqlScopedError::NotFound` on zero rows, `SqlScopedError::TooMany` on more than one,
    /// plus everything [`ConnectionPool::run_query`] can return.
    pub async fn run_query_exactly_one<'a>(
        &'a self,
        existing: Option<Client<'a, D>>,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Row, SqlScopedError> {
        self.run_query(existing, sql, params)
            .await?
            .into_exactly_one(sql, params)
    }

    /// All rows of the result.
    ///
    /// # Errors
    /// See [`ConnectionPool::run_query`].
    pub async fn run_query_rows<'a>(
        &'a self,
        existing: Option<Client<'a, D>>,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Row>, SqlScopedError> {
        Ok(self.run_query(existing, sql, params).await?.rows)
    }

    /// [`ConnectionPool::run_query`] for a compiled query.
    ///
    /// # Errors
    /// See [`ConnectionPool::run_query`].
    pub async fn run_query_compiled<'a>(
        &'a self,
        existing: Option<Client<'a, D>>,
        query: &(impl Compilable + ?Sized + Sync),
    ) -> Result<QueryResult, SqlScopedError> {
        let compiled = query.compile();
        self.run_query(existing, &compiled.sql, &compiled.parameters)
            .await
    }

    /// # Errors
    /// See [`ConnectionPool::run_query_one`].
    pub async fn run_query_one_compiled<'a>(
        &'a self,
        existing: Option<Client<'a, D>>,
        query: &(impl Compilable + ?Sized + Sync),
    ) -> Result<Row, SqlScopedError> {
        let compiled = query.compile();
        self.run_query_one(existing, &compiled.sql, &compiled.parameters)
            .await
    }

    /// # Errors
    /// See [`ConnectionPool::run_query_exactly_one`].
    pub async fn run_query_exactly_one_compiled<'a>(
        &'a self,
        existing: Option<Client<'a, D>>,
        query: &(impl Compilable + ?Sized + Sync),
    ) -> Result<Row, SqlScopedError> {
        let compiled = query.compile();
        self.run_query_exactly_one(existing, &compiled.sql, &compiled.parameters)
            .await
    }

    /// # Errors
    /// See [`ConnectionPool::run_query_rows`].
    pub async fn run_query_rows_compiled<'a>(
        &'a self,
        existing: Option<Client<'a, D>>,
        query: &(impl Compilable + ?Sized + Sync),
    ) -> Result<Vec<Row>, SqlScopedError> {
        let compiled = query.compile();
        self.run_query_rows(existing, &compiled.sql, &compiled.parameters)
            .await
    }
}
