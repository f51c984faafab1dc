//! Transactions that nest through savepoints.
//!
//! A transaction started without a client leases a connection and runs `start transaction`.
//! One started on a client that is already inside a transaction opens `savepoint_<depth>`
//! instead, so an inner failure rolls back only the inner work. Either way `work` receives the
//! client one level deeper, and the scope is committed when `work` succeeds and rolled back
//! when it fails.
//!
//! A transaction future dropped before it finishes leaves its scope open on the connection.
//! The lease rolls the whole transaction back when it is released; a savepoint abandoned
//! inside a longer-lived transaction is rolled back before the enclosing transaction runs its
//! next statement. A savepoint cancelled while it was being created is not rolled back to;
//! the enclosing scope's commit or rollback ends it.

use std::convert::identity;

use futures_util::future::BoxFuture;
use tracing::{debug, error};

use crate::client::Client;
use crate::driver::{Driver, savepoint_name};
use crate::error::{DatabaseError, SqlScopedError};
use crate::pool::ConnectionPool;
use crate::results::QueryResult;
use crate::types::{IsolationLevel, TransactionOptions};

impl<D: Driver> ConnectionPool<D> {
    /// Run `work` inside a transaction, or inside a savepoint when `existing` is already in one.
    ///
    /// ```no_run
    /// # use sql_scoped::prelude::*;
    /// # async fn demo(pool: ConnectionPool<PostgresDriver>) -> Result<(), SqlScopedError> {
    /// let id = pool
    ///     .transaction(None, TransactionOptions::default(), |tx| {
    ///         Box::pin(async move {
    ///             let row = tx
    ///                 .run_query_exactly_one(
    ///                     "insert into cities (name) values ($1) returning id",
    ///                     &[SqlValue::from("Oslo")],
    ///                 )
    ///                 .await?;
    ///             tx.transaction(TransactionOptions::default(), |inner| {
    ///                 Box::pin(async move {
    ///                     inner.run_query("update cities set visited = true", &[]).await?;
    ///                     Ok::<_, SqlScopedError>(())
    ///                 })
    ///             })
    ///             .await?;
    ///             Ok::<_, SqlScopedError>(row.get("id").and_then(SqlValue::as_int))
    ///         })
    ///     })
    ///     .await?;
    /// # let _ = id;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// The error returned by `work`, unchanged, after the scope is rolled back; or the failure
    /// to acquire a connection or open the scope.
    ///
    /// # Panics
    /// If committing or rolling back the scope fails. The connection's transaction state is
    /// unknown at that point, so it is discarded rather than returned to the pool.
    pub async fn transaction<T, E, F>(
        &self,
        existing: Option<Client<'_, D>>,
        options: TransactionOptions,
        work: F,
    ) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut Client<'_, D>) -> BoxFuture<'t, Result<T, E>> + Send,
        T: Send,
        E: From<SqlScopedError> + Send,
    {
        let mut scope = self.connect(existing, identity).await.map_err(E::from)?;
        let mut outer = scope.client();
        self.begin(&mut outer, options.isolation.or(self.default_isolation()))
            .await
            .map_err(E::from)?;

        let outcome = {
            let mut inner = outer.reborrow().bump_savepoint();
            work(&mut inner).await
        };

        let commit = outcome.is_ok() && !options.test;
        self.finish(&mut outer, commit).await;
        outcome
    }

    async fn begin(
        &self,
        client: &mut Client<'_, D>,
        isolation: Option<IsolationLevel>,
    ) -> Result<(), SqlScopedError> {
        let depth = client.savepoint_depth();
        let conn = client.connection();
        conn.settle(depth).await?;

        // A transaction is listed before the round trip; a savepoint only once the server
        // has created it.
        if depth == 0 {
            conn.push_scope(depth);
        }
        let native = conn.native_mut()?;
        let started = if depth == 0 {
            self.driver().start_transaction(native, isolation).await
        } else {
            self.driver()
                .start_savepoint(native, &savepoint_name(depth))
                .await
        };
        match started {
            Ok(_) => {
                if depth > 0 {
                    conn.push_scope(depth);
                }
                debug!(depth, "transaction scope started");
                Ok(())
            }
            Err(err) => {
                conn.pop_scope(depth);
                Err(err.into())
            }
        }
    }

    async fn finish(&self, client: &mut Client<'_, D>, commit: bool) {
        let depth = client.savepoint_depth();
        let conn = client.connection();
        let action = if commit { "commit" } else { "rollback" };

        let result: Result<QueryResult, DatabaseError> = async {
            conn.settle(depth + 1).await?;
            let native = conn.native_mut()?;
            match (depth, commit) {
                (0, true) => self.driver().commit_transaction(native).await,
                (0, false) => self.driver().rollback_transaction(native).await,
                (_, true) => {
                    self.driver()
                        .commit_savepoint(native, &savepoint_name(depth))
                        .await
                }
                (_, false) => {
                    self.driver()
                        .rollback_savepoint(native, &savepoint_name(depth))
                        .await
                }
            }
        }
        .await;

        match result {
            Ok(_) => {
                conn.pop_scope(depth);
                debug!(depth, action, "transaction scope finished");
            }
            Err(err) => {
                conn.mark_broken();
                release_failed(action, depth, &err);
            }
        }
    }
}

fn release_failed(action: &str, depth: u32, err: &DatabaseError) -> ! {
    error!(depth, action, error = %err, "transaction cleanup failed; discarding connection");
    panic!("transaction {action} at depth {depth} failed: {err}");
}
