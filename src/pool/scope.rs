use std::convert::identity;

use futures_util::future::BoxFuture;

use super::ConnectionPool;
use super::lease::Lease;
use crate::client::Client;
use crate::driver::Driver;
use crate::error::SqlScopedError;

/// The connection a unit of work runs on: either a caller's client, or a lease taken from the
/// pool for this scope alone and given back when the scope is dropped.
pub enum ScopedConnection<'a, D: Driver> {
    Existing(Client<'a, D>),
    Fresh {
        lease: Lease<D>,
        pool: &'a ConnectionPool<D>,
    },
}

impl<D: Driver> ScopedConnection<'_, D> {
    /// Client for this scope. A fresh lease starts outside any transaction, at depth 0.
    pub fn client(&mut self) -> Client<'_, D> {
        match self {
            ScopedConnection::Existing(client) => client.reborrow(),
            ScopedConnection::Fresh { lease, pool } => Client::new(lease.client_mut(), *pool, 0),
        }
    }

    #[must_use]
    pub fn is_fresh(&self) -> bool {
        matches!(self, ScopedConnection::Fresh { .. })
    }
}

impl<D: Driver> ConnectionPool<D> {
    /// Resolve the connection for a unit of work.
    ///
    /// With an `existing` client the pool is left alone and `on_existing` may derive the client
    /// the scope should use. Without one a connection is acquired, to be released when the
    /// returned scope is dropped.
    ///
    /// # Errors
    /// Returns `SqlScopedError::Database` with a `ConnectionPool` kind if no connection could
    /// be acquired.
    pub async fn connect<'a>(
        &'a self,
        existing: Option<Client<'a, D>>,
        on_existing: impl FnOnce(Client<'a, D>) -> Client<'a, D> + Send,
    ) -> Result<ScopedConnection<'a, D>, SqlScopedError> {
        match existing {
            Some(client) => Ok(ScopedConnection::Existing(on_existing(client))),
            None => Ok(ScopedConnection::Fresh {
                lease: self.acquire().await?,
                pool: self,
            }),
        }
    }

    /// Run `work` on one resolved client, so every statement it issues shares a connection.
    /// The lease, if one was taken, is released when `work` finishes.
    ///
    /// # Errors
    /// Whatever `work` returns, or the failure to acquire a connection.
    pub async fn connected<T, E, F>(&self, existing: Option<Client<'_, D>>, work: F) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut Client<'_, D>) -> BoxFuture<'t, Result<T, E>> + Send,
        T: Send,
        E: From<SqlScopedError> + Send,
    {
        let mut scope = self.connect(existing, identity).await.map_err(E::from)?;
        let mut client = scope.client();
        work(&mut client).await
    }
}
