use std::future::Future;
use std::sync::Arc;

use bb8::{ErrorSink, ManageConnection};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::driver::{Driver, savepoint_name};
use crate::error::DatabaseError;

/// bb8 manager that opens and validates connections through a [`Driver`].
pub struct DriverManager<D> {
    driver: Arc<D>,
    connection_string: String,
    failures: ConnectFailures,
}

impl<D: Driver> DriverManager<D> {
    pub(crate) fn new(
        driver: Arc<D>,
        connection_string: impl Into<String>,
        failures: ConnectFailures,
    ) -> Self {
        Self {
            driver,
            connection_string: connection_string.into(),
            failures,
        }
    }
}

impl<D: Driver> ManageConnection for DriverManager<D> {
    type Connection = PooledClient<D>;
    type Error = DatabaseError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let driver = Arc::clone(&self.driver);
        let connection_string = self.connection_string.clone();
        let failures = self.failures.clone();
        async move {
            let native = driver.connect(&connection_string).await?;
            failures.clear();
            debug!("opened pooled connection");
            Ok(PooledClient::new(native, driver))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let driver = Arc::clone(&self.driver);
        async move {
            let native = conn.native_mut()?;
            driver.run_query(native, "select 1", &[]).await.map(|_| ())
        }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        if conn.broken || !conn.open_scopes.is_empty() {
            return true;
        }
        conn.native
            .as_mut()
            .is_none_or(|native| self.driver.has_broken(native))
    }
}

/// Publishes connect failures, so a checkout waiting on a connection that will never open
/// fails as soon as the attempt does. The latest failure is kept until a connect succeeds.
#[derive(Debug, Clone)]
pub(crate) struct ConnectFailures {
    latest: Arc<watch::Sender<Option<DatabaseError>>>,
}

impl Default for ConnectFailures {
    fn default() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            latest: Arc::new(latest),
        }
    }
}

impl ConnectFailures {
    pub(crate) fn latest(&self) -> Option<DatabaseError> {
        self.latest.borrow().clone()
    }

    pub(crate) fn clear(&self) {
        self.latest.send_if_modified(|latest| latest.take().is_some());
    }

    /// Resolves with the first failure published after this call.
    pub(crate) fn next(&self) -> impl Future<Output = DatabaseError> + Send + 'static {
        let mut failures = self.latest.subscribe();
        async move {
            while failures.changed().await.is_ok() {
                if let Some(err) = failures.borrow_and_update().clone() {
                    return err;
                }
            }
            std::future::pending().await
        }
    }
}

impl ErrorSink<DatabaseError> for ConnectFailures {
    fn sink(&self, error: DatabaseError) {
        warn!(error = %error, "failed to open pooled connection");
        self.latest.send_replace(Some(error));
    }

    fn boxed_clone(&self) -> Box<dyn ErrorSink<DatabaseError>> {
        Box::new(self.clone())
    }
}

/// A native connection as the pool holds it.
///
/// `open_scopes` lists the depths of transactions and savepoints begun on this connection and
/// not yet committed or rolled back, innermost last. Anything left there when the connection
/// goes back to the pool means its transaction state is unknown.
pub struct PooledClient<D: Driver> {
    native: Option<D::Connection>,
    driver: Arc<D>,
    open_scopes: Vec<u32>,
    broken: bool,
}

impl<D: Driver> PooledClient<D> {
    pub(crate) fn new(native: D::Connection, driver: Arc<D>) -> Self {
        Self {
            native: Some(native),
            driver,
            open_scopes: Vec::new(),
            broken: false,
        }
    }

    /// # Errors
    /// A `ConnectionPool` kind [`DatabaseError`] if the native connection is already gone.
    pub fn native_mut(&mut self) -> Result<&mut D::Connection, DatabaseError> {
        self.native
            .as_mut()
            .ok_or_else(|| DatabaseError::connection_pool("connection already closed"))
    }

    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Never hand this connection out again.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    #[must_use]
    pub fn open_scopes(&self) -> &[u32] {
        &self.open_scopes
    }

    pub(crate) fn push_scope(&mut self, depth: u32) {
        self.open_scopes.push(depth);
    }

    pub(crate) fn pop_scope(&mut self, depth: u32) {
        self.open_scopes.retain(|open| *open < depth);
    }

    /// Roll back scopes at `depth` or deeper that were begun and then abandoned, which happens
    /// when a transaction future is dropped before it finished.
    ///
    /// A client at `depth` can only run a statement once every scope it opened has ended, so
    /// anything still listed at or below it belongs to a cancelled transaction.
    pub(crate) async fn settle(&mut self, depth: u32) -> Result<(), DatabaseError> {
        let Some(lowest) = self.open_scopes.iter().copied().filter(|d| *d >= depth).min() else {
            return Ok(());
        };
        warn!(depth = lowest, "rolling back scope left open by a cancelled transaction");

        let driver = Arc::clone(&self.driver);
        let native = self.native_mut()?;
        let result = if lowest == 0 {
            driver.rollback_transaction(native).await
        } else {
            driver
                .rollback_savepoint(native, &savepoint_name(lowest))
                .await
        };
        match result {
            Ok(_) => {
                self.pop_scope(lowest);
                Ok(())
            }
            Err(err) => {
                self.broken = true;
                Err(err)
            }
        }
    }

    /// Roll back everything open on the connection, marking it broken if that fails.
    pub(crate) async fn abort(&mut self) {
        if self.open_scopes.is_empty() {
            return;
        }
        let driver = Arc::clone(&self.driver);
        let result = match self.native.as_mut() {
            Some(native) => driver.rollback_transaction(native).await,
            None => Err(DatabaseError::connection_pool("connection already closed")),
        };
        match result {
            Ok(_) => {
                debug!("rolled back transaction of released connection");
                self.open_scopes.clear();
            }
            Err(err) => {
                error!(error = %err, "rollback of released connection failed; discarding it");
                self.broken = true;
            }
        }
    }
}

impl<D: Driver> Drop for PooledClient<D> {
    fn drop(&mut self) {
        let Some(native) = self.native.take() else {
            return;
        };
        let driver = Arc::clone(&self.driver);
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = driver.disconnect(native).await {
                        error!(error = %err, "failed to close evicted connection");
                    }
                });
            }
            Err(_) => debug!("no runtime to close evicted connection; dropping it"),
        }
    }
}
