//! Bounded connection pool over `bb8`, built from a [`Driver`].

mod lease;
mod manager;
mod scope;

use std::fmt;
use std::sync::Arc;

use bb8::{Pool, RunError};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::driver::Driver;
use crate::error::{DatabaseError, SqlScopedError};
use crate::hooks::{AfterQueryHook, HookChain};
use crate::types::IsolationLevel;

pub use crate::config::PoolOptions;
pub use lease::Lease;
pub use manager::{DriverManager, PooledClient};
pub use scope::ScopedConnection;

use manager::ConnectFailures;

/// Connection counts reported by [`ConnectionPool::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Pool of native connections for one database, plus the hooks applied to every result.
///
/// Cloning is cheap and shares the underlying pool.
pub struct ConnectionPool<D: Driver> {
    pool: Pool<DriverManager<D>>,
    driver: Arc<D>,
    hooks: HookChain,
    default_isolation: Option<IsolationLevel>,
    connect_failures: ConnectFailures,
}

impl<D: Driver> Clone for ConnectionPool<D> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            driver: Arc::clone(&self.driver),
            hooks: self.hooks.clone(),
            default_isolation: self.default_isolation,
            connect_failures: self.connect_failures.clone(),
        }
    }
}

impl<D: Driver> fmt::Debug for ConnectionPool<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("state", &self.state())
            .field("hooks", &self.hooks.len())
            .field("default_isolation", &self.default_isolation)
            .finish_non_exhaustive()
    }
}

impl<D: Driver> ConnectionPool<D> {
    /// Pool for the database named by `config`.
    ///
    /// Connections are opened lazily, so an unreachable server only shows up on the first
    /// acquisition. Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// Returns `SqlScopedError::ConfigError` if the database URL cannot be resolved.
    pub fn new(driver: D, config: &DatabaseConfig) -> Result<Self, SqlScopedError> {
        let connection_string = config.connection_string()?;
        let mut pool = Self::with_options(driver, connection_string, config.pool.clone());
        pool.default_isolation = config.isolation_level;
        Ok(pool)
    }

    /// Pool with explicit sizing. Must be called inside a tokio runtime.
    pub fn with_options(
        driver: D,
        connection_string: impl Into<String>,
        options: PoolOptions,
    ) -> Self {
        let driver = Arc::new(driver);
        let connect_failures = ConnectFailures::default();
        let manager = DriverManager::new(
            Arc::clone(&driver),
            connection_string,
            connect_failures.clone(),
        );
        let pool = Pool::builder()
            .max_size(options.max_size)
            .min_idle(Some(options.min_idle))
            .idle_timeout(Some(options.idle_timeout))
            .reaper_rate(options.reaper_rate)
            .connection_timeout(options.connection_timeout)
            .test_on_check_out(false)
            .retry_connection(false)
            .error_sink(Box::new(connect_failures.clone()))
            .build_unchecked(manager);

        Self {
            pool,
            driver,
            hooks: HookChain::default(),
            default_isolation: None,
            connect_failures,
        }
    }

    /// Register a hook run on every query result, after those already registered.
    #[must_use]
    pub fn with_after_query_hook(mut self, hook: impl AfterQueryHook + 'static) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Isolation level for top-level transactions that do not ask for one.
    #[must_use]
    pub fn with_default_isolation(mut self, level: IsolationLevel) -> Self {
        self.default_isolation = Some(level);
        self
    }

    #[must_use]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    #[must_use]
    pub fn default_isolation(&self) -> Option<IsolationLevel> {
        self.default_isolation
    }

    pub(crate) fn hooks(&self) -> &HookChain {
        &self.hooks
    }

    #[must_use]
    pub fn state(&self) -> PoolState {
        let state = self.pool.state();
        PoolState {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    /// Take a connection, waiting for one to be returned if the pool is at capacity.
    ///
    /// # Errors
    /// A `ConnectionPool` kind [`DatabaseError`] as soon as a connect attempt fails while
    /// waiting, or when no connection frees up within the configured timeout.
    pub async fn acquire(&self) -> Result<Lease<D>, DatabaseError> {
        let failure = self.connect_failures.next();
        tokio::select! {
            biased;
            checkout = self.pool.get_owned() => match checkout {
                Ok(conn) => {
                    debug!("checked out connection");
                    Ok(Lease::new(conn))
                }
                Err(RunError::User(err)) => Err(err),
                Err(RunError::TimedOut) => Err(self.connect_failures.latest().unwrap_or_else(|| {
                    DatabaseError::connection_pool("timed out waiting for a pooled connection")
                })),
            },
            err = failure => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::DatabaseErrorKind;
    use crate::test_utils::{RecordingDriver, recording_pool};

    #[tokio::test]
    async fn acquire_reuses_released_connection() {
        let driver = RecordingDriver::new();
        let pool = recording_pool(&driver);

        let lease = pool.acquire().await.unwrap();
        drop(lease);
        let _lease = pool.acquire().await.unwrap();

        assert_eq!(driver.connections_opened(), 1);
        assert_eq!(pool.state().connections, 1);
    }

    #[tokio::test]
    async fn connect_failure_reaches_acquirer_without_waiting_for_timeout() {
        let driver = RecordingDriver::new();
        driver.refuse_connections("connect ECONNREFUSED 127.0.0.1:80");
        let pool = ConnectionPool::with_options(
            driver,
            "recording://",
            PoolOptions {
                min_idle: 0,
                ..PoolOptions::default()
            },
        );

        let Ok(Err(err)) = tokio::time::timeout(Duration::from_secs(1), pool.acquire()).await
        else {
            panic!("acquire should fail well before the connection timeout");
        };
        assert_eq!(err.kind, DatabaseErrorKind::ConnectionPool);
        assert_eq!(err.message, "connect ECONNREFUSED 127.0.0.1:80");
    }

    #[tokio::test]
    async fn exhausted_pool_times_out_after_connect_recovers() {
        let driver = RecordingDriver::new();
        driver.refuse_connections("connect ECONNREFUSED 127.0.0.1:80");
        let pool = ConnectionPool::with_options(
            driver.clone(),
            "recording://",
            PoolOptions {
                min_idle: 0,
                max_size: 1,
                connection_timeout: Duration::from_millis(200),
                ..PoolOptions::default()
            },
        );
        assert!(pool.acquire().await.is_err());

        driver.accept_connections();
        let _held = pool.acquire().await.unwrap();
        let Err(err) = pool.acquire().await else {
            panic!("the only connection is held");
        };
        assert_eq!(err.message, "timed out waiting for a pooled connection");
    }

    #[tokio::test]
    async fn connection_with_open_scope_is_rolled_back_on_release() {
        let driver = RecordingDriver::new();
        let pool = recording_pool(&driver);

        let mut lease = pool.acquire().await.unwrap();
        lease.client_mut().push_scope(0);
        drop(lease);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(driver.statements(), vec!["rollback"]);
        let mut lease = pool.acquire().await.unwrap();
        assert!(lease.client_mut().open_scopes().is_empty());
        assert_eq!(driver.connections_opened(), 1);
    }
}
