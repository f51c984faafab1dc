use bb8::PooledConnection;
use tokio::runtime::Handle;
use tracing::warn;

use super::manager::{DriverManager, PooledClient};
use crate::driver::Driver;

/// Exclusive hold on one pooled connection. Dropping it gives the connection back.
///
/// A connection released with a transaction still open is rolled back on a spawned task before
/// the pool sees it again; without a runtime to do that it is discarded instead.
pub struct Lease<D: Driver> {
    conn: Option<PooledConnection<'static, DriverManager<D>>>,
}

impl<D: Driver> Lease<D> {
    pub(crate) fn new(conn: PooledConnection<'static, DriverManager<D>>) -> Self {
        Self { conn: Some(conn) }
    }

    pub(crate) fn client_mut(&mut self) -> &mut PooledClient<D> {
        self.conn
            .as_deref_mut()
            .expect("pooled connection already released")
    }
}

impl<D: Driver> Drop for Lease<D> {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        if conn.is_broken() || conn.open_scopes().is_empty() {
            return;
        }
        match Handle::try_current() {
            Ok(handle) => {
                warn!(
                    scopes = ?conn.open_scopes(),
                    "connection released with an open transaction; rolling back"
                );
                handle.spawn(async move {
                    conn.abort().await;
                });
            }
            Err(_) => conn.mark_broken(),
        }
    }
}
