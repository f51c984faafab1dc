//! Drivers and servers for exercising pools without a production database.

#[cfg(feature = "test-utils-postgres")]
pub mod postgres;
pub mod recording;

pub use recording::{RecordedConnection, RecordingDriver};

use std::time::Duration;

use crate::config::PoolOptions;
use crate::driver::Driver;
use crate::pool::ConnectionPool;

/// Pool options that keep connection counts predictable in tests: nothing is opened ahead of
/// time and a checkout gives up after two seconds.
#[must_use]
pub fn test_pool_options() -> PoolOptions {
    PoolOptions {
        min_idle: 0,
        connection_timeout: Duration::from_secs(2),
        ..PoolOptions::default()
    }
}

/// Pool over `driver` sized with [`test_pool_options`]. Must be called inside a tokio runtime.
#[must_use]
pub fn test_pool<D: Driver>(driver: D, connection_string: &str) -> ConnectionPool<D> {
    ConnectionPool::with_options(driver, connection_string, test_pool_options())
}

/// Pool sharing `driver`'s recording.
#[must_use]
pub fn recording_pool(driver: &RecordingDriver) -> ConnectionPool<RecordingDriver> {
    test_pool(driver.clone(), "recording://")
}
