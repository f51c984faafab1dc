//! Pooled connections, savepoint-nested transactions and one error taxonomy over pluggable SQL
//! drivers.
//!
//! A [`ConnectionPool`] is built from a [`Driver`]. Queries and transactions take an optional
//! [`Client`]: pass one to run on a connection you already hold, at its transaction depth, or
//! pass `None` to lease a connection for just that call.
//!
//! ```no_run
//! use sql_scoped::prelude::*;
//!
//! # async fn demo() -> Result<(), SqlScopedError> {
//! let config = DatabaseConfig::from_env()?;
//! let pool = ConnectionPool::new(PostgresDriver::new(), &config)?
//!     .with_after_query_hook(CamelCaseColumns);
//!
//! let row = pool
//!     .run_query_exactly_one(None, "select count(*) as city_count from cities", &[])
//!     .await?;
//! println!("{:?}", row.get("cityCount"));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod compile;
pub mod config;
pub mod driver;
pub mod error;
pub mod hooks;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod pool;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod prelude;
mod query;
pub mod results;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
mod transaction;
pub mod types;

pub use client::Client;
pub use compile::{Compilable, Compiled};
pub use config::{DatabaseConfig, PoolOptions, SecretUrl};
pub use driver::{Driver, SandboxedDriver, savepoint_name};
pub use error::{DatabaseError, DatabaseErrorKind, SqlScopedError};
pub use hooks::{AfterQueryHook, CamelCaseColumns, HookChain};
#[cfg(feature = "mysql")]
pub use mysql::MySqlDriver;
pub use pool::{ConnectionPool, Lease, PoolState, ScopedConnection};
#[cfg(feature = "postgres")]
pub use postgres::PostgresDriver;
pub use results::{Columns, QueryResult, Row};
pub use types::{IsolationLevel, SqlValue, TransactionOptions};

/// Result type defaulting to this crate's error.
pub type Result<T, E = SqlScopedError> = std::result::Result<T, E>;
