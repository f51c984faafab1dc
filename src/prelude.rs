//! Convenient imports for common functionality.

pub use crate::client::Client;
pub use crate::compile::{Compilable, Compiled};
pub use crate::config::{DatabaseConfig, PoolOptions};
pub use crate::driver::{Driver, SandboxedDriver};
pub use crate::error::{DatabaseError, DatabaseErrorKind, SqlScopedError};
pub use crate::hooks::{AfterQueryHook, CamelCaseColumns, HookChain};
pub use crate::pool::ConnectionPool;
pub use crate::results::{QueryResult, Row};
pub use crate::types::{IsolationLevel, SqlValue, TransactionOptions};

#[cfg(feature = "mysql")]
pub use crate::mysql::MySqlDriver;
#[cfg(feature = "postgres")]
pub use crate::postgres::PostgresDriver;
