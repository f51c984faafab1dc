//! The seam where query builders hand statements to the pool.

use crate::types::SqlValue;

/// SQL text and its positional parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Compiled {
    pub sql: String,
    pub parameters: Vec<SqlValue>,
}

impl Compiled {
    pub fn new(sql: impl Into<String>, parameters: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            parameters,
        }
    }
}

/// Anything that can produce a statement. Query builders implement this to run through
/// [`ConnectionPool::run_query_compiled`](crate::pool::ConnectionPool::run_query_compiled)
/// and the other `*_compiled` operations.
pub trait Compilable {
    fn compile(&self) -> Compiled;
}

impl Compilable for Compiled {
    fn compile(&self) -> Compiled {
        self.clone()
    }
}

impl Compilable for str {
    fn compile(&self) -> Compiled {
        Compiled::new(self, Vec::new())
    }
}

impl Compilable for String {
    fn compile(&self) -> Compiled {
        self.as_str().compile()
    }
}

impl<S: AsRef<str>> Compilable for (S, Vec<SqlValue>) {
    fn compile(&self) -> Compiled {
        Compiled::new(self.0.as_ref(), self.1.clone())
    }
}
