//! Transformations applied to every query result before it reaches the caller.

use std::sync::Arc;

use crate::error::SqlScopedError;
use crate::results::QueryResult;

/// A step in the after-query pipeline.
///
/// Closures of the right shape are hooks too:
/// ```rust
/// use sql_scoped::prelude::*;
///
/// let trim = |result: QueryResult| -> Result<QueryResult, SqlScopedError> {
///     Ok(result.rename_columns(|name| name.trim().to_string()))
/// };
/// let mut hooks = HookChain::default();
/// hooks.push(trim);
/// ```
pub trait AfterQueryHook: Send + Sync {
    /// # Errors
    /// Implementations may reject a result; the error reaches the query's caller.
    fn transform(&self, result: QueryResult) -> Result<QueryResult, SqlScopedError>;
}

impl<F> AfterQueryHook for F
where
    F: Fn(QueryResult) -> Result<QueryResult, SqlScopedError> + Send + Sync,
{
    fn transform(&self, result: QueryResult) -> Result<QueryResult, SqlScopedError> {
        self(result)
    }
}

/// Hooks in registration order.
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn AfterQueryHook>>,
}

impl HookChain {
    pub fn push(&mut self, hook: impl AfterQueryHook + 'static) {
        self.hooks.push(Arc::new(hook));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// # Errors
    /// The first error any hook returns; later hooks do not run.
    pub fn apply(&self, result: QueryResult) -> Result<QueryResult, SqlScopedError> {
        self.hooks
            .iter()
            .try_fold(result, |result, hook| hook.transform(result))
    }
}

/// Renames `snake_case` columns to `camelCase`. Leading underscores are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct CamelCaseColumns;

impl AfterQueryHook for CamelCaseColumns {
    fn transform(&self, result: QueryResult) -> Result<QueryResult, SqlScopedError> {
        Ok(result.rename_columns(to_camel_case))
    }
}

#[must_use]
pub fn to_camel_case(name: &str) -> String {
    let body = name.trim_start_matches('_');
    let mut out = String::with_capacity(name.len());
    out.push_str(&name[..name.len() - body.len()]);

    let mut upper_next = false;
    for ch in body.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
