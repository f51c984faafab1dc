use serde::de::DeserializeOwned;

use super::row::{Columns, Row};
use crate::error::SqlScopedError;
use crate::types::SqlValue;

/// Outcome of one executed statement.
///
/// `row_count` is what the engine reported: rows returned for queries, rows affected for DML
/// on engines that expose it, `None` when nothing was reported.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<R = Row> {
    pub row_count: Option<u64>,
    pub rows: Vec<R>,
}

impl<R> Default for QueryResult<R> {
    fn default() -> Self {
        Self {
            row_count: None,
            rows: Vec::new(),
        }
    }
}

impl<R> QueryResult<R> {
    #[must_use]
    pub fn new(row_count: Option<u64>, rows: Vec<R>) -> Self {
        Self { row_count, rows }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn map_rows<T>(self, f: impl FnMut(R) -> T) -> QueryResult<T> {
        QueryResult {
            row_count: self.row_count,
            rows: self.rows.into_iter().map(f).collect(),
        }
    }

    /// # Errors
    /// Returns the first error produced by `f`.
    pub fn try_map_rows<T, E>(self, f: impl FnMut(R) -> Result<T, E>) -> Result<QueryResult<T>, E> {
        Ok(QueryResult {
            row_count: self.row_count,
            rows: self.rows.into_iter().map(f).collect::<Result<_, _>>()?,
        })
    }

    /// First row; extra rows are ignored.
    ///
    /// # Errors
    /// `SqlScopedError::NotFound` when there are no rows.
    pub fn into_one(self, sql: &str, parameters: &[SqlValue]) -> Result<R, SqlScopedError> {
        self.rows
            .into_iter()
            .next()
            .ok_or_else(|| SqlScopedError::not_found(sql, parameters))
    }

    /// The single row.
    ///
    /// # Errors
    /// `SqlScopedError::NotFound` on zero rows, `SqlScopedError::TooMany` on more than one.
    pub fn into_exactly_one(self, sql: &str, parameters: &[SqlValue]) -> Result<R, SqlScopedError> {
        let mut rows = self.rows.into_iter();
        match (rows.next(), rows.next()) {
            (Some(row), None) => Ok(row),
            (None, _) => Err(SqlScopedError::not_found(sql, parameters)),
            (Some(_), Some(_)) => Err(SqlScopedError::too_many(sql, parameters)),
        }
    }
}

impl QueryResult<Row> {
    /// Build a result from column names and row values.
    #[must_use]
    pub fn from_rows<S: Into<String>>(
        column_names: impl IntoIterator<Item = S>,
        rows: Vec<Vec<SqlValue>>,
    ) -> Self {
        let columns = Columns::new(column_names.into_iter().map(Into::into).collect());
        let rows: Vec<Row> = rows
            .into_iter()
            .map(|values| Row::new(columns.clone(), values))
            .collect();
        Self {
            row_count: Some(rows.len() as u64),
            rows,
        }
    }

    /// Result of a statement that returns no rows.
    #[must_use]
    pub fn affected(row_count: u64) -> Self {
        Self {
            row_count: Some(row_count),
            rows: Vec::new(),
        }
    }

    /// Rename every column with `rename`. Rows of one result share their columns, so the names
    /// are rewritten once.
    #[must_use]
    pub fn rename_columns(self, rename: impl Fn(&str) -> String) -> Self {
        let Some(first) = self.rows.first() else {
            return self;
        };
        let renamed = Columns::new(first.columns().names().iter().map(|n| rename(n.as_str())).collect());
        self.map_rows(|row| row.with_columns(renamed.clone()))
    }

    /// # Errors
    /// Returns `SqlScopedError::DecodeError` if any row does not fit `T`.
    pub fn deserialize_rows<T: DeserializeOwned>(self) -> Result<QueryResult<T>, SqlScopedError> {
        self.try_map_rows(|row| row.deserialize())
    }
}
