use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, Row as _, TypeInfo};

use crate::error::DatabaseError;
use crate::results::QueryResult;
use crate::types::SqlValue;

/// Bind every parameter in order.
pub fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Timestamp(dt) => query.bind(*dt),
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Json(value) => query.bind(sqlx::types::Json(value)),
            SqlValue::Blob(bytes) => query.bind(bytes.as_slice()),
        };
    }
    query
}

/// Decode rows by the column type names MySQL reports.
///
/// # Errors
/// Returns a `Query` kind [`DatabaseError`] if a column cannot be decoded.
pub fn build_result(
    column_names: Vec<String>,
    rows: &[MySqlRow],
) -> Result<QueryResult, DatabaseError> {
    let mut values = Vec::with_capacity(rows.len());
    for row in rows {
        let mut row_values = Vec::with_capacity(row.columns().len());
        for idx in 0..row.columns().len() {
            row_values.push(mysql_extract_value(row, idx)?);
        }
        values.push(row_values);
    }
    Ok(QueryResult::from_rows(column_names, values))
}

/// Extracts a [`SqlValue`] from a MySQL row at the given index.
///
/// # Errors
/// Returns a `Query` kind [`DatabaseError`] if the column cannot be read as its declared type.
pub fn mysql_extract_value(row: &MySqlRow, idx: usize) -> Result<SqlValue, DatabaseError> {
    let column = &row.columns()[idx];
    let type_name = column.type_info().name().to_uppercase();
    let decode = |e: sqlx::Error| {
        DatabaseError::query(
            None,
            format!(
                "cannot decode column \"{}\" of type {type_name}: {e}",
                column.name()
            ),
        )
    };

    let value = match type_name.as_str() {
        "NULL" => SqlValue::Null,
        "BOOLEAN" => row
            .try_get::<Option<bool>, _>(idx)
            .map_err(decode)?
            .map_or(SqlValue::Null, SqlValue::Bool),
        name if name.contains("INT") && name.contains("UNSIGNED") => {
            match row.try_get::<Option<u64>, _>(idx).map_err(decode)? {
                None => SqlValue::Null,
                Some(v) => i64::try_from(v).map_or_else(|_| SqlValue::Text(v.to_string()), SqlValue::Int),
            }
        }
        name if name.contains("INT") => row
            .try_get::<Option<i64>, _>(idx)
            .map_err(decode)?
            .map_or(SqlValue::Null, SqlValue::Int),
        "FLOAT" => row
            .try_get::<Option<f32>, _>(idx)
            .map_err(decode)?
            .map_or(SqlValue::Null, |v| SqlValue::Float(f64::from(v))),
        "DOUBLE" => row
            .try_get::<Option<f64>, _>(idx)
            .map_err(decode)?
            .map_or(SqlValue::Null, SqlValue::Float),
        // exact representation, as the server renders it
        "DECIMAL" => row
            .try_get_unchecked::<Option<String>, _>(idx)
            .map_err(decode)?
            .map_or(SqlValue::Null, SqlValue::Text),
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)
            .map_err(decode)?
            .map_or(SqlValue::Null, SqlValue::Timestamp),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(idx)
            .map_err(decode)?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(SqlValue::Null, SqlValue::Timestamp),
        "JSON" => row
            .try_get::<Option<JsonValue>, _>(idx)
            .map_err(decode)?
            .map_or(SqlValue::Null, SqlValue::Json),
        name if name.contains("BLOB") || name.contains("BINARY") => row
            .try_get::<Option<Vec<u8>>, _>(idx)
            .map_err(decode)?
            .map_or(SqlValue::Null, SqlValue::Blob),
        _ => row
            .try_get_unchecked::<Option<String>, _>(idx)
            .map_err(decode)?
            .map_or(SqlValue::Null, SqlValue::Text),
    };
    Ok(value)
}
