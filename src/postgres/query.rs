use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tokio_postgres::{Row as PgRow, Statement};

use crate::error::DatabaseError;
use crate::results::QueryResult;
use crate::types::SqlValue;

/// Build a result using statement metadata for column names, so empty results keep them too.
///
/// # Errors
/// Returns a `Query` kind [`DatabaseError`] if a column cannot be decoded.
pub fn build_result(stmt: &Statement, rows: &[PgRow]) -> Result<QueryResult, DatabaseError> {
    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let column_count = column_names.len();

    let mut values = Vec::with_capacity(rows.len());
    for row in rows {
        let mut row_values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            row_values.push(postgres_extract_value(row, idx)?);
        }
        values.push(row_values);
    }

    Ok(QueryResult::from_rows(column_names, values))
}

/// Extracts a [`SqlValue`] from a `tokio_postgres` row at the given index.
///
/// # Errors
/// Returns a `Query` kind [`DatabaseError`] if the column cannot be read as its declared type.
pub fn postgres_extract_value(row: &PgRow, idx: usize) -> Result<SqlValue, DatabaseError> {
    let type_info = row.columns()[idx].type_();
    let decode = |e: tokio_postgres::Error| {
        DatabaseError::query(
            None,
            format!(
                "cannot decode column \"{}\" of type {}: {e}",
                row.columns()[idx].name(),
                type_info.name()
            ),
        )
    };

    let value = match type_info.name() {
        "int2" => {
            let val: Option<i16> = row.try_get(idx).map_err(decode)?;
            val.map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v)))
        }
        "int4" => {
            let val: Option<i32> = row.try_get(idx).map_err(decode)?;
            val.map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v)))
        }
        "int8" => {
            let val: Option<i64> = row.try_get(idx).map_err(decode)?;
            val.map_or(SqlValue::Null, SqlValue::Int)
        }
        "float4" => {
            let val: Option<f32> = row.try_get(idx).map_err(decode)?;
            val.map_or(SqlValue::Null, |v| SqlValue::Float(f64::from(v)))
        }
        "float8" => {
            let val: Option<f64> = row.try_get(idx).map_err(decode)?;
            val.map_or(SqlValue::Null, SqlValue::Float)
        }
        "bool" => {
            let val: Option<bool> = row.try_get(idx).map_err(decode)?;
            val.map_or(SqlValue::Null, SqlValue::Bool)
        }
        "timestamp" => {
            let val: Option<NaiveDateTime> = row.try_get(idx).map_err(decode)?;
            val.map_or(SqlValue::Null, SqlValue::Timestamp)
        }
        "timestamptz" => {
            let val: Option<DateTime<Utc>> = row.try_get(idx).map_err(decode)?;
            val.map_or(SqlValue::Null, |v| SqlValue::Timestamp(v.naive_utc()))
        }
        "date" => {
            let val: Option<NaiveDate> = row.try_get(idx).map_err(decode)?;
            val.and_then(|d| d.and_hms_opt(0, 0, 0))
                .map_or(SqlValue::Null, SqlValue::Timestamp)
        }
        "json" | "jsonb" => {
            let val: Option<Value> = row.try_get(idx).map_err(decode)?;
            val.map_or(SqlValue::Null, SqlValue::Json)
        }
        "bytea" => {
            let val: Option<Vec<u8>> = row.try_get(idx).map_err(decode)?;
            val.map_or(SqlValue::Null, SqlValue::Blob)
        }
        // text, varchar, bpchar, name, and anything else that reads as a string
        _ => {
            let val: Option<String> = row.try_get(idx).map_err(decode)?;
            val.map_or(SqlValue::Null, SqlValue::Text)
        }
    };
    Ok(value)
}
