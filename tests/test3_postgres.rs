#![cfg(feature = "test-utils-postgres")]

mod common;

use std::time::Duration;

use serde::Deserialize;
use sql_scoped::prelude::*;
use sql_scoped::test_utils::test_pool;

use common::TestDatabase;

type Sandboxed = SandboxedDriver<PostgresDriver>;

#[derive(Debug, Deserialize, PartialEq)]
struct City {
    id: i64,
    name: String,
}

async fn create_cities(tx: &mut Client<'_, Sandboxed>) -> Result<(), SqlScopedError> {
    tx.run_query(
        "create table cities (id bigserial primary key, name text not null)",
        &[],
    )
    .await?;
    Ok(())
}

async fn count_cities(tx: &mut Client<'_, Sandboxed>) -> Result<i64, SqlScopedError> {
    let row = tx
        .run_query_exactly_one("select count(*) as n from cities", &[])
        .await?;
    row.get("n")
        .and_then(SqlValue::as_int)
        .ok_or_else(|| SqlScopedError::DecodeError("count is not an integer".into()))
}

async fn empty_and_filled_table(tx: &mut Client<'_, Sandboxed>) -> Result<(), SqlScopedError> {
    create_cities(tx).await?;

    let empty = tx.run_query("select * from cities", &[]).await?;
    assert!(empty.rows.is_empty());

    let err = tx
        .run_query_one("select * from \"cities\"", &[])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SqlScopedError::NotFound {
            sql: "select * from \"cities\"".into(),
            parameters: vec![],
        }
    );

    for name in ["Oslo", "Lima"] {
        let inserted = tx
            .run_query(
                "insert into cities (name) values ($1)",
                &[SqlValue::from(name)],
            )
            .await?;
        assert_eq!(inserted.row_count, Some(1));
    }

    let first = tx.run_query("select * from cities order by id", &[]).await?;
    let second = tx.run_query("select * from cities order by id", &[]).await?;
    assert_eq!(first.rows.len(), 2);
    assert_eq!(first.rows, second.rows);

    let cities = first.deserialize_rows::<City>()?;
    assert_eq!(cities.rows[0].name, "Oslo");
    assert!(cities.rows[0].id < cities.rows[1].id);

    let err = tx
        .run_query_exactly_one("select * from cities", &[])
        .await
        .unwrap_err();
    assert!(err.is_too_many());
    Ok(())
}

async fn nested_rollback_keeps_outer_work(
    tx: &mut Client<'_, Sandboxed>,
) -> Result<(), SqlScopedError> {
    create_cities(tx).await?;

    tx.transaction(TransactionOptions::default(), |outer| {
        Box::pin(async move {
            outer
                .run_query(
                    "insert into cities (name) values ($1)",
                    &[SqlValue::from("Oslo")],
                )
                .await?;
            let before = count_cities(outer).await?;

            let failed = outer
                .transaction(TransactionOptions::default(), |inner| {
                    Box::pin(async move {
                        inner
                            .run_query(
                                "insert into cities (name) values ($1)",
                                &[SqlValue::from("Lima")],
                            )
                            .await?;
                        inner
                            .run_query("insert into cities (name) values (null)", &[])
                            .await?;
                        Ok::<_, SqlScopedError>(())
                    })
                })
                .await
                .unwrap_err();
            let db = failed.as_database_error().unwrap();
            assert_eq!(db.name(), "QueryError");
            assert_eq!(db.code.as_deref(), Some("23502"));

            assert_eq!(count_cities(outer).await?, before);
            Ok::<_, SqlScopedError>(())
        })
    })
    .await?;

    assert_eq!(count_cities(tx).await?, 1);
    Ok(())
}

#[tokio::test]
async fn postgres_scenarios() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let db = TestDatabase::start().await?;
    let pool = test_pool(SandboxedDriver::new(PostgresDriver::new()), &db.url);

    pool.transaction(None, TransactionOptions::default(), |tx| {
        Box::pin(empty_and_filled_table(tx))
    })
    .await?;
    pool.transaction(None, TransactionOptions::default(), |tx| {
        Box::pin(nested_rollback_keeps_outer_work(tx))
    })
    .await?;

    // sandboxed transactions leave nothing behind
    let err = pool
        .run_query(None, "select * from cities", &[])
        .await
        .unwrap_err();
    assert_eq!(err.as_database_error().unwrap().code.as_deref(), Some("42P01"));

    let level = pool
        .transaction(
            None,
            TransactionOptions::isolation(IsolationLevel::Serializable),
            |tx| {
                Box::pin(async move {
                    tx.run_query_one("show transaction isolation level", &[])
                        .await
                })
            },
        )
        .await?;
    assert_eq!(
        level.get("transaction_isolation"),
        Some(&SqlValue::from("serializable"))
    );

    db.stop().await;
    Ok(())
}

#[tokio::test]
async fn postgres_values_round_trip() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let db = TestDatabase::start().await?;
    let pool = test_pool(PostgresDriver::new(), &db.url).with_after_query_hook(CamelCaseColumns);

    let row = pool
        .run_query_exactly_one(
            None,
            "select $1::int4 as small_int, $2::float4 as ratio, $3::text as city_name, \
             $4::jsonb as payload, $5::bool as is_capital, $6::bytea as raw_bytes, \
             null::text as nothing",
            &[
                SqlValue::Int(42),
                SqlValue::Float(0.5),
                SqlValue::from("Oslo"),
                SqlValue::Json(serde_json::json!({"population": 700000})),
                SqlValue::Bool(true),
                SqlValue::Blob(vec![1, 2, 3]),
            ],
        )
        .await?;

    assert_eq!(row.get("smallInt"), Some(&SqlValue::Int(42)));
    assert_eq!(row.get("ratio"), Some(&SqlValue::Float(0.5)));
    assert_eq!(row.get("cityName"), Some(&SqlValue::from("Oslo")));
    assert_eq!(
        row.get("payload"),
        Some(&SqlValue::Json(serde_json::json!({"population": 700000})))
    );
    assert_eq!(row.get("isCapital"), Some(&SqlValue::Bool(true)));
    assert_eq!(row.get("rawBytes"), Some(&SqlValue::Blob(vec![1, 2, 3])));
    assert_eq!(row.get("nothing"), Some(&SqlValue::Null));

    // a dropped transaction does not leak into the next checkout
    let cancelled = tokio::time::timeout(
        Duration::from_millis(200),
        pool.transaction(None, TransactionOptions::default(), |tx| {
            Box::pin(async move {
                tx.run_query("select 1 from pg_sleep(5)", &[]).await?;
                Ok::<_, SqlScopedError>(())
            })
        }),
    )
    .await;
    assert!(cancelled.is_err());

    db.stop().await;
    Ok(())
}
