#![allow(dead_code)]

use sql_scoped::test_utils::postgres::{
    EmbeddedPostgres, setup_postgres_embedded, stop_postgres_embedded,
};

/// A Postgres server for one test: `DATABASE_URL` when set, an embedded instance otherwise.
pub struct TestDatabase {
    pub url: String,
    embedded: Option<EmbeddedPostgres>,
}

impl TestDatabase {
    pub async fn start() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            return Ok(Self {
                url,
                embedded: None,
            });
        }
        let embedded = setup_postgres_embedded("sql_scoped_test").await?;
        Ok(Self {
            url: embedded.database_url.clone(),
            embedded: Some(embedded),
        })
    }

    pub async fn stop(self) {
        if let Some(embedded) = self.embedded {
            stop_postgres_embedded(embedded).await;
        }
    }
}
