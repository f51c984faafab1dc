use postgresql_embedded::PostgreSQL;
use tracing::info;

use crate::driver::Driver;
use crate::postgres::PostgresDriver;

/// A running embedded `PostgreSQL` instance.
pub struct EmbeddedPostgres {
    pub postgresql: PostgreSQL,
    pub port: u16,
    pub database_url: String,
}

/// Start an embedded `PostgreSQL` instance with a fresh database named `db_name`.
///
/// # Errors
/// Returns an error if the server cannot be set up or started, the database cannot be
/// created, or the post-start connectivity check fails.
pub async fn setup_postgres_embedded(
    db_name: &str,
) -> Result<EmbeddedPostgres, Box<dyn std::error::Error + Send + Sync>> {
    let mut postgresql = PostgreSQL::default();
    postgresql.setup().await?;
    postgresql.start().await?;
    postgresql.create_database(db_name).await?;

    let settings = postgresql.settings();
    let port = settings.port;
    let database_url = format!(
        "postgres://{}:{}@{}:{port}/{db_name}",
        settings.username, settings.password, settings.host
    );

    // quick connectivity check
    let driver = PostgresDriver::new();
    let mut client = driver.connect(&database_url).await?;
    driver.run_query(&mut client, "select 1", &[]).await?;
    driver.disconnect(client).await?;
    info!(port, "embedded postgres started");

    Ok(EmbeddedPostgres {
        postgresql,
        port,
        database_url,
    })
}

/// Stop a previously started embedded `PostgreSQL` instance.
pub async fn stop_postgres_embedded(postgres: EmbeddedPostgres) {
    let EmbeddedPostgres { postgresql, .. } = postgres;
    let _ = postgresql.stop().await;
}
