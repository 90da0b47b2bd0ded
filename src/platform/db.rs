use anyhow::{Context, Result, anyhow};
use diesel::{Connection, PgConnection};
use diesel_async::{
    AsyncPgConnection,
    pooled_connection::{AsyncDieselConnectionManager, bb8::Pool},
};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness};

use super::config::DatabaseConfig;

pub type DbPool = Pool<AsyncPgConnection>;

pub async fn connect(config: &DatabaseConfig) -> Result<DbPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.url);

    Pool::builder()
        .max_size(config.max_connections)
        .build(manager)
        .await
        .context("Failed to build the DB connection pool")
}

/// Applies pending migrations on a dedicated sync connection and returns how many ran.
pub async fn run_migrations_blocking(
    migrations: EmbeddedMigrations,
    database_url: &str,
) -> Result<usize> {
    let database_url = database_url.to_string();

    tokio::task::spawn_blocking(move || -> Result<usize> {
        let mut conn = PgConnection::establish(&database_url)
            .context("Failed to connect to the database for migrations")?;
        let applied = conn
            .run_pending_migrations(migrations)
            .map_err(|err| anyhow!("Failed to run migrations: {err}"))?;
        Ok(applied.len())
    })
    .await
    .context("Migration task panicked")?
}
