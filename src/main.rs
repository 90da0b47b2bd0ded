use std::sync::Arc;

use anyhow::Result;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use mealcare_orderservice::{
    consumers,
    notifications::{events::ORDER_STATUS_CHANGED, mailer::LogMailer},
    platform::{
        app_state::AppState,
        bootstrap::{self, bootstrap},
        config, db,
    },
    repository::{Repository, postgres::PgRepository},
    routes,
};

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let config = config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let pool = db::connect(&config.database).await?;
    let repo: Arc<dyn Repository> = Arc::new(PgRepository::new(pool.clone()));
    let state = AppState::new(repo, config, Arc::new(LogMailer));
    let app = routes::app(state.clone());

    tracing::info!("Bootstrapping...");
    bootstrap(
        "OrderService",
        app,
        state,
        pool,
        &[(
            ORDER_STATUS_CHANGED,
            consumers::notifications::order_status_changed,
        )],
    )
    .await?;
    Ok(())
}
