use anyhow::Result;
use catalog_service::{
    app::{app_state::AppState, bootstrap, config, db},
    routes,
    store::PgCatalogStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_env();
    bootstrap::init_tracing();

    let config = config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(db::MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let pool = db::create_pool(&config.database).await?;
    let app = routes::app(AppState::new(PgCatalogStore::new(pool)));

    tracing::info!("Bootstrapping...");
    bootstrap::serve("CatalogService", app, &config.server).await
}
