//! Populate the database with dummy data.
use anyhow::Result;
use catalog_service::{
    app::{bootstrap, config, db},
    auth::PasswordHasher,
    seed::{self, SeedOptions},
    store::PgCatalogStore,
};
use clap::Parser;

/// `populate_data` command arguments.
#[derive(Debug, Parser)]
#[command(
    name = "populate_data",
    about = "Populate the database with dummy users, products and an order",
    version
)]
struct Args {
    /// Also create a staff account `admin` with password `admin`.
    #[arg(long)]
    with_admin: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    bootstrap::init_env();
    bootstrap::init_tracing();

    let config = config::load()?;
    let migrations_count = db::run_migrations_blocking(db::MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let store = PgCatalogStore::new(db::create_pool(&config.database).await?);
    let summary = seed::populate(
        &store,
        &PasswordHasher::default(),
        SeedOptions {
            with_admin: args.with_admin,
        },
    )
    .await?;

    tracing::info!(
        order_id = %summary.order_id,
        "Successfully populated the database with dummy data"
    );
    Ok(())
}
