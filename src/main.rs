use formulary::repositories::EntityStore;
use formulary::repositories::filter::FilterMap;
use formulary::{AppConfig, DatabaseManager, RepositoryRegistry};
use tracing::info;
use tracing_subscriber::{EnvFilter, prelude::*};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(
            tracing_subscriber::fmt::layer()
                .with_line_number(true)
                .with_file(true),
        )
        .init();

    let config = AppConfig::from_env()?;
    let db = DatabaseManager::new(&config.database_url()).await?;
    db.run_migrations().await?;

    let registry = RepositoryRegistry::with_options(db, config.repository_options());

    let formulation_count = registry.formulations().count(&FilterMap::new()).await?;
    let ingredient_count = registry.ingredients().count(&FilterMap::new()).await?;
    info!(
        formulation_count,
        ingredient_count,
        db_path = %config.database_path.display(),
        "formulary data backend ready"
    );

    Ok(())
}
