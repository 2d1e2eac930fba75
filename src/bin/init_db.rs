//! Initialize the database: apply the schema, seed the demo catalog and run
//! one refresh pass so the API has rankings to serve.
//!
//! Usage:
//!   cargo run --bin init_db

use dotenv::dotenv;
use idolrank::pipeline::{
    config::AppConfig,
    runtime::{build_ingestor, open_store},
    seed::seed_catalog,
    RankingStore,
};
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 Initializing idolrank database...");

    let config = AppConfig::from_env()?;
    let store: Arc<dyn RankingStore> = open_store(&config)?;
    info!("✅ Schema applied to {}", config.db_path);

    let seeded = seed_catalog(store.as_ref()).await?;
    if seeded == 0 {
        info!("✅ Nothing to seed");
        return Ok(());
    }

    info!("🔄 Generating initial metrics...");
    let report = build_ingestor(&config, store)?.refresh_all().await?;
    info!("✅ Database initialization completed");
    info!("   ├─ Idols: {}", seeded);
    info!("   ├─ Observations: {}", report.observations_written);
    info!("   ├─ Trend points: {}", report.trend_points_written);
    info!("   └─ Ranking rows: {}", report.rankings_written);

    Ok(())
}
