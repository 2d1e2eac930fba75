//! One refresh pass (ingestion + ranking), then exit. Suitable for cron.
//!
//! Usage:
//!   cargo run --release --bin refresh

use dotenv::dotenv;
use idolrank::pipeline::{
    config::AppConfig,
    runtime::{build_ingestor, open_store},
};
use log::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let store = open_store(&config)?;
    let ingestor = build_ingestor(&config, store)?;

    let report = ingestor.refresh_all().await?;
    info!("📊 {}", serde_json::to_string(&report)?);

    Ok(())
}
