//! idolrank server - HTTP API plus optional refresh scheduler
//!
//! Usage:
//!   cargo run --release --bin idolrank_server
//!
//! Environment variables: see `AppConfig::from_env`. Most relevant:
//!   IDOLRANK_DB_PATH - SQLite database path (default: data/idolrank.db)
//!   IDOLRANK_BIND_ADDR - Listen address (default: 0.0.0.0:8000)
//!   REFRESH_INTERVAL_SECS - Scheduled refresh interval, 0 disables (default: 0)

use dotenv::dotenv;
use idolrank::api::{self, AppState};
use idolrank::pipeline::{
    config::AppConfig,
    runtime::{build_ingestor, open_store},
    scheduler::refresh_scheduler_task,
    seed::seed_catalog,
    RankingStore,
};
use log::{error, info};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 idolrank server");
    info!("   └─ Version: {}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::from_env()?;

    info!("✅ Configuration loaded");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Bind address: {}", config.bind_addr);
    info!("   ├─ Refresh interval: {}s", config.refresh_interval_secs);
    info!("   ├─ Ranking window: {}d", config.window_days);
    info!("   ├─ Noise stddev: {}", config.noise_stddev);
    info!("   └─ Categories: overall,{}", config.ranking_categories.join(","));

    info!("🔧 Initializing database...");
    let store = open_store(&config)?;
    let store: Arc<dyn RankingStore> = store;

    if config.seed_catalog {
        let seeded = seed_catalog(store.as_ref()).await?;
        if seeded > 0 {
            info!("🌱 Seeded demo catalog ({} idols)", seeded);
        }
    }
    info!("✅ Database initialized");

    let ingestor = Arc::new(build_ingestor(&config, store.clone())?);

    let scheduler_ingestor = ingestor.clone();
    let interval_secs = config.refresh_interval_secs;
    tokio::spawn(async move {
        refresh_scheduler_task(scheduler_ingestor, interval_secs).await;
    });

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("🌐 HTTP API listening on {}", listener.local_addr()?);

    let state = AppState::new(store, ingestor);

    tokio::select! {
        result = api::serve(listener, state) => {
            if let Err(e) = result {
                error!("❌ HTTP server error: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Received shutdown signal, stopping...");
        }
    }

    Ok(())
}
