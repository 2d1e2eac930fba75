//! Wiring shared by the binaries: store and ingestor from an `AppConfig`

use super::aggregator::{GaussianNoise, RankingAggregator};
use super::config::AppConfig;
use super::db::{open_connection, run_schema_migrations};
use super::feeds::sample_feeds;
use super::ingestion::Ingestor;
use super::sources::BuiltinSourceCatalog;
use super::store::{RankingStore, SqliteRankingStore};
use std::error::Error;
use std::sync::Arc;

/// Open the database, apply the schema and wrap it in a store
pub fn open_store(config: &AppConfig) -> Result<Arc<SqliteRankingStore>, Box<dyn Error>> {
    let mut conn = open_connection(&config.db_path)?;
    run_schema_migrations(&mut conn, &config.schema_dir)?;
    Ok(Arc::new(SqliteRankingStore::from_connection(conn)))
}

/// Ingestor over the built-in sources and sample feeds
pub fn build_ingestor(
    config: &AppConfig,
    store: Arc<dyn RankingStore>,
) -> Result<Ingestor, Box<dyn Error>> {
    let noise = GaussianNoise::new(config.noise_stddev)?;
    let aggregator = RankingAggregator::new(
        store.clone(),
        Arc::new(noise),
        config.window_days,
        config.ranking_categories.clone(),
    );

    Ok(Ingestor::new(
        store,
        Arc::new(BuiltinSourceCatalog::new()?),
        sample_feeds(),
        aggregator,
        config.fetch_delay(),
    ))
}
