//! Metric ingestion - one best-effort pass over every active source
//!
//! Pass layout:
//! 1. Resolve each active `data_sources` row through the `SourceCatalog`
//! 2. Fetch readings for every active idol, store each as an Observation
//! 3. Pull every trend feed, store matched entries as TrendPoints
//! 4. Run the aggregator once
//!
//! Nothing is retried. A source-wide error (missing credentials, source
//! offline, auth or quota status) drops the rest of that source; any other
//! fetch error drops only the current idol. Observations are committed one
//! by one, so an interrupted pass keeps what it already wrote.

use super::aggregator::RankingAggregator;
use super::feeds::TrendFeed;
use super::sources::{MetricSource, SourceCatalog};
use super::store::{RankingStore, StoreError};
use super::types::{DataSource, Idol, Observation, SourceKind, TrendPoint};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one refresh pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub observations_written: usize,
    pub trend_points_written: usize,
    pub sources_attempted: usize,
    /// Unknown kind or no matching implementation
    pub sources_skipped: usize,
    /// Aborted by a source-wide error
    pub sources_failed: usize,
    pub rankings_written: usize,
}

pub struct Ingestor {
    store: Arc<dyn RankingStore>,
    catalog: Arc<dyn SourceCatalog>,
    feeds: Vec<Arc<dyn TrendFeed>>,
    aggregator: RankingAggregator,
    fetch_delay: Duration,
    // Serialises passes started by the scheduler and by the API
    pass_lock: tokio::sync::Mutex<()>,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn RankingStore>,
        catalog: Arc<dyn SourceCatalog>,
        feeds: Vec<Arc<dyn TrendFeed>>,
        aggregator: RankingAggregator,
        fetch_delay: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            feeds,
            aggregator,
            fetch_delay,
            pass_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one full pass: sources, feeds, then ranking recalculation
    ///
    /// Only a failure to list sources or idols is returned as an error.
    pub async fn refresh_all(&self) -> Result<RefreshReport, StoreError> {
        let _pass = self.pass_lock.lock().await;
        let started = std::time::Instant::now();

        let data_sources = self.store.active_data_sources().await?;
        let idols = self.store.active_idols().await?;

        log::info!("🔄 Refresh pass started");
        log::info!("   ├─ Active sources: {}", data_sources.len());
        log::info!("   └─ Active idols: {}", idols.len());

        let mut report = RefreshReport::default();

        for data_source in &data_sources {
            report.sources_attempted += 1;

            let Some(kind) = data_source.kind else {
                log::warn!("⚠️  Skipping source '{}': unknown kind", data_source.name);
                report.sources_skipped += 1;
                continue;
            };

            let Some(source) = self.catalog.resolve(data_source) else {
                log::warn!(
                    "⚠️  Skipping source '{}': no {} implementation matches",
                    data_source.name,
                    kind.as_str()
                );
                report.sources_skipped += 1;
                continue;
            };

            match self.collect_source(data_source, source.as_ref(), &idols).await {
                Ok(written) => {
                    report.observations_written += written;
                    let now = chrono::Utc::now().timestamp();
                    if let Err(e) = self.store.touch_data_source(data_source.id, now).await {
                        log::error!("❌ Failed to stamp source '{}': {}", data_source.name, e);
                    }
                    log::info!("   ├─ {}: {} observations", data_source.name, written);
                }
                Err(written) => {
                    report.observations_written += written;
                    report.sources_failed += 1;
                }
            }
        }

        report.trend_points_written = self.collect_feeds().await;

        let now = chrono::Utc::now().timestamp();
        match self.aggregator.recalculate(now).await {
            Ok(rows) => report.rankings_written = rows,
            Err(e) => log::error!("❌ Ranking recalculation failed: {}", e),
        }

        log::info!(
            "✅ Refresh pass done in {:.2}s: {} observations, {} trend points, {} ranking rows ({} sources failed, {} skipped)",
            started.elapsed().as_secs_f64(),
            report.observations_written,
            report.trend_points_written,
            report.rankings_written,
            report.sources_failed,
            report.sources_skipped
        );

        Ok(report)
    }

    /// Fetch one source for every idol
    ///
    /// `Err` carries the count written before a source-wide error stopped
    /// the source.
    async fn collect_source(
        &self,
        data_source: &DataSource,
        source: &dyn MetricSource,
        idols: &[Idol],
    ) -> Result<usize, usize> {
        let mut written = 0;

        for idol in idols {
            let result = source.fetch(idol).await;

            if source.kind() == SourceKind::Api && !self.fetch_delay.is_zero() {
                tokio::time::sleep(self.fetch_delay).await;
            }

            let readings = match result {
                Ok(readings) => readings,
                Err(e) if e.is_source_wide() => {
                    log::warn!("⚠️  Source '{}' skipped: {}", data_source.name, e);
                    return Err(written);
                }
                Err(e) => {
                    log::warn!(
                        "⚠️  Source '{}' failed for {}: {}",
                        data_source.name,
                        idol.name,
                        e
                    );
                    continue;
                }
            };

            let recorded_at = chrono::Utc::now().timestamp();
            for reading in readings {
                let observation = Observation {
                    idol_id: idol.id,
                    metric_type: reading.metric_type,
                    value: reading.value,
                    source: source.name().to_string(),
                    recorded_at,
                };

                match self.store.insert_observation(&observation).await {
                    Ok(_) => written += 1,
                    Err(e) => log::error!(
                        "❌ Failed to store {} for {}: {}",
                        observation.metric_type,
                        idol.name,
                        e
                    ),
                }
            }
        }

        Ok(written)
    }

    /// Pull every feed and store entries whose artist names an idol
    async fn collect_feeds(&self) -> usize {
        let mut written = 0;
        let mut idol_ids: HashMap<String, Option<i64>> = HashMap::new();

        for feed in &self.feeds {
            let entries = match feed.fetch().await {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("⚠️  Feed '{}' skipped: {}", feed.name(), e);
                    continue;
                }
            };

            let recorded_at = chrono::Utc::now().timestamp();
            let mut matched = 0;

            for entry in entries {
                let idol_id = match idol_ids.get(&entry.artist) {
                    Some(cached) => *cached,
                    None => {
                        let found = match self.store.find_idol_by_name(&entry.artist).await {
                            Ok(found) => found.map(|idol| idol.id),
                            Err(e) => {
                                log::error!("❌ Idol lookup failed for {}: {}", entry.artist, e);
                                continue;
                            }
                        };
                        idol_ids.insert(entry.artist.clone(), found);
                        found
                    }
                };

                let Some(idol_id) = idol_id else {
                    log::debug!("   ├─ {}: no idol named '{}'", feed.name(), entry.artist);
                    continue;
                };

                let point = TrendPoint {
                    idol_id,
                    category: entry.category,
                    score: entry.score,
                    rank: entry.rank,
                    recorded_at,
                };

                match self.store.insert_trend_point(&point).await {
                    Ok(_) => {
                        written += 1;
                        matched += 1;
                    }
                    Err(e) => log::error!("❌ Failed to store trend point for {}: {}", entry.artist, e),
                }
            }

            log::info!("   ├─ Feed {}: {} trend points", feed.name(), matched);
        }

        written
    }
}
