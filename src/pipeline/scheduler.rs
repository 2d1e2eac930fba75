//! Periodic refresh scheduler

use super::ingestion::Ingestor;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Refresh scheduler task - run a full ingestion pass every `interval_secs`
///
/// The first pass starts one full interval after launch. Failed passes are
/// logged and the loop keeps going.
///
/// This function runs indefinitely until cancelled.
pub async fn refresh_scheduler_task(ingestor: Arc<Ingestor>, interval_secs: u64) {
    if interval_secs == 0 {
        log::info!("⏰ Refresh scheduler disabled (REFRESH_INTERVAL_SECS=0)");
        return;
    }

    log::info!("⏰ Starting refresh scheduler (interval: {}s)", interval_secs);

    let mut timer = interval(Duration::from_secs(interval_secs));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    timer.tick().await;

    loop {
        timer.tick().await;

        match ingestor.refresh_all().await {
            Ok(report) => {
                log::debug!("✅ Scheduled refresh: {:?}", report);
            }
            Err(e) => {
                log::error!("❌ Scheduled refresh failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::aggregator::{NoNoise, RankingAggregator};
    use crate::pipeline::sources::StaticSourceCatalog;
    use crate::pipeline::store::tests::create_test_store;
    use crate::pipeline::store::RankingStore;
    use crate::pipeline::types::NewIdol;

    #[tokio::test]
    async fn test_disabled_scheduler_returns() {
        let (_temp, store) = create_test_store();
        let store = Arc::new(store);
        let aggregator = RankingAggregator::new(store.clone(), Arc::new(NoNoise), 30, Vec::new());
        let ingestor = Arc::new(Ingestor::new(
            store,
            Arc::new(StaticSourceCatalog::new()),
            Vec::new(),
            aggregator,
            Duration::ZERO,
        ));

        // Would never return if the loop started
        tokio::time::timeout(Duration::from_secs(1), refresh_scheduler_task(ingestor, 0))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_runs_passes() {
        let (_temp, store) = create_test_store();
        store.create_idol(NewIdol::named("TWICE")).await.unwrap();
        let store = Arc::new(store);

        let aggregator = RankingAggregator::new(store.clone(), Arc::new(NoNoise), 30, Vec::new());
        let ingestor = Arc::new(Ingestor::new(
            store.clone(),
            Arc::new(StaticSourceCatalog::new()),
            Vec::new(),
            aggregator,
            Duration::ZERO,
        ));

        let handle = tokio::spawn(refresh_scheduler_task(ingestor, 60));

        // Paused clock: sleeping auto-advances through two intervals
        tokio::time::sleep(Duration::from_secs(125)).await;
        handle.abort();

        assert_eq!(store.platform_counts().await.unwrap().ranking_runs, 2);
    }
}
