//! Ranking aggregator
//!
//! For each active idol: mean of the TrendPoints recorded in the window,
//! plus noise, clamped to [0, 100]. Idols without points score 0. Scores are
//! sorted descending (stable, so ties keep store order) and numbered 1..N.
//!
//! One run writes the "overall" set plus one set per configured category,
//! all under a single run id and timestamp.

use super::store::{RankingStore, StoreError};
use super::types::{clamp_score, NewSnapshot, TrendPoint, OVERALL_CATEGORY};
use rand_distr::{Distribution, Normal, NormalError};
use std::collections::HashMap;
use std::sync::Arc;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// First second of a `window_days` window ending at `now`
///
/// Saturates instead of overflowing, so an oversized window covers all history.
pub fn window_start(now: i64, window_days: i64) -> i64 {
    window_days
        .checked_mul(SECONDS_PER_DAY)
        .map_or(i64::MIN, |span| now.saturating_sub(span))
}

/// Perturbation added to every non-empty mean
pub trait ScoreNoise: Send + Sync {
    fn sample(&self) -> f64;
}

/// Normal(0, stddev) noise
pub struct GaussianNoise {
    dist: Normal<f64>,
}

impl GaussianNoise {
    pub fn new(stddev: f64) -> Result<Self, NormalError> {
        Ok(Self {
            dist: Normal::new(0.0, stddev)?,
        })
    }
}

impl ScoreNoise for GaussianNoise {
    fn sample(&self) -> f64 {
        self.dist.sample(&mut rand::thread_rng())
    }
}

pub struct NoNoise;

impl ScoreNoise for NoNoise {
    fn sample(&self) -> f64 {
        0.0
    }
}

/// Constant offset
pub struct FixedNoise(pub f64);

impl ScoreNoise for FixedNoise {
    fn sample(&self) -> f64 {
        self.0
    }
}

/// Position of one idol within one ranked set
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub idol_id: i64,
    pub rank: i64,
    pub score: f64,
}

/// Mean plus noise, clamped. An empty window scores exactly 0.
pub fn compute_score(scores: &[f64], noise: &dyn ScoreNoise) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    clamp_score(mean + noise.sample())
}

/// Sort descending by score and number from 1
pub fn assign_ranks(mut scored: Vec<(i64, f64)>) -> Vec<RankedEntry> {
    // sort_by is stable: equal scores keep their input order
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    scored
        .into_iter()
        .enumerate()
        .map(|(position, (idol_id, score))| RankedEntry {
            idol_id,
            rank: position as i64 + 1,
            score,
        })
        .collect()
}

pub struct RankingAggregator {
    store: Arc<dyn RankingStore>,
    noise: Arc<dyn ScoreNoise>,
    window_days: i64,
    categories: Vec<String>,
}

impl RankingAggregator {
    pub fn new(
        store: Arc<dyn RankingStore>,
        noise: Arc<dyn ScoreNoise>,
        window_days: i64,
        categories: Vec<String>,
    ) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for category in categories {
            if category != OVERALL_CATEGORY && !unique.contains(&category) {
                unique.push(category);
            }
        }

        Self {
            store,
            noise,
            window_days: window_days.max(1),
            categories: unique,
        }
    }

    /// Categories ranked by each run, "overall" first
    pub fn categories(&self) -> Vec<&str> {
        std::iter::once(OVERALL_CATEGORY)
            .chain(self.categories.iter().map(String::as_str))
            .collect()
    }

    /// Compute and persist one ranking run at `now` (Unix seconds)
    ///
    /// Returns the number of snapshot rows written. With no active idols
    /// nothing is written.
    pub async fn recalculate(&self, now: i64) -> Result<usize, StoreError> {
        let idols = self.store.active_idols().await?;
        if idols.is_empty() {
            log::warn!("⚠️  No active idols, skipping ranking run");
            return Ok(0);
        }

        let since = window_start(now, self.window_days);
        let points = self.store.trend_points_between(since, now).await?;

        let mut by_idol: HashMap<i64, Vec<&TrendPoint>> = HashMap::new();
        for point in &points {
            by_idol.entry(point.idol_id).or_default().push(point);
        }

        let mut snapshots = Vec::new();
        for category in self.categories() {
            let scored: Vec<(i64, f64)> = idols
                .iter()
                .map(|idol| {
                    let scores: Vec<f64> = by_idol
                        .get(&idol.id)
                        .map(|points| {
                            points
                                .iter()
                                .filter(|p| category == OVERALL_CATEGORY || p.category == category)
                                .map(|p| p.score)
                                .collect()
                        })
                        .unwrap_or_default();
                    (idol.id, compute_score(&scores, self.noise.as_ref()))
                })
                .collect();

            let ranked = assign_ranks(scored);
            log::debug!(
                "   ├─ {}: {} idols, top score {:.2}",
                category,
                ranked.len(),
                ranked.first().map(|r| r.score).unwrap_or(0.0)
            );

            snapshots.extend(ranked.into_iter().map(|entry| NewSnapshot {
                idol_id: entry.idol_id,
                category: category.to_string(),
                rank: entry.rank,
                score: entry.score,
            }));
        }

        let run = self.store.record_ranking_run(now, &snapshots).await?;

        log::info!(
            "🏆 Ranking run {} written: {} rows ({} idols, {} trend points in {}d window)",
            run.id,
            snapshots.len(),
            idols.len(),
            points.len(),
            self.window_days
        );

        Ok(snapshots.len())
    }
}
