//! Core data structures shared by ingestion, aggregation and the read API
//!
//! Timestamps are Unix seconds (UTC), matching the INTEGER columns in `/sql/`.

use serde::{Deserialize, Serialize};

/// Category label of the combined ranking produced by every aggregation run
pub const OVERALL_CATEGORY: &str = "overall";

/// Lower bound of any stored score
pub const MIN_SCORE: f64 = 0.0;

/// Upper bound of any stored score
pub const MAX_SCORE: f64 = 100.0;

/// Clamp a score into [0, 100]. Non-finite values collapse to 0.
pub fn clamp_score(score: f64) -> f64 {
    if !score.is_finite() {
        return MIN_SCORE;
    }
    score.clamp(MIN_SCORE, MAX_SCORE)
}

/// Group row (`groups` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub company: Option<String>,
    pub debut_date: Option<String>,
    pub is_active: bool,
    pub image_url: Option<String>,
    pub created_at: i64,
}

/// Input for creating a group
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub debut_date: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Ranked entity: a performer or a group act (`idols` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idol {
    pub id: i64,
    pub name: String,
    pub stage_name: Option<String>,
    pub real_name: Option<String>,
    pub group_id: Option<i64>,
    pub company: Option<String>,
    pub gender: Option<String>,
    pub position: Option<String>,
    pub birth_date: Option<String>,
    pub nationality: Option<String>,
    pub is_soloist: bool,
    pub is_active: bool,
    pub image_url: Option<String>,
    pub created_at: i64,
}

/// Input for creating an idol
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewIdol {
    pub name: String,
    #[serde(default)]
    pub stage_name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub is_soloist: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewIdol {
    /// Minimal active idol with just a name
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stage_name: Some(name.to_string()),
            is_active: true,
            ..Default::default()
        }
    }
}

fn default_true() -> bool {
    true
}

/// Filter for listing idols
#[derive(Debug, Clone, Default)]
pub struct IdolFilter {
    /// Exact group name
    pub group: Option<String>,
    pub gender: Option<String>,
}

/// Kind of a configured data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Api,
    Scrape,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Api => "api",
            SourceKind::Scrape => "scrape",
        }
    }

    /// Parse a stored kind label. `scraping` is accepted as an alias.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Some(SourceKind::Api),
            "scrape" | "scraping" => Some(SourceKind::Scrape),
            _ => None,
        }
    }
}

/// Configured external source (`data_sources` table)
///
/// `kind` is `None` when the stored label is not a known kind; such rows are
/// skipped by ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSource {
    pub id: i64,
    pub name: String,
    pub kind: Option<SourceKind>,
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub is_active: bool,
    pub last_updated: Option<i64>,
}

/// Input for registering a data source
#[derive(Debug, Clone)]
pub struct NewDataSource {
    pub name: String,
    pub kind: SourceKind,
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub is_active: bool,
}

impl NewDataSource {
    pub fn new(name: &str, kind: SourceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            url: None,
            api_key: None,
            is_active: true,
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }
}

/// One raw external measurement (append-only)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub idol_id: i64,
    pub metric_type: String,
    pub value: f64,
    pub source: String,
    pub recorded_at: i64,
}

/// One normalised [0, 100] score sample (append-only)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub idol_id: i64,
    pub category: String,
    pub score: f64,
    pub rank: Option<i64>,
    pub recorded_at: i64,
}

/// One aggregation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankingRun {
    pub id: i64,
    pub ranked_at: i64,
}

/// Snapshot row to be written as part of a run
#[derive(Debug, Clone, PartialEq)]
pub struct NewSnapshot {
    pub idol_id: i64,
    pub category: String,
    pub rank: i64,
    pub score: f64,
}

/// Persisted rank/score record for one idol at one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingSnapshot {
    pub id: i64,
    pub run_id: i64,
    pub idol_id: i64,
    pub category: String,
    pub rank: i64,
    pub score: f64,
    pub ranked_at: i64,
}

/// Aggregate platform counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlatformCounts {
    pub total_idols: i64,
    pub active_idols: i64,
    pub total_groups: i64,
    pub active_sources: i64,
    pub total_observations: i64,
    pub total_trend_points: i64,
    pub ranking_runs: i64,
    pub ranking_rows: i64,
    pub last_ranked_at: Option<i64>,
}
