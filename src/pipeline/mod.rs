//! # Ranking pipeline
//!
//! Ingests per-idol metrics, turns trend feeds into scores and ranks idols.
//!
//! ## Data flow
//!
//! 1. A trigger (`POST /api/refresh-data` or the scheduler) calls
//!    `Ingestor::refresh_all`
//! 2. Each active data source is fetched for every active idol; readings are
//!    written to `observations`
//! 3. Trend feeds are pulled; matched entries are written to `trend_points`
//! 4. `RankingAggregator::recalculate` averages the last 30 days of trend
//!    points per idol, adds noise, clamps, sorts and writes a new run to
//!    `ranking_runs` / `ranking_snapshots`
//!
//! Read endpoints only query the persisted tables (`views`).
//!
//! ## Schema Reference
//!
//! All row types match the SQL schema in `/sql/`:
//! - `groups`, `idols` → `Group`, `Idol`
//! - `data_sources` → `DataSource`
//! - `observations` → `Observation`
//! - `trend_points` → `TrendPoint`
//! - `ranking_runs`, `ranking_snapshots` → `RankingRun`, `RankingSnapshot`
//!
//! ## Module Organization
//!
//! - `types` - Row types and score bounds
//! - `config` - Environment configuration
//! - `db` - Connection setup and schema loader
//! - `store` - `RankingStore` trait and SQLite implementation
//! - `sources` - Per-idol metric sources and catalogs
//! - `feeds` - Trend feeds
//! - `aggregator` - Score computation and rank assignment
//! - `ingestion` - Refresh pass
//! - `scheduler` - Periodic refresh task
//! - `runtime` - Store/ingestor wiring for the binaries
//! - `views` - Read models for the API
//! - `seed` - Demo catalog

pub mod aggregator;
pub mod config;
pub mod db;
pub mod feeds;
pub mod ingestion;
pub mod runtime;
pub mod scheduler;
pub mod seed;
pub mod sources;
pub mod store;
pub mod types;
pub mod views;

// Re-export commonly used types
pub use aggregator::{GaussianNoise, NoNoise, RankingAggregator, ScoreNoise};
pub use config::{AppConfig, ConfigError};
pub use feeds::{sample_feeds, FeedEntry, TrendFeed};
pub use ingestion::{Ingestor, RefreshReport};
pub use sources::{BuiltinSourceCatalog, MetricSource, SourceCatalog, SourceError};
pub use store::{RankingStore, SqliteRankingStore, StoreError};
pub use types::{Group, Idol, Observation, RankingSnapshot, TrendPoint, OVERALL_CATEGORY};
