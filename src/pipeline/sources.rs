//! Metric sources: per-idol fetchers behind the `MetricSource` trait
//!
//! Each active `data_sources` row is resolved to one implementation through a
//! `SourceCatalog`. The built-in catalog matches on the row's kind and on a
//! case-insensitive substring of its name:
//!
//! | kind     | name contains | implementation                         |
//! |----------|---------------|----------------------------------------|
//! | `api`    | youtube       | `YouTubeSource` (YouTube Data API v3)  |
//! | `api`    | spotify       | `SpotifySource` (Spotify Web API)      |
//! | `api`    | instagram     | simulated followers 100k..=5M          |
//! | `api`    | twitter       | simulated followers 50k..=2M           |
//! | `api`    | tiktok        | simulated followers 200k..=8M          |
//! | `scrape` | chart         | simulated melon / gaon chart scores    |
//! | `scrape` | brand         | simulated brand reputation score       |
//! | `scrape` | trend         | simulated google trends + mentions     |

use super::types::{DataSource, Idol, SourceKind};
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

const HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug)]
pub enum SourceError {
    /// Source needs credentials it does not have
    NotConfigured(String),
    Http(reqwest::Error),
    /// Non-success HTTP status
    Status(u16),
    /// Source is down or refused the whole pass
    Unavailable(String),
}

impl SourceError {
    /// Errors that make every further call to the same source pointless
    pub fn is_source_wide(&self) -> bool {
        match self {
            SourceError::NotConfigured(_) | SourceError::Unavailable(_) => true,
            SourceError::Status(code) => matches!(code, 401 | 403 | 429),
            SourceError::Http(_) => false,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Http(err)
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::NotConfigured(msg) => write!(f, "Source not configured: {}", msg),
            SourceError::Http(e) => write!(f, "HTTP error: {}", e),
            SourceError::Status(code) => write!(f, "Unexpected HTTP status: {}", code),
            SourceError::Unavailable(msg) => write!(f, "Source unavailable: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Http(e) => Some(e),
            _ => None,
        }
    }
}

/// One typed value returned by a source for one idol
#[derive(Debug, Clone, PartialEq)]
pub struct MetricReading {
    pub metric_type: String,
    pub value: f64,
}

impl MetricReading {
    pub fn new(metric_type: &str, value: f64) -> Self {
        Self {
            metric_type: metric_type.to_string(),
            value,
        }
    }
}

/// Pluggable per-idol metric fetcher
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Label stored in `observations.source`
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Fetch (or synthesize) readings for one idol. `Ok(vec![])` means the
    /// source has nothing for this idol.
    async fn fetch(&self, idol: &Idol) -> Result<Vec<MetricReading>, SourceError>;
}

/// Resolves configured data source rows to implementations
pub trait SourceCatalog: Send + Sync {
    fn resolve(&self, source: &DataSource) -> Option<Arc<dyn MetricSource>>;
}

// ============================================================================
// Simulated sources
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Synth {
    /// Uniform integer in `lo..=hi`
    Uniform { lo: u64, hi: u64 },
    /// `100 - rank` for a uniform rank in `1..=worst_rank`
    RankScore { worst_rank: u32 },
}

/// Random-valued stand-in for a platform without a usable API
pub struct SimulatedSource {
    name: String,
    kind: SourceKind,
    metrics: Vec<(&'static str, Synth)>,
}

impl SimulatedSource {
    fn new(name: &str, kind: SourceKind, metrics: Vec<(&'static str, Synth)>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            metrics,
        }
    }

    pub fn instagram(name: &str) -> Self {
        Self::new(
            name,
            SourceKind::Api,
            vec![("instagram_followers", Synth::Uniform { lo: 100_000, hi: 5_000_000 })],
        )
    }

    pub fn twitter(name: &str) -> Self {
        Self::new(
            name,
            SourceKind::Api,
            vec![("twitter_followers", Synth::Uniform { lo: 50_000, hi: 2_000_000 })],
        )
    }

    pub fn tiktok(name: &str) -> Self {
        Self::new(
            name,
            SourceKind::Api,
            vec![("tiktok_followers", Synth::Uniform { lo: 200_000, hi: 8_000_000 })],
        )
    }

    pub fn chart(name: &str) -> Self {
        Self::new(
            name,
            SourceKind::Scrape,
            vec![
                ("melon_chart", Synth::RankScore { worst_rank: 100 }),
                ("gaon_chart", Synth::RankScore { worst_rank: 50 }),
            ],
        )
    }

    pub fn brand(name: &str) -> Self {
        Self::new(
            name,
            SourceKind::Scrape,
            vec![("brand_reputation_ranking", Synth::RankScore { worst_rank: 100 })],
        )
    }

    pub fn trend(name: &str) -> Self {
        Self::new(
            name,
            SourceKind::Scrape,
            vec![
                ("google_trends", Synth::Uniform { lo: 0, hi: 100 }),
                ("twitter_mentions", Synth::Uniform { lo: 1_000, hi: 50_000 }),
            ],
        )
    }

    fn sample(&self) -> Vec<MetricReading> {
        let mut rng = rand::thread_rng();
        self.metrics
            .iter()
            .map(|(metric_type, synth)| {
                let value = match *synth {
                    Synth::Uniform { lo, hi } => rng.gen_range(lo..=hi) as f64,
                    Synth::RankScore { worst_rank } => {
                        let rank = rng.gen_range(1..=worst_rank);
                        f64::from(100u32.saturating_sub(rank))
                    }
                };
                MetricReading::new(metric_type, value)
            })
            .collect()
    }
}

#[async_trait]
impl MetricSource for SimulatedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, _idol: &Idol) -> Result<Vec<MetricReading>, SourceError> {
        Ok(self.sample())
    }
}

// ============================================================================
// YouTube Data API
// ============================================================================

#[derive(Debug, Deserialize)]
struct YouTubeSearchResponse {
    #[serde(default)]
    items: Vec<YouTubeSearchItem>,
}

#[derive(Debug, Deserialize)]
struct YouTubeSearchItem {
    id: YouTubeSearchId,
}

#[derive(Debug, Deserialize)]
struct YouTubeSearchId {
    #[serde(rename = "channelId")]
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YouTubeChannelsResponse {
    #[serde(default)]
    items: Vec<YouTubeChannel>,
}

#[derive(Debug, Deserialize)]
struct YouTubeChannel {
    statistics: YouTubeStatistics,
}

/// Counts arrive as decimal strings
#[derive(Debug, Deserialize)]
struct YouTubeStatistics {
    #[serde(rename = "subscriberCount")]
    subscriber_count: Option<String>,
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
}

/// Channel subscriber and view counts from the YouTube Data API
pub struct YouTubeSource {
    name: String,
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl YouTubeSource {
    pub fn new(name: &str, api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.to_string(),
            api_key,
            base_url: YOUTUBE_API_BASE.to_string(),
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl MetricSource for YouTubeSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Api
    }

    async fn fetch(&self, idol: &Idol) -> Result<Vec<MetricReading>, SourceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::NotConfigured(format!("{} has no api key", self.name)))?;

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("part", "snippet"),
                ("q", idol.name.as_str()),
                ("type", "channel"),
                ("maxResults", "1"),
                ("key", api_key),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }

        let search: YouTubeSearchResponse = response.json().await?;
        let Some(channel_id) = search.items.into_iter().find_map(|item| item.id.channel_id) else {
            return Ok(Vec::new());
        };

        let response = self
            .client
            .get(format!("{}/channels", self.base_url))
            .query(&[
                ("part", "statistics"),
                ("id", channel_id.as_str()),
                ("key", api_key),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }

        let channels: YouTubeChannelsResponse = response.json().await?;
        let Some(channel) = channels.items.into_iter().next() else {
            return Ok(Vec::new());
        };

        let stats = channel.statistics;
        let mut readings = Vec::new();
        if let Some(subscribers) = stats.subscriber_count.and_then(|s| s.parse::<f64>().ok()) {
            readings.push(MetricReading::new("youtube_subscribers", subscribers));
        }
        if let Some(views) = stats.view_count.and_then(|s| s.parse::<f64>().ok()) {
            readings.push(MetricReading::new("youtube_views", views));
        }

        Ok(readings)
    }
}

// ============================================================================
// Spotify Web API
// ============================================================================

#[derive(Debug, Deserialize)]
struct SpotifySearchResponse {
    artists: Option<SpotifyArtistPage>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtistPage {
    #[serde(default)]
    items: Vec<SpotifyArtistRef>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtistRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    followers: Option<SpotifyFollowers>,
}

#[derive(Debug, Deserialize)]
struct SpotifyFollowers {
    total: Option<f64>,
}

/// Artist follower counts from the Spotify Web API (bearer token in `api_key`)
pub struct SpotifySource {
    name: String,
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl SpotifySource {
    pub fn new(name: &str, api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.to_string(),
            api_key,
            base_url: SPOTIFY_API_BASE.to_string(),
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl MetricSource for SpotifySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Api
    }

    async fn fetch(&self, idol: &Idol) -> Result<Vec<MetricReading>, SourceError> {
        let token = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::NotConfigured(format!("{} has no api key", self.name)))?;

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .bearer_auth(token)
            .query(&[("q", idol.name.as_str()), ("type", "artist"), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }

        let search: SpotifySearchResponse = response.json().await?;
        let Some(artist) = search.artists.and_then(|page| page.items.into_iter().next()) else {
            return Ok(Vec::new());
        };

        let response = self
            .client
            .get(format!("{}/artists/{}", self.base_url, artist.id))
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }

        let artist: SpotifyArtist = response.json().await?;
        Ok(artist
            .followers
            .and_then(|f| f.total)
            .map(|total| vec![MetricReading::new("spotify_followers", total)])
            .unwrap_or_default())
    }
}

// ============================================================================
// Deterministic source
// ============================================================================

/// Source returning fixed readings, for tests and offline runs
///
/// Can be told to fail for specific idol names, or to refuse the whole pass.
pub struct FixedSource {
    name: String,
    kind: SourceKind,
    readings: Vec<MetricReading>,
    failing_idols: Vec<String>,
    unavailable: bool,
    calls: AtomicUsize,
}

impl FixedSource {
    pub fn new(name: &str, kind: SourceKind, readings: Vec<MetricReading>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            readings,
            failing_idols: Vec::new(),
            unavailable: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail with a per-idol error for this idol name
    pub fn failing_for(mut self, idol_name: &str) -> Self {
        self.failing_idols.push(idol_name.to_string());
        self
    }

    /// Fail every call with a source-wide error
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Number of `fetch` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricSource for FixedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, idol: &Idol) -> Result<Vec<MetricReading>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.unavailable {
            return Err(SourceError::Unavailable(format!("{} is offline", self.name)));
        }
        if self.failing_idols.iter().any(|n| n == &idol.name) {
            return Err(SourceError::Status(500));
        }

        Ok(self.readings.clone())
    }
}

// ============================================================================
// Catalogs
// ============================================================================

/// Name/kind based resolution onto the built-in sources
pub struct BuiltinSourceCatalog {
    client: reqwest::Client,
    youtube_base: String,
    spotify_base: String,
}

impl BuiltinSourceCatalog {
    pub fn new() -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            youtube_base: YOUTUBE_API_BASE.to_string(),
            spotify_base: SPOTIFY_API_BASE.to_string(),
        })
    }

    /// Point the real API sources at other hosts (mock servers)
    pub fn with_api_bases(mut self, youtube_base: &str, spotify_base: &str) -> Self {
        self.youtube_base = youtube_base.to_string();
        self.spotify_base = spotify_base.to_string();
        self
    }
}

impl SourceCatalog for BuiltinSourceCatalog {
    fn resolve(&self, source: &DataSource) -> Option<Arc<dyn MetricSource>> {
        let name = source.name.to_lowercase();
        let api_key = source.api_key.clone().filter(|k| !k.trim().is_empty());

        let resolved: Arc<dyn MetricSource> = match source.kind? {
            SourceKind::Api => {
                if name.contains("youtube") {
                    Arc::new(
                        YouTubeSource::new(&source.name, api_key, self.client.clone())
                            .with_base_url(&self.youtube_base),
                    )
                } else if name.contains("spotify") {
                    Arc::new(
                        SpotifySource::new(&source.name, api_key, self.client.clone())
                            .with_base_url(&self.spotify_base),
                    )
                } else if name.contains("instagram") {
                    Arc::new(SimulatedSource::instagram(&source.name))
                } else if name.contains("twitter") {
                    Arc::new(SimulatedSource::twitter(&source.name))
                } else if name.contains("tiktok") {
                    Arc::new(SimulatedSource::tiktok(&source.name))
                } else {
                    return None;
                }
            }
            SourceKind::Scrape => {
                if name.contains("chart") {
                    Arc::new(SimulatedSource::chart(&source.name))
                } else if name.contains("brand") {
                    Arc::new(SimulatedSource::brand(&source.name))
                } else if name.contains("trend") {
                    Arc::new(SimulatedSource::trend(&source.name))
                } else {
                    return None;
                }
            }
        };

        Some(resolved)
    }
}

/// Catalog keyed by exact data source name
#[derive(Default)]
pub struct StaticSourceCatalog {
    sources: HashMap<String, Arc<dyn MetricSource>>,
}

impl StaticSourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, data_source_name: &str, source: Arc<dyn MetricSource>) -> Self {
        self.sources.insert(data_source_name.to_string(), source);
        self
    }
}

impl SourceCatalog for StaticSourceCatalog {
    fn resolve(&self, source: &DataSource) -> Option<Arc<dyn MetricSource>> {
        self.sources.get(&source.name).cloned()
    }
}
