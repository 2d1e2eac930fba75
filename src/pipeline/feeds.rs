//! Trend feeds: chart, social and streaming snapshots turned into [0, 100] scores
//!
//! Feeds are not per-idol: each returns a list of entries keyed by artist
//! name, which ingestion matches to idols by exact name.

use super::sources::SourceError;
use async_trait::async_trait;

pub const MUSIC_CATEGORY: &str = "music";
pub const SOCIAL_CATEGORY: &str = "social";
pub const STREAMING_CATEGORY: &str = "streaming";

/// One normalised feed entry, ready to become a TrendPoint
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub artist: String,
    pub category: String,
    pub score: f64,
    pub rank: Option<i64>,
}

#[async_trait]
pub trait TrendFeed: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<FeedEntry>, SourceError>;
}

// (artist, rank, score)
const MELON_CHART: [(&str, i64, f64); 5] = [
    ("NewJeans", 1, 95.5),
    ("IVE", 2, 92.3),
    ("LE SSERAFIM", 3, 89.7),
    ("aespa", 4, 87.2),
    ("BLACKPINK", 5, 85.1),
];

const GENIE_CHART: [(&str, i64, f64); 5] = [
    ("NewJeans", 1, 94.8),
    ("IVE", 2, 91.5),
    ("LE SSERAFIM", 3, 88.9),
    ("aespa", 4, 86.3),
    ("BLACKPINK", 5, 84.7),
];

const BUGS_CHART: [(&str, i64, f64); 5] = [
    ("NewJeans", 1, 93.2),
    ("IVE", 2, 90.8),
    ("LE SSERAFIM", 3, 87.5),
    ("aespa", 4, 85.9),
    ("BLACKPINK", 5, 83.4),
];

// (artist, engagement rate in percent)
const INSTAGRAM_ENGAGEMENT: [(&str, f64); 5] = [
    ("BLACKPINK", 3.2),
    ("BTS", 4.1),
    ("TWICE", 2.8),
    ("Red Velvet", 3.5),
    ("aespa", 4.2),
];

const TWITTER_ENGAGEMENT: [(&str, f64); 5] = [
    ("BTS", 2.8),
    ("BLACKPINK", 3.1),
    ("TWICE", 2.5),
    ("Red Velvet", 3.0),
    ("aespa", 3.8),
];

const TIKTOK_ENGAGEMENT: [(&str, f64); 5] = [
    ("NewJeans", 5.2),
    ("IVE", 4.8),
    ("LE SSERAFIM", 4.5),
    ("aespa", 4.9),
    ("BLACKPINK", 3.2),
];

// (artist, monthly listeners or subscribers)
const SPOTIFY_LISTENERS: [(&str, f64); 5] = [
    ("BTS", 50_000_000.0),
    ("BLACKPINK", 45_000_000.0),
    ("TWICE", 35_000_000.0),
    ("NewJeans", 30_000_000.0),
    ("IVE", 25_000_000.0),
];

const YOUTUBE_SUBSCRIBERS: [(&str, f64); 5] = [
    ("BLACKPINK", 80_000_000.0),
    ("BTS", 75_000_000.0),
    ("TWICE", 60_000_000.0),
    ("NewJeans", 40_000_000.0),
    ("IVE", 35_000_000.0),
];

const APPLE_MUSIC_LISTENERS: [(&str, f64); 5] = [
    ("BTS", 40_000_000.0),
    ("BLACKPINK", 38_000_000.0),
    ("TWICE", 30_000_000.0),
    ("NewJeans", 25_000_000.0),
    ("IVE", 20_000_000.0),
];

/// Engagement rate (percent) to score
pub fn engagement_score(engagement_rate: f64) -> f64 {
    engagement_rate * 10.0
}

/// Audience size to score: one point per million, capped at 100
pub fn audience_score(audience: f64) -> f64 {
    (audience / 1_000_000.0).min(100.0)
}

/// Feed backed by a fixed list of entries
pub struct SampleFeed {
    name: String,
    entries: Vec<FeedEntry>,
}

impl SampleFeed {
    pub fn new(name: &str, entries: Vec<FeedEntry>) -> Self {
        Self {
            name: name.to_string(),
            entries,
        }
    }

    /// melon, genie and bugs top-5 charts; scores as published
    pub fn music() -> Self {
        let entries = [MELON_CHART, GENIE_CHART, BUGS_CHART]
            .iter()
            .flatten()
            .map(|&(artist, rank, score)| FeedEntry {
                artist: artist.to_string(),
                category: MUSIC_CATEGORY.to_string(),
                score,
                rank: Some(rank),
            })
            .collect();
        Self::new("music-charts", entries)
    }

    /// instagram, twitter and tiktok engagement rates
    pub fn social() -> Self {
        let entries = [INSTAGRAM_ENGAGEMENT, TWITTER_ENGAGEMENT, TIKTOK_ENGAGEMENT]
            .iter()
            .flatten()
            .map(|&(artist, rate)| FeedEntry {
                artist: artist.to_string(),
                category: SOCIAL_CATEGORY.to_string(),
                score: engagement_score(rate),
                rank: None,
            })
            .collect();
        Self::new("social-engagement", entries)
    }

    /// spotify and apple music listeners, youtube subscribers
    pub fn streaming() -> Self {
        let entries = [SPOTIFY_LISTENERS, YOUTUBE_SUBSCRIBERS, APPLE_MUSIC_LISTENERS]
            .iter()
            .flatten()
            .map(|&(artist, audience)| FeedEntry {
                artist: artist.to_string(),
                category: STREAMING_CATEGORY.to_string(),
                score: audience_score(audience),
                rank: None,
            })
            .collect();
        Self::new("streaming-audience", entries)
    }
}

#[async_trait]
impl TrendFeed for SampleFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<FeedEntry>, SourceError> {
        Ok(self.entries.clone())
    }
}

/// The three built-in feeds
pub fn sample_feeds() -> Vec<std::sync::Arc<dyn TrendFeed>> {
    vec![
        std::sync::Arc::new(SampleFeed::music()),
        std::sync::Arc::new(SampleFeed::social()),
        std::sync::Arc::new(SampleFeed::streaming()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_conversions() {
        assert!((engagement_score(4.2) - 42.0).abs() < 1e-9);
        assert_eq!(audience_score(30_000_000.0), 30.0);
        assert_eq!(audience_score(250_000_000.0), 100.0);
    }

    #[tokio::test]
    async fn test_music_feed_keeps_chart_scores() {
        let entries = SampleFeed::music().fetch().await.unwrap();
        assert_eq!(entries.len(), 15);

        let first = &entries[0];
        assert_eq!(first.artist, "NewJeans");
        assert_eq!(first.category, MUSIC_CATEGORY);
        assert_eq!(first.score, 95.5);
        assert_eq!(first.rank, Some(1));
    }

    #[tokio::test]
    async fn test_streaming_feed_uses_subscribers_for_youtube() {
        let entries = SampleFeed::streaming().fetch().await.unwrap();
        assert_eq!(entries.len(), 15);

        let blackpink: Vec<f64> = entries
            .iter()
            .filter(|e| e.artist == "BLACKPINK")
            .map(|e| e.score)
            .collect();
        // spotify 45M, youtube 80M subscribers, apple 38M
        assert_eq!(blackpink, vec![45.0, 80.0, 38.0]);
        assert!(entries.iter().all(|e| e.rank.is_none()));
    }

    #[tokio::test]
    async fn test_all_sample_scores_in_range() {
        for feed in sample_feeds() {
            for entry in feed.fetch().await.unwrap() {
                assert!((0.0..=100.0).contains(&entry.score), "{:?}", entry);
            }
        }
    }
}
