//! YouTube and Spotify sources against a local stand-in for both APIs
//!
//! The stand-in is a small axum router on an ephemeral port. It knows three
//! artists: "BTS" (full statistics), "aespa" (hidden YouTube subscriber
//! count) and "Broken" (always 500). Everything else has no search hits.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use idolrank::pipeline::aggregator::{NoNoise, RankingAggregator};
use idolrank::pipeline::db::{open_connection, run_schema_migrations};
use idolrank::pipeline::ingestion::Ingestor;
use idolrank::pipeline::sources::{
    BuiltinSourceCatalog, MetricReading, MetricSource, SourceError, SpotifySource, YouTubeSource,
};
use idolrank::pipeline::store::{RankingStore, SqliteRankingStore};
use idolrank::pipeline::types::{Idol, NewDataSource, NewIdol, SourceKind};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::net::TcpListener;

const YOUTUBE_KEY: &str = "yt-test-key";
const SPOTIFY_TOKEN: &str = "sp-test-token";
const BTS_SPOTIFY_ID: &str = "3Nrfpe0tUJi4K4DXYWgMUX";

#[derive(Clone, Default)]
struct FakeApis {
    youtube_searches: Arc<AtomicUsize>,
    spotify_searches: Arc<AtomicUsize>,
}

async fn youtube_search(
    State(apis): State<FakeApis>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    apis.youtube_searches.fetch_add(1, Ordering::SeqCst);

    if params.get("key").map(String::as_str) != Some(YOUTUBE_KEY) {
        return StatusCode::FORBIDDEN.into_response();
    }

    match params.get("q").map(String::as_str) {
        Some("BTS") => Json(json!({
            "items": [{ "id": { "kind": "youtube#channel", "channelId": "UC_bts" } }]
        }))
        .into_response(),
        Some("aespa") => Json(json!({
            "items": [{ "id": { "kind": "youtube#channel", "channelId": "UC_aespa" } }]
        }))
        .into_response(),
        Some("Broken") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => Json(json!({ "items": [] })).into_response(),
    }
}

async fn youtube_channels(Query(params): Query<HashMap<String, String>>) -> Response {
    let body = match params.get("id").map(String::as_str) {
        Some("UC_bts") => json!({
            "items": [{ "statistics": { "subscriberCount": "76500000", "viewCount": "23100000000" } }]
        }),
        Some("UC_aespa") => json!({
            "items": [{ "statistics": { "hiddenSubscriberCount": true, "viewCount": "4200000000" } }]
        }),
        _ => json!({ "items": [] }),
    };
    Json(body).into_response()
}

async fn spotify_search(
    State(apis): State<FakeApis>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    apis.spotify_searches.fetch_add(1, Ordering::SeqCst);

    let expected = format!("Bearer {}", SPOTIFY_TOKEN);
    if headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match params.get("q").map(String::as_str) {
        Some("BTS") => Json(json!({ "artists": { "items": [{ "id": BTS_SPOTIFY_ID }] } })).into_response(),
        Some("Broken") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => Json(json!({ "artists": { "items": [] } })).into_response(),
    }
}

async fn spotify_artist(Path(id): Path<String>) -> Response {
    if id == BTS_SPOTIFY_ID {
        Json(json!({ "id": id, "followers": { "href": null, "total": 79000000 } })).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

struct FakeServer {
    apis: FakeApis,
    youtube_base: String,
    spotify_base: String,
}

impl FakeServer {
    async fn start() -> Self {
        let apis = FakeApis::default();
        let app = Router::new()
            .route("/youtube/search", get(youtube_search))
            .route("/youtube/channels", get(youtube_channels))
            .route("/spotify/search", get(spotify_search))
            .route("/spotify/artists/{id}", get(spotify_artist))
            .with_state(apis.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            apis,
            youtube_base: format!("http://{}/youtube", addr),
            spotify_base: format!("http://{}/spotify", addr),
        }
    }
}

fn idol(name: &str) -> Idol {
    Idol {
        id: 1,
        name: name.to_string(),
        stage_name: None,
        real_name: None,
        group_id: None,
        company: None,
        gender: None,
        position: None,
        birth_date: None,
        nationality: None,
        is_soloist: false,
        is_active: true,
        image_url: None,
        created_at: 0,
    }
}

#[tokio::test]
async fn test_youtube_reads_channel_statistics() {
    let server = FakeServer::start().await;
    let source = YouTubeSource::new("YouTube Data API", Some(YOUTUBE_KEY.to_string()), reqwest::Client::new())
        .with_base_url(&server.youtube_base);

    let readings = source.fetch(&idol("BTS")).await.unwrap();
    assert_eq!(
        readings,
        vec![
            MetricReading::new("youtube_subscribers", 76_500_000.0),
            MetricReading::new("youtube_views", 23_100_000_000.0),
        ]
    );

    // Hidden subscriber count: views only
    let readings = source.fetch(&idol("aespa")).await.unwrap();
    assert_eq!(readings, vec![MetricReading::new("youtube_views", 4_200_000_000.0)]);

    // No channel found is not an error
    assert!(source.fetch(&idol("IU")).await.unwrap().is_empty());

    match source.fetch(&idol("Broken")).await {
        Err(e @ SourceError::Status(500)) => assert!(!e.is_source_wide()),
        other => panic!("expected status 500, got {:?}", other),
    }

    let wrong_key = YouTubeSource::new("YouTube Data API", Some("revoked".to_string()), reqwest::Client::new())
        .with_base_url(&server.youtube_base);
    match wrong_key.fetch(&idol("BTS")).await {
        Err(e @ SourceError::Status(403)) => assert!(e.is_source_wide()),
        other => panic!("expected status 403, got {:?}", other),
    }
}

#[tokio::test]
async fn test_spotify_reads_follower_count() {
    let server = FakeServer::start().await;
    let source = SpotifySource::new("Spotify Web API", Some(SPOTIFY_TOKEN.to_string()), reqwest::Client::new())
        .with_base_url(&server.spotify_base);

    let readings = source.fetch(&idol("BTS")).await.unwrap();
    assert_eq!(readings, vec![MetricReading::new("spotify_followers", 79_000_000.0)]);

    assert!(source.fetch(&idol("IU")).await.unwrap().is_empty());

    let expired = SpotifySource::new("Spotify Web API", Some("expired".to_string()), reqwest::Client::new())
        .with_base_url(&server.spotify_base);
    match expired.fetch(&idol("BTS")).await {
        Err(e @ SourceError::Status(401)) => assert!(e.is_source_wide()),
        other => panic!("expected status 401, got {:?}", other),
    }
}

#[tokio::test]
async fn test_refresh_stops_forbidden_source_and_skips_failing_idol() {
    let server = FakeServer::start().await;

    let db = NamedTempFile::new().unwrap();
    let mut conn = open_connection(db.path().to_str().unwrap()).unwrap();
    run_schema_migrations(&mut conn, "sql").unwrap();
    let store = Arc::new(SqliteRankingStore::from_connection(conn));

    // Id order is the fetch order: the failing idol comes first
    store.create_idol(NewIdol::named("Broken")).await.unwrap();
    let bts = store.create_idol(NewIdol::named("BTS")).await.unwrap();
    store.create_idol(NewIdol::named("IU")).await.unwrap();

    let mut youtube = NewDataSource::new("YouTube Data API", SourceKind::Api);
    youtube.api_key = Some("revoked".to_string());
    store.create_data_source(youtube).await.unwrap();

    let mut spotify = NewDataSource::new("Spotify Web API", SourceKind::Api);
    spotify.api_key = Some(SPOTIFY_TOKEN.to_string());
    store.create_data_source(spotify).await.unwrap();

    let catalog = BuiltinSourceCatalog::new()
        .unwrap()
        .with_api_bases(&server.youtube_base, &server.spotify_base);
    let aggregator = RankingAggregator::new(store.clone(), Arc::new(NoNoise), 30, Vec::new());
    let ingestor = Ingestor::new(
        store.clone(),
        Arc::new(catalog),
        Vec::new(),
        aggregator,
        Duration::ZERO,
    );

    let report = ingestor.refresh_all().await.unwrap();
    assert_eq!(report.sources_attempted, 2);
    assert_eq!(report.sources_failed, 1);
    assert_eq!(report.sources_skipped, 0);
    assert_eq!(report.observations_written, 1);
    assert_eq!(report.rankings_written, 3);

    // 403 on the first idol ends YouTube; the 500 only cost Spotify one idol
    assert_eq!(server.apis.youtube_searches.load(Ordering::SeqCst), 1);
    assert_eq!(server.apis.spotify_searches.load(Ordering::SeqCst), 3);

    let observations = store.observations_for(bts.id).await.unwrap();
    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].metric_type, "spotify_followers");
    assert_eq!(observations[0].value, 79_000_000.0);
    assert_eq!(observations[0].source, "Spotify Web API");

    let stamped: HashMap<String, bool> = store
        .active_data_sources()
        .await
        .unwrap()
        .into_iter()
        .map(|s| (s.name, s.last_updated.is_some()))
        .collect();
    assert!(!stamped["YouTube Data API"]);
    assert!(stamped["Spotify Web API"]);
}
