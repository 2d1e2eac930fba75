//! HTTP API integration tests
//!
//! Each test starts the router on an ephemeral port over a fresh temp
//! database seeded with the demo catalog, and talks to it with reqwest.

use idolrank::api::{self, AppState};
use idolrank::pipeline::aggregator::{NoNoise, RankingAggregator};
use idolrank::pipeline::db::{open_connection, run_schema_migrations};
use idolrank::pipeline::feeds::sample_feeds;
use idolrank::pipeline::ingestion::Ingestor;
use idolrank::pipeline::seed::seed_catalog;
use idolrank::pipeline::sources::{FixedSource, MetricReading, StaticSourceCatalog};
use idolrank::pipeline::store::{RankingStore, SqliteRankingStore};
use idolrank::pipeline::types::SourceKind;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::net::TcpListener;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    store: Arc<SqliteRankingStore>,
    _db: NamedTempFile,
}

impl TestServer {
    async fn start() -> Self {
        let db = NamedTempFile::new().unwrap();
        let mut conn = open_connection(db.path().to_str().unwrap()).unwrap();
        run_schema_migrations(&mut conn, "sql").unwrap();
        let store = Arc::new(SqliteRankingStore::from_connection(conn));
        seed_catalog(store.as_ref()).await.unwrap();

        let catalog = StaticSourceCatalog::new()
            .with_source(
                "Chart Scraper",
                Arc::new(FixedSource::new(
                    "Chart Scraper",
                    SourceKind::Scrape,
                    vec![MetricReading::new("melon_chart", 50.0)],
                )),
            )
            .with_source(
                "YouTube Data API",
                Arc::new(FixedSource::new("YouTube Data API", SourceKind::Api, vec![]).unavailable()),
            );

        let aggregator = RankingAggregator::new(
            store.clone(),
            Arc::new(NoNoise),
            30,
            vec!["music".to_string(), "social".to_string(), "streaming".to_string()],
        );
        let ingestor = Arc::new(Ingestor::new(
            store.clone(),
            Arc::new(catalog),
            sample_feeds(),
            aggregator,
            Duration::ZERO,
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = AppState::new(store.clone(), ingestor);
        tokio::spawn(async move {
            api::serve(listener, state).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            client: reqwest::Client::new(),
            store,
            _db: db,
        }
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = self.client.request(method, format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn idol_id(&self, name: &str) -> i64 {
        self.store.find_idol_by_name(name).await.unwrap().unwrap().id
    }
}

#[tokio::test]
async fn test_banner_and_health() {
    let server = TestServer::start().await;

    let (status, body) = server.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "K-Pop Ranking Platform API");
    assert!(body["version"].is_string());

    let (status, body) = server.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_refresh_then_rankings() {
    let server = TestServer::start().await;

    // No run yet
    let (status, body) = server.get("/api/rankings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);

    let (status, body) = server.send(reqwest::Method::POST, "/api/refresh-data", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Data refresh completed");
    // Chart Scraper: one reading for each of the 10 idols; YouTube is down
    assert_eq!(body["updated_count"], 10);
    assert_eq!(body["report"]["sources_failed"], 1);

    let (status, body) = server.get("/api/rankings").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    // 10 idols x (overall + 3 categories)
    assert_eq!(rows.len(), 40);
    assert_eq!(rows[0]["category"], "overall");

    let overall: Vec<&Value> = rows.iter().filter(|r| r["category"] == "overall").collect();
    let ranks: Vec<i64> = overall.iter().map(|r| r["rank"].as_i64().unwrap()).collect();
    assert_eq!(ranks, (1..=10).collect::<Vec<i64>>());

    let scores: Vec<f64> = overall.iter().map(|r| r["score"].as_f64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert!(scores.iter().all(|s| (0.0..=100.0).contains(s)));

    let (_, body) = server.get("/api/rankings?category=music&limit=3").await;
    let music = body.as_array().unwrap();
    assert_eq!(music.len(), 3);
    assert_eq!(music[0]["idol"]["name"], "NewJeans");
    assert_eq!(music[0]["idol"]["group"]["company"], "ADOR");
    assert!((music[0]["score"].as_f64().unwrap() - 94.5).abs() < 1e-9);

    let (_, body) = server.get("/api/stats").await;
    assert_eq!(body["total_idols"], 10);
    assert_eq!(body["total_groups"], 9);
    assert_eq!(body["ranking_runs"], 1);
    assert_eq!(body["ranking_rows"], 40);
    assert!(body["last_ranked_at"].is_string());

    // A second refresh appends a new run instead of replacing the first
    server.send(reqwest::Method::POST, "/api/refresh-data", None).await;
    let (_, body) = server.get("/api/stats").await;
    assert_eq!(body["ranking_runs"], 2);
    assert_eq!(body["ranking_rows"], 80);
}

#[tokio::test]
async fn test_missing_idols_are_not_found() {
    let server = TestServer::start().await;
    let bts = server.idol_id("BTS").await;

    for path in [
        "/api/idols/9999".to_string(),
        format!("/api/compare/{}/9999", bts),
        "/api/trends/9999".to_string(),
    ] {
        let (status, body) = server.get(&path).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", path);
        assert!(body["error"].is_string(), "{}", path);
    }

    let (status, _) = server
        .send(reqwest::Method::PATCH, "/api/idols/9999", Some(json!({ "is_active": false })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_idol_detail_compare_and_trends() {
    let server = TestServer::start().await;
    let iu = server.idol_id("IU").await;
    let twice = server.idol_id("TWICE").await;

    let (status, body) = server.get(&format!("/api/idols/{}", iu)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["real_name"], "Lee Ji-eun");
    assert!(body["group"].is_null());

    // No feed mentions IU: empty series, not an error
    let (status, body) = server.get(&format!("/api/trends/{}", iu)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["period_days"], 30);
    assert_eq!(body["trends"].as_array().unwrap().len(), 0);

    let (status, _) = server.get(&format!("/api/trends/{}?days=0", iu)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = server.get(&format!("/api/trends/{}?days=366", iu)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    server.send(reqwest::Method::POST, "/api/refresh-data", None).await;

    let (_, body) = server.get(&format!("/api/trends/{}?days=7", twice)).await;
    let trends = body["trends"].as_array().unwrap();
    // instagram + twitter engagement, spotify + youtube + apple audience
    assert_eq!(trends.len(), 5);
    assert!(trends.iter().all(|t| t["date"].is_string()));

    let (status, body) = server.get(&format!("/api/compare/{}/{}", iu, twice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["idol1"]["name"], "IU");
    assert_eq!(body["idol2"]["name"], "TWICE");
    assert_eq!(body["idol2"]["group"]["name"], "TWICE");
    assert_eq!(body["idol1"]["current_ranking"]["category"], "overall");
    assert_eq!(body["idol1"]["current_ranking"]["score"].as_f64().unwrap(), 0.0);
}

#[tokio::test]
async fn test_malformed_requests_get_json_errors() {
    let server = TestServer::start().await;
    let bts = server.idol_id("BTS").await;

    for path in [
        "/api/idols/abc".to_string(),
        format!("/api/compare/{}/xyz", bts),
        "/api/trends/abc".to_string(),
        "/api/rankings?limit=-1".to_string(),
        format!("/api/trends/{}?days=week", bts),
    ] {
        let (status, body) = server.get(&path).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", path);
        assert!(body["error"].is_string(), "{}", path);
    }

    // Wrong field type would be a 422 from the bare Json extractor
    let (status, body) = server
        .send(reqwest::Method::POST, "/api/idols", Some(json!({ "name": 5 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = server
        .send(reqwest::Method::PATCH, &format!("/api/idols/{}", bts), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let response = server
        .client
        .post(format!("{}/api/groups", server.base_url))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("{\"name\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());

    // No body at all (missing content type)
    let (status, body) = server.send(reqwest::Method::POST, "/api/groups", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_admin_writes_and_validation() {
    let server = TestServer::start().await;

    let (status, body) = server
        .send(
            reqwest::Method::POST,
            "/api/groups",
            Some(json!({ "name": "ILLIT", "company": "Belift Lab", "debut_date": "2024-03-25" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let illit = body["id"].as_i64().unwrap();
    assert_eq!(body["is_active"], true);

    let (status, body) = server
        .send(reqwest::Method::POST, "/api/groups", Some(json!({ "name": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("name"));

    let (status, body) = server
        .send(
            reqwest::Method::POST,
            "/api/idols",
            Some(json!({ "name": "ILLIT", "group_id": illit, "gender": "Female" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["gender"], "female");
    assert_eq!(body["group"]["name"], "ILLIT");
    let id = body["id"].as_i64().unwrap();

    for bad in [
        json!({ "name": "X", "group_id": 9999 }),
        json!({ "name": "X", "gender": "unknown" }),
        json!({ "name": "X", "birth_date": "2004/05/06" }),
        json!({ "name": "X", "nationality": "n".repeat(51) }),
    ] {
        let (status, body) = server.send(reqwest::Method::POST, "/api/idols", Some(bad.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", bad);
        assert!(body["error"].is_string());
    }

    let (status, body) = server
        .send(
            reqwest::Method::PATCH,
            &format!("/api/idols/{}", id),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let (_, body) = server.get("/api/idols?group=ILLIT").await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = server.get("/api/idols?gender=male").await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["BTS", "SEVENTEEN", "Stray Kids"]);

    let (_, body) = server.get("/api/groups").await;
    assert_eq!(body.as_array().unwrap().len(), 10);
}
