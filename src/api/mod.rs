//! HTTP API (axum)
//!
//! | Method | Path                        | Handler          |
//! |--------|-----------------------------|------------------|
//! | GET    | `/`                         | `root`           |
//! | GET    | `/health`                   | `health`         |
//! | GET    | `/api/rankings`             | `get_rankings`   |
//! | GET    | `/api/idols`                | `list_idols`     |
//! | POST   | `/api/idols`                | `create_idol`    |
//! | GET    | `/api/idols/{id}`           | `get_idol`       |
//! | PATCH  | `/api/idols/{id}`           | `patch_idol`     |
//! | GET    | `/api/groups`               | `list_groups`    |
//! | POST   | `/api/groups`               | `create_group`   |
//! | GET    | `/api/compare/{id1}/{id2}`  | `compare_idols`  |
//! | GET    | `/api/trends/{id}`          | `idol_trends`    |
//! | POST   | `/api/refresh-data`         | `refresh_data`   |
//! | GET    | `/api/stats`                | `platform_stats` |

pub mod error;
pub mod handlers;

pub use error::ApiError;

use crate::pipeline::{Ingestor, RankingStore};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RankingStore>,
    pub ingestor: Arc<Ingestor>,
}

impl AppState {
    pub fn new(store: Arc<dyn RankingStore>, ingestor: Arc<Ingestor>) -> Self {
        Self { store, ingestor }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/rankings", get(handlers::get_rankings))
        .route("/api/idols", get(handlers::list_idols).post(handlers::create_idol))
        .route(
            "/api/idols/{id}",
            get(handlers::get_idol).patch(handlers::patch_idol),
        )
        .route("/api/groups", get(handlers::list_groups).post(handlers::create_group))
        .route("/api/compare/{id1}/{id2}", get(handlers::compare_idols))
        .route("/api/trends/{id}", get(handlers::idol_trends))
        .route("/api/refresh-data", post(handlers::refresh_data))
        .route("/api/stats", get(handlers::platform_stats))
        .with_state(state)
}

/// Serve the API on an already-bound listener until the task is dropped
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}
