//! idolrank - metric ingestion and ranking service for K-pop idols and groups
//!
//! - `pipeline` - storage, ingestion, aggregation and read models
//! - `api` - axum HTTP layer

pub mod api;
pub mod pipeline;
