//! Route handlers and request validation

use super::error::ApiError;
use super::AppState;
use crate::pipeline::types::{IdolFilter, NewGroup, NewIdol};
use crate::pipeline::views::{self, DEFAULT_TREND_DAYS, MAX_TREND_DAYS};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

const MAX_NAME_LEN: usize = 100;
const MAX_COMPANY_LEN: usize = 100;
const MAX_GENDER_LEN: usize = 10;
const MAX_NATIONALITY_LEN: usize = 50;
const MAX_URL_LEN: usize = 500;
const GENDERS: [&str; 3] = ["male", "female", "co-ed"];

#[derive(Debug, Deserialize)]
pub struct RankingsQuery {
    pub category: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct IdolsQuery {
    pub group: Option<String>,
    pub gender: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct IdolPatch {
    pub is_active: bool,
}

/// Treat empty query values as absent
fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn check_len(field: &str, value: Option<&str>, max: usize) -> Result<(), ApiError> {
    match value {
        Some(v) if v.chars().count() > max => Err(ApiError::BadRequest(format!(
            "{} must be at most {} characters",
            field, max
        ))),
        _ => Ok(()),
    }
}

fn check_name(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{} must not be empty", field)));
    }
    check_len(field, Some(value), MAX_NAME_LEN)
}

fn check_date(field: &str, value: Option<&str>) -> Result<(), ApiError> {
    match value {
        Some(v) if NaiveDate::parse_from_str(v, "%Y-%m-%d").is_err() => Err(ApiError::BadRequest(
            format!("{} must be a YYYY-MM-DD date", field),
        )),
        _ => Ok(()),
    }
}

/// Validate and normalise an idol create request
pub fn validate_new_idol(mut idol: NewIdol) -> Result<NewIdol, ApiError> {
    idol.name = idol.name.trim().to_string();
    check_name("name", &idol.name)?;
    check_len("stage_name", idol.stage_name.as_deref(), MAX_NAME_LEN)?;
    check_len("real_name", idol.real_name.as_deref(), MAX_NAME_LEN)?;
    check_len("company", idol.company.as_deref(), MAX_COMPANY_LEN)?;
    check_len("position", idol.position.as_deref(), MAX_NAME_LEN)?;
    check_len("nationality", idol.nationality.as_deref(), MAX_NATIONALITY_LEN)?;
    check_len("image_url", idol.image_url.as_deref(), MAX_URL_LEN)?;
    check_date("birth_date", idol.birth_date.as_deref())?;

    if let Some(gender) = idol.gender.take() {
        check_len("gender", Some(&gender), MAX_GENDER_LEN)?;
        let gender = gender.trim().to_ascii_lowercase();
        if !GENDERS.contains(&gender.as_str()) {
            return Err(ApiError::BadRequest(format!(
                "gender must be one of {}",
                GENDERS.join(", ")
            )));
        }
        idol.gender = Some(gender);
    }

    Ok(idol)
}

/// Validate and normalise a group create request
pub fn validate_new_group(mut group: NewGroup) -> Result<NewGroup, ApiError> {
    group.name = group.name.trim().to_string();
    check_name("name", &group.name)?;
    check_len("company", group.company.as_deref(), MAX_COMPANY_LEN)?;
    check_len("image_url", group.image_url.as_deref(), MAX_URL_LEN)?;
    check_date("debut_date", group.debut_date.as_deref())?;
    Ok(group)
}

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "K-Pop Ranking Platform API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn get_rankings(
    State(state): State<AppState>,
    query: Result<Query<RankingsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let category = non_empty(query.category).map(|c| c.to_ascii_lowercase());
    let rankings =
        views::current_rankings(state.store.as_ref(), category.as_deref(), query.limit).await?;
    Ok(Json(rankings))
}

pub async fn list_idols(
    State(state): State<AppState>,
    query: Result<Query<IdolsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let filter = IdolFilter {
        group: non_empty(query.group),
        gender: non_empty(query.gender),
    };
    Ok(Json(views::list_idols(state.store.as_ref(), &filter).await?))
}

pub async fn create_idol(
    State(state): State<AppState>,
    body: Result<Json<NewIdol>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let idol = validate_new_idol(body)?;
    let created = state.store.create_idol(idol).await?;
    log::info!("➕ Created idol {} ({})", created.id, created.name);

    let view = views::idol_detail(state.store.as_ref(), created.id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("idol {} vanished after insert", created.id)))?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_idol(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    views::idol_detail(state.store.as_ref(), id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Idol not found".to_string()))
}

pub async fn patch_idol(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    patch: Result<Json<IdolPatch>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let Json(patch) = patch?;
    state.store.set_idol_active(id, patch.is_active).await?;
    log::info!("✏️  Idol {} active={}", id, patch.is_active);

    views::idol_detail(state.store.as_ref(), id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Idol not found".to_string()))
}

pub async fn list_groups(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(views::list_groups(state.store.as_ref()).await?))
}

pub async fn create_group(
    State(state): State<AppState>,
    body: Result<Json<NewGroup>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let group = validate_new_group(body)?;
    let created = state.store.create_group(group).await?;
    log::info!("➕ Created group {} ({})", created.id, created.name);
    Ok((StatusCode::CREATED, Json(views::GroupView::from(&created))))
}

pub async fn compare_idols(
    State(state): State<AppState>,
    ids: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path((first, second)) = ids?;
    views::compare_idols(state.store.as_ref(), first, second)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("One or both idols not found".to_string()))
}

pub async fn idol_trends(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    query: Result<Query<TrendsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let Query(query) = query?;
    let days = query.days.unwrap_or(DEFAULT_TREND_DAYS);
    if !(1..=MAX_TREND_DAYS).contains(&days) {
        return Err(ApiError::BadRequest(format!(
            "days must be between 1 and {}",
            MAX_TREND_DAYS
        )));
    }

    let now = chrono::Utc::now().timestamp();
    views::idol_trends(state.store.as_ref(), id, days, now)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Idol not found".to_string()))
}

pub async fn refresh_data(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    log::info!("🔁 Manual refresh requested");
    let report = state.ingestor.refresh_all().await?;

    Ok(Json(json!({
        "message": "Data refresh completed",
        "updated_count": report.observations_written,
        "report": report,
    })))
}

pub async fn platform_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(views::platform_stats(state.store.as_ref()).await?))
}
