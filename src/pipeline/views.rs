//! Read models served by the HTTP API
//!
//! All lookups go through `RankingStore`; nothing here touches live sources.
//! Timestamps are rendered as RFC 3339 strings.

use super::aggregator::window_start;
use super::store::{RankingStore, StoreError};
use super::types::{Group, Idol, IdolFilter, RankingSnapshot, OVERALL_CATEGORY};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashMap;

pub const DEFAULT_RANKING_LIMIT: usize = 100;
pub const MAX_RANKING_LIMIT: usize = 500;
pub const DEFAULT_TREND_DAYS: i64 = 30;
pub const MAX_TREND_DAYS: i64 = 365;

pub fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupView {
    pub id: i64,
    pub name: String,
    pub company: Option<String>,
    pub debut_date: Option<String>,
    pub is_active: bool,
    pub image_url: Option<String>,
    pub created_at: String,
}

impl From<&Group> for GroupView {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id,
            name: group.name.clone(),
            company: group.company.clone(),
            debut_date: group.debut_date.clone(),
            is_active: group.is_active,
            image_url: group.image_url.clone(),
            created_at: format_timestamp(group.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdolView {
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
    pub created_at: String,
    pub group: Option<GroupView>,
}

impl IdolView {
    pub fn new(idol: &Idol, group: Option<&Group>) -> Self {
        Self {
            id: idol.id,
            name: idol.name.clone(),
            stage_name: idol.stage_name.clone(),
            real_name: idol.real_name.clone(),
            group_id: idol.group_id,
            company: idol.company.clone(),
            gender: idol.gender.clone(),
            position: idol.position.clone(),
            birth_date: idol.birth_date.clone(),
            nationality: idol.nationality.clone(),
            is_soloist: idol.is_soloist,
            is_active: idol.is_active,
            image_url: idol.image_url.clone(),
            created_at: format_timestamp(idol.created_at),
            group: group.map(GroupView::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingView {
    pub id: i64,
    pub run_id: i64,
    pub rank: i64,
    pub category: String,
    pub score: f64,
    pub date: String,
    pub idol_id: i64,
    pub idol: Option<IdolView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentRanking {
    pub rank: i64,
    pub score: f64,
    pub category: String,
    pub date: String,
}

impl From<&RankingSnapshot> for CurrentRanking {
    fn from(snapshot: &RankingSnapshot) -> Self {
        Self {
            rank: snapshot.rank,
            score: snapshot.score,
            category: snapshot.category.clone(),
            date: format_timestamp(snapshot.ranked_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparedIdol {
    #[serde(flatten)]
    pub idol: IdolView,
    pub current_ranking: Option<CurrentRanking>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub idol1: ComparedIdol,
    pub idol2: ComparedIdol,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSample {
    pub date: String,
    pub score: f64,
    pub rank: Option<i64>,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub idol_id: i64,
    pub idol_name: String,
    pub period_days: i64,
    pub trends: Vec<TrendSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformStats {
    pub total_idols: i64,
    pub active_idols: i64,
    pub total_groups: i64,
    pub active_data_sources: i64,
    pub total_observations: i64,
    pub total_trend_points: i64,
    pub ranking_runs: i64,
    pub ranking_rows: i64,
    pub last_ranked_at: Option<String>,
}

/// Clamp a requested ranking limit into 1..=500 (default 100)
pub fn effective_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_RANKING_LIMIT)
        .clamp(1, MAX_RANKING_LIMIT)
}

async fn group_index(store: &dyn RankingStore) -> Result<HashMap<i64, Group>, StoreError> {
    Ok(store
        .list_groups()
        .await?
        .into_iter()
        .map(|group| (group.id, group))
        .collect())
}

async fn idol_view(store: &dyn RankingStore, idol: &Idol) -> Result<IdolView, StoreError> {
    let group = match idol.group_id {
        Some(group_id) => store.get_group(group_id).await?,
        None => None,
    };
    Ok(IdolView::new(idol, group.as_ref()))
}

/// Latest ranking rows, each with its idol and group
pub async fn current_rankings(
    store: &dyn RankingStore,
    category: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<RankingView>, StoreError> {
    let rows = store.latest_rankings(category, effective_limit(limit)).await?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let groups = group_index(store).await?;
    let mut idols: HashMap<i64, Option<IdolView>> = HashMap::new();
    let mut views = Vec::with_capacity(rows.len());

    for row in rows {
        if !idols.contains_key(&row.idol_id) {
            let view = store.get_idol(row.idol_id).await?.map(|idol| {
                let group = idol.group_id.and_then(|id| groups.get(&id));
                IdolView::new(&idol, group)
            });
            idols.insert(row.idol_id, view);
        }

        views.push(RankingView {
            id: row.id,
            run_id: row.run_id,
            rank: row.rank,
            category: row.category,
            score: row.score,
            date: format_timestamp(row.ranked_at),
            idol_id: row.idol_id,
            idol: idols.get(&row.idol_id).cloned().flatten(),
        });
    }

    Ok(views)
}

pub async fn list_idols(
    store: &dyn RankingStore,
    filter: &IdolFilter,
) -> Result<Vec<IdolView>, StoreError> {
    let idols = store.list_idols(filter).await?;
    let groups = group_index(store).await?;

    Ok(idols
        .iter()
        .map(|idol| IdolView::new(idol, idol.group_id.and_then(|id| groups.get(&id))))
        .collect())
}

pub async fn list_groups(store: &dyn RankingStore) -> Result<Vec<GroupView>, StoreError> {
    Ok(store.list_groups().await?.iter().map(GroupView::from).collect())
}

/// `None` when the idol does not exist
pub async fn idol_detail(store: &dyn RankingStore, id: i64) -> Result<Option<IdolView>, StoreError> {
    match store.get_idol(id).await? {
        Some(idol) => Ok(Some(idol_view(store, &idol).await?)),
        None => Ok(None),
    }
}

/// Both idols with their latest "overall" ranking; `None` if either is missing
pub async fn compare_idols(
    store: &dyn RankingStore,
    first: i64,
    second: i64,
) -> Result<Option<Comparison>, StoreError> {
    let (Some(a), Some(b)) = (store.get_idol(first).await?, store.get_idol(second).await?) else {
        return Ok(None);
    };

    let mut compared = Vec::with_capacity(2);
    for idol in [&a, &b] {
        let ranking = store.latest_ranking_for(idol.id, OVERALL_CATEGORY).await?;
        compared.push(ComparedIdol {
            idol: idol_view(store, idol).await?,
            current_ranking: ranking.as_ref().map(CurrentRanking::from),
        });
    }

    let idol2 = compared.pop();
    let idol1 = compared.pop();
    Ok(idol1.zip(idol2).map(|(idol1, idol2)| Comparison { idol1, idol2 }))
}

/// Trend points of the last `days` days ending at `now`, oldest first
///
/// `None` when the idol does not exist; an empty series is a valid result.
pub async fn idol_trends(
    store: &dyn RankingStore,
    id: i64,
    days: i64,
    now: i64,
) -> Result<Option<TrendSeries>, StoreError> {
    let Some(idol) = store.get_idol(id).await? else {
        return Ok(None);
    };

    let since = window_start(now, days);
    let trends = store
        .trend_points_for(id, since, now)
        .await?
        .into_iter()
        .map(|point| TrendSample {
            date: format_timestamp(point.recorded_at),
            score: point.score,
            rank: point.rank,
            category: point.category,
        })
        .collect();

    Ok(Some(TrendSeries {
        idol_id: idol.id,
        idol_name: idol.name,
        period_days: days,
        trends,
    }))
}

pub async fn platform_stats(store: &dyn RankingStore) -> Result<PlatformStats, StoreError> {
    let counts = store.platform_counts().await?;

    Ok(PlatformStats {
        total_idols: counts.total_idols,
        active_idols: counts.active_idols,
        total_groups: counts.total_groups,
        active_data_sources: counts.active_sources,
        total_observations: counts.total_observations,
        total_trend_points: counts.total_trend_points,
        ranking_runs: counts.ranking_runs,
        ranking_rows: counts.ranking_rows,
        last_ranked_at: counts.last_ranked_at.map(format_timestamp),
    })
}
