//! Persistence layer: the `RankingStore` trait and its SQLite implementation
//!
//! Tables (see `/sql/`):
//! - `groups`, `idols` - catalog, created by seeding or admin calls
//! - `data_sources` - configured metric sources
//! - `observations`, `trend_points` - INSERT only (append-only series)
//! - `ranking_runs`, `ranking_snapshots` - INSERT only, one transaction per run
//!
//! Every series write checks that the referenced idol exists, and every score
//! is clamped to [0, 100] before it reaches the database.

use super::types::{
    clamp_score, DataSource, Group, Idol, IdolFilter, NewDataSource, NewGroup, NewIdol,
    NewSnapshot, Observation, PlatformCounts, RankingRun, RankingSnapshot, SourceKind, TrendPoint,
};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
pub enum StoreError {
    Database(rusqlite::Error),
    UnknownIdol(i64),
    UnknownGroup(i64),
    LockPoisoned,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::UnknownIdol(id) => write!(f, "Unknown idol id: {}", id),
            StoreError::UnknownGroup(id) => write!(f, "Unknown group id: {}", id),
            StoreError::LockPoisoned => write!(f, "Database connection lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
            _ => None,
        }
    }
}

/// Storage operations used by ingestion, aggregation and the read API
#[async_trait]
pub trait RankingStore: Send + Sync {
    // --- catalog ---

    async fn create_group(&self, group: NewGroup) -> Result<Group, StoreError>;

    async fn get_group(&self, id: i64) -> Result<Option<Group>, StoreError>;

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError>;

    /// Fails with `UnknownGroup` when `group_id` does not reference a group
    async fn create_idol(&self, idol: NewIdol) -> Result<Idol, StoreError>;

    async fn get_idol(&self, id: i64) -> Result<Option<Idol>, StoreError>;

    /// First idol (lowest id) with exactly this name
    async fn find_idol_by_name(&self, name: &str) -> Result<Option<Idol>, StoreError>;

    async fn list_idols(&self, filter: &IdolFilter) -> Result<Vec<Idol>, StoreError>;

    /// Active idols in id order (the aggregator's encounter order)
    async fn active_idols(&self) -> Result<Vec<Idol>, StoreError>;

    async fn set_idol_active(&self, id: i64, active: bool) -> Result<Idol, StoreError>;

    async fn count_idols(&self) -> Result<i64, StoreError>;

    // --- data sources ---

    async fn create_data_source(&self, source: NewDataSource) -> Result<DataSource, StoreError>;

    async fn active_data_sources(&self) -> Result<Vec<DataSource>, StoreError>;

    async fn touch_data_source(&self, id: i64, at: i64) -> Result<(), StoreError>;

    // --- series (append-only) ---

    /// Insert one observation; returns its row id
    async fn insert_observation(&self, observation: &Observation) -> Result<i64, StoreError>;

    /// Insert one trend point (score clamped); returns its row id
    async fn insert_trend_point(&self, point: &TrendPoint) -> Result<i64, StoreError>;

    async fn observations_for(&self, idol_id: i64) -> Result<Vec<Observation>, StoreError>;

    /// Trend points of one idol with `since <= recorded_at <= until`, oldest first
    async fn trend_points_for(
        &self,
        idol_id: i64,
        since: i64,
        until: i64,
    ) -> Result<Vec<TrendPoint>, StoreError>;

    /// Trend points of every idol with `since <= recorded_at <= until`
    async fn trend_points_between(&self, since: i64, until: i64) -> Result<Vec<TrendPoint>, StoreError>;

    // --- rankings ---

    /// Write a complete run atomically. Scores are clamped.
    async fn record_ranking_run(
        &self,
        ranked_at: i64,
        snapshots: &[NewSnapshot],
    ) -> Result<RankingRun, StoreError>;

    /// Rows of the most recent run, optionally restricted to one category
    async fn latest_rankings(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RankingSnapshot>, StoreError>;

    /// Most recent snapshot of one idol in one category
    async fn latest_ranking_for(
        &self,
        idol_id: i64,
        category: &str,
    ) -> Result<Option<RankingSnapshot>, StoreError>;

    async fn run_snapshots(&self, run_id: i64) -> Result<Vec<RankingSnapshot>, StoreError>;

    async fn platform_counts(&self) -> Result<PlatformCounts, StoreError>;
}

const GROUP_COLUMNS: &str = "id, name, company, debut_date, is_active, image_url, created_at";

const IDOL_COLUMNS: &str = "i.id, i.name, i.stage_name, i.real_name, i.group_id, i.company, \
     i.gender, i.position, i.birth_date, i.nationality, i.is_soloist, i.is_active, \
     i.image_url, i.created_at";

const SOURCE_COLUMNS: &str = "id, name, kind, url, api_key, is_active, last_updated";

const SNAPSHOT_COLUMNS: &str = "id, run_id, idol_id, category, rank, score, ranked_at";

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        company: row.get(2)?,
        debut_date: row.get(3)?,
        is_active: row.get(4)?,
        image_url: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn idol_from_row(row: &Row<'_>) -> rusqlite::Result<Idol> {
    Ok(Idol {
        id: row.get(0)?,
        name: row.get(1)?,
        stage_name: row.get(2)?,
        real_name: row.get(3)?,
        group_id: row.get(4)?,
        company: row.get(5)?,
        gender: row.get(6)?,
        position: row.get(7)?,
        birth_date: row.get(8)?,
        nationality: row.get(9)?,
        is_soloist: row.get(10)?,
        is_active: row.get(11)?,
        image_url: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<DataSource> {
    let kind: String = row.get(2)?;
    Ok(DataSource {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: SourceKind::parse(&kind),
        url: row.get(3)?,
        api_key: row.get(4)?,
        is_active: row.get(5)?,
        last_updated: row.get(6)?,
    })
}

fn trend_point_from_row(row: &Row<'_>) -> rusqlite::Result<TrendPoint> {
    Ok(TrendPoint {
        idol_id: row.get(0)?,
        category: row.get(1)?,
        score: row.get(2)?,
        rank: row.get(3)?,
        recorded_at: row.get(4)?,
    })
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<RankingSnapshot> {
    Ok(RankingSnapshot {
        id: row.get(0)?,
        run_id: row.get(1)?,
        idol_id: row.get(2)?,
        category: row.get(3)?,
        rank: row.get(4)?,
        score: row.get(5)?,
        ranked_at: row.get(6)?,
    })
}

/// SQLite implementation of RankingStore
///
/// One shared connection; each call locks it for the duration of its
/// statements only.
pub struct SqliteRankingStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRankingStore {
    /// Open a store on an existing database
    ///
    /// Note: does NOT create the schema. Run `db::run_schema_migrations` first.
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let conn = super::db::open_connection(db_path)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn idol_exists(conn: &Connection, id: i64) -> Result<bool, StoreError> {
        let mut stmt = conn.prepare_cached("SELECT 1 FROM idols WHERE id = ?1")?;
        Ok(stmt.exists([id])?)
    }

    fn load_idol(conn: &Connection, id: i64) -> Result<Option<Idol>, StoreError> {
        let sql = format!("SELECT {} FROM idols i WHERE i.id = ?1", IDOL_COLUMNS);
        Ok(conn.query_row(&sql, [id], idol_from_row).optional()?)
    }

    fn load_group(conn: &Connection, id: i64) -> Result<Option<Group>, StoreError> {
        let sql = format!("SELECT {} FROM groups WHERE id = ?1", GROUP_COLUMNS);
        Ok(conn.query_row(&sql, [id], group_from_row).optional()?)
    }

    fn count(conn: &Connection, sql: &str) -> Result<i64, StoreError> {
        Ok(conn.query_row(sql, [], |row| row.get(0))?)
    }
}

#[async_trait]
impl RankingStore for SqliteRankingStore {
    async fn create_group(&self, group: NewGroup) -> Result<Group, StoreError> {
        let conn = self.lock()?;
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT INTO groups (name, company, debut_date, is_active, image_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                group.name,
                group.company,
                group.debut_date,
                group.is_active,
                group.image_url,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::load_group(&conn, id)?.ok_or(StoreError::UnknownGroup(id))
    }

    async fn get_group(&self, id: i64) -> Result<Option<Group>, StoreError> {
        let conn = self.lock()?;
        Self::load_group(&conn, id)
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM groups ORDER BY id", GROUP_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let groups = stmt
            .query_map([], group_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    async fn create_idol(&self, idol: NewIdol) -> Result<Idol, StoreError> {
        let conn = self.lock()?;

        if let Some(group_id) = idol.group_id {
            if Self::load_group(&conn, group_id)?.is_none() {
                return Err(StoreError::UnknownGroup(group_id));
            }
        }

        let now = chrono::Utc::now().timestamp();
        conn.execute(
            r#"
            INSERT INTO idols (
                name, stage_name, real_name, group_id, company, gender, position,
                birth_date, nationality, is_soloist, is_active, image_url, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                idol.name,
                idol.stage_name,
                idol.real_name,
                idol.group_id,
                idol.company,
                idol.gender,
                idol.position,
                idol.birth_date,
                idol.nationality,
                idol.is_soloist,
                idol.is_active,
                idol.image_url,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::load_idol(&conn, id)?.ok_or(StoreError::UnknownIdol(id))
    }

    async fn get_idol(&self, id: i64) -> Result<Option<Idol>, StoreError> {
        let conn = self.lock()?;
        Self::load_idol(&conn, id)
    }

    async fn find_idol_by_name(&self, name: &str) -> Result<Option<Idol>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM idols i WHERE i.name = ?1 ORDER BY i.id LIMIT 1",
            IDOL_COLUMNS
        );
        Ok(conn.query_row(&sql, [name], idol_from_row).optional()?)
    }

    async fn list_idols(&self, filter: &IdolFilter) -> Result<Vec<Idol>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM idols i
            LEFT JOIN groups g ON g.id = i.group_id
            WHERE (?1 IS NULL OR g.name = ?1)
              AND (?2 IS NULL OR lower(i.gender) = lower(?2))
            ORDER BY i.id
            "#,
            IDOL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let idols = stmt
            .query_map(params![filter.group, filter.gender], idol_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(idols)
    }

    async fn active_idols(&self) -> Result<Vec<Idol>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM idols i WHERE i.is_active = 1 ORDER BY i.id",
            IDOL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let idols = stmt
            .query_map([], idol_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(idols)
    }

    async fn set_idol_active(&self, id: i64, active: bool) -> Result<Idol, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE idols SET is_active = ?1 WHERE id = ?2",
            params![active, id],
        )?;
        if changed == 0 {
            return Err(StoreError::UnknownIdol(id));
        }
        Self::load_idol(&conn, id)?.ok_or(StoreError::UnknownIdol(id))
    }

    async fn count_idols(&self) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        Self::count(&conn, "SELECT COUNT(*) FROM idols")
    }

    async fn create_data_source(&self, source: NewDataSource) -> Result<DataSource, StoreError> {
        let conn = self.lock()?;
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT INTO data_sources (name, kind, url, api_key, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                source.name,
                source.kind.as_str(),
                source.url,
                source.api_key,
                source.is_active,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        let sql = format!("SELECT {} FROM data_sources WHERE id = ?1", SOURCE_COLUMNS);
        Ok(conn.query_row(&sql, [id], source_from_row)?)
    }

    async fn active_data_sources(&self) -> Result<Vec<DataSource>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM data_sources WHERE is_active = 1 ORDER BY id",
            SOURCE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let sources = stmt
            .query_map([], source_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sources)
    }

    async fn touch_data_source(&self, id: i64, at: i64) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE data_sources SET last_updated = ?1 WHERE id = ?2",
            params![at, id],
        )?;
        Ok(())
    }

    async fn insert_observation(&self, observation: &Observation) -> Result<i64, StoreError> {
        let conn = self.lock()?;

        if !Self::idol_exists(&conn, observation.idol_id)? {
            return Err(StoreError::UnknownIdol(observation.idol_id));
        }

        conn.execute(
            "INSERT INTO observations (idol_id, metric_type, value, source, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                observation.idol_id,
                observation.metric_type,
                observation.value,
                observation.source,
                observation.recorded_at,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    async fn insert_trend_point(&self, point: &TrendPoint) -> Result<i64, StoreError> {
        let conn = self.lock()?;

        if !Self::idol_exists(&conn, point.idol_id)? {
            return Err(StoreError::UnknownIdol(point.idol_id));
        }

        conn.execute(
            "INSERT INTO trend_points (idol_id, category, score, rank, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                point.idol_id,
                point.category,
                clamp_score(point.score),
                point.rank,
                point.recorded_at,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    async fn observations_for(&self, idol_id: i64) -> Result<Vec<Observation>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT idol_id, metric_type, value, source, recorded_at
             FROM observations WHERE idol_id = ?1 ORDER BY recorded_at, id",
        )?;
        let observations = stmt
            .query_map([idol_id], |row| {
                Ok(Observation {
                    idol_id: row.get(0)?,
                    metric_type: row.get(1)?,
                    value: row.get(2)?,
                    source: row.get(3)?,
                    recorded_at: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(observations)
    }

    async fn trend_points_for(
        &self,
        idol_id: i64,
        since: i64,
        until: i64,
    ) -> Result<Vec<TrendPoint>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT idol_id, category, score, rank, recorded_at
             FROM trend_points
             WHERE idol_id = ?1 AND recorded_at >= ?2 AND recorded_at <= ?3
             ORDER BY recorded_at, id",
        )?;
        let points = stmt
            .query_map(params![idol_id, since, until], trend_point_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(points)
    }

    async fn trend_points_between(&self, since: i64, until: i64) -> Result<Vec<TrendPoint>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT idol_id, category, score, rank, recorded_at
             FROM trend_points
             WHERE recorded_at >= ?1 AND recorded_at <= ?2
             ORDER BY idol_id, recorded_at, id",
        )?;
        let points = stmt
            .query_map(params![since, until], trend_point_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(points)
    }

    async fn record_ranking_run(
        &self,
        ranked_at: i64,
        snapshots: &[NewSnapshot],
    ) -> Result<RankingRun, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute("INSERT INTO ranking_runs (ranked_at) VALUES (?1)", [ranked_at])?;
        let run_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO ranking_snapshots (run_id, idol_id, category, rank, score, ranked_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for snapshot in snapshots {
                if !Self::idol_exists(&tx, snapshot.idol_id)? {
                    return Err(StoreError::UnknownIdol(snapshot.idol_id));
                }
                stmt.execute(params![
                    run_id,
                    snapshot.idol_id,
                    snapshot.category,
                    snapshot.rank,
                    clamp_score(snapshot.score),
                    ranked_at,
                ])?;
            }
        }

        tx.commit()?;

        Ok(RankingRun {
            id: run_id,
            ranked_at,
        })
    }

    async fn latest_rankings(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RankingSnapshot>, StoreError> {
        let conn = self.lock()?;
        let limit = limit as i64;

        let rows = match category {
            Some(category) => {
                let run_id: Option<i64> = conn.query_row(
                    "SELECT MAX(run_id) FROM ranking_snapshots WHERE category = ?1",
                    [category],
                    |row| row.get(0),
                )?;
                let Some(run_id) = run_id else {
                    return Ok(Vec::new());
                };
                let sql = format!(
                    "SELECT {} FROM ranking_snapshots
                     WHERE run_id = ?1 AND category = ?2
                     ORDER BY rank LIMIT ?3",
                    SNAPSHOT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![run_id, category, limit], snapshot_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let run_id: Option<i64> =
                    conn.query_row("SELECT MAX(id) FROM ranking_runs", [], |row| row.get(0))?;
                let Some(run_id) = run_id else {
                    return Ok(Vec::new());
                };
                // "overall" first, then the per-category sets
                let sql = format!(
                    "SELECT {} FROM ranking_snapshots
                     WHERE run_id = ?1
                     ORDER BY (category != 'overall'), category, rank LIMIT ?2",
                    SNAPSHOT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![run_id, limit], snapshot_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };

        Ok(rows)
    }

    async fn latest_ranking_for(
        &self,
        idol_id: i64,
        category: &str,
    ) -> Result<Option<RankingSnapshot>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM ranking_snapshots
             WHERE idol_id = ?1 AND category = ?2
             ORDER BY run_id DESC LIMIT 1",
            SNAPSHOT_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![idol_id, category], snapshot_from_row)
            .optional()?)
    }

    async fn run_snapshots(&self, run_id: i64) -> Result<Vec<RankingSnapshot>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM ranking_snapshots WHERE run_id = ?1 ORDER BY category, rank",
            SNAPSHOT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([run_id], snapshot_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn platform_counts(&self) -> Result<PlatformCounts, StoreError> {
        let conn = self.lock()?;

        Ok(PlatformCounts {
            total_idols: Self::count(&conn, "SELECT COUNT(*) FROM idols")?,
            active_idols: Self::count(&conn, "SELECT COUNT(*) FROM idols WHERE is_active = 1")?,
            total_groups: Self::count(&conn, "SELECT COUNT(*) FROM groups")?,
            active_sources: Self::count(&conn, "SELECT COUNT(*) FROM data_sources WHERE is_active = 1")?,
            total_observations: Self::count(&conn, "SELECT COUNT(*) FROM observations")?,
            total_trend_points: Self::count(&conn, "SELECT COUNT(*) FROM trend_points")?,
            ranking_runs: Self::count(&conn, "SELECT COUNT(*) FROM ranking_runs")?,
            ranking_rows: Self::count(&conn, "SELECT COUNT(*) FROM ranking_snapshots")?,
            last_ranked_at: conn.query_row("SELECT MAX(ranked_at) FROM ranking_runs", [], |row| {
                row.get(0)
            })?,
        })
    }
}
