//! SQLite-based run history store

use crate::core::RunStatus;
use crate::persistence::{PersistenceBackend, RunSummary};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

const COLUMNS: &str = "id, pipeline, status, started_at, finished_at, \
     passed_stages, failed_stages, skipped_stages, total_stages, failed_steps";

/// SQLite run store
pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl SqliteRunStore {
    /// Open (or create) a store at `db_path`; `":memory:"` gives a private database
    pub async fn new(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))
            .with_context(|| format!("Invalid database path: {}", db_path))?
            .create_if_missing(true);

        // A single connection keeps ":memory:" databases shared across queries.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Location of the history database in the platform data directory
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stagerun")
            .join("runs.db")
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let db_path = Self::default_path();
        Self::open(&db_path).await
    }

    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let db_path = db_path
            .to_str()
            .ok_or_else(|| anyhow!("Database path is not valid UTF-8: {}", db_path.display()))?;
        Self::new(db_path).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                pipeline TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                passed_stages INTEGER NOT NULL DEFAULT 0,
                failed_stages INTEGER NOT NULL DEFAULT 0,
                skipped_stages INTEGER NOT NULL DEFAULT 0,
                total_stages INTEGER NOT NULL DEFAULT 0,
                failed_steps INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_runs_pipeline ON runs(pipeline);
            CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs(started_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize schema")?;

        Ok(())
    }

    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn from_row(row: &SqliteRow) -> Result<RunSummary> {
        let count = |column: &str| row.get::<i64, _>(column) as usize;

        Ok(RunSummary {
            run_id: Uuid::parse_str(&row.get::<String, _>("id"))?,
            pipeline: row.get("pipeline"),
            status: RunStatus::from_str(&row.get::<String, _>("status")).map_err(|e| anyhow!(e))?,
            started_at: Self::from_naive(row.get("started_at")),
            finished_at: Self::from_naive(row.get("finished_at")),
            passed_stages: count("passed_stages"),
            failed_stages: count("failed_stages"),
            skipped_stages: count("skipped_stages"),
            total_stages: count("total_stages"),
            failed_steps: count("failed_steps"),
        })
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for SqliteRunStore {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO runs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            COLUMNS
        ))
        .bind(run.run_id.to_string())
        .bind(&run.pipeline)
        .bind(run.status.to_string())
        .bind(run.started_at.naive_utc())
        .bind(run.finished_at.naive_utc())
        .bind(run.passed_stages as i64)
        .bind(run.failed_stages as i64)
        .bind(run.skipped_stages as i64)
        .bind(run.total_stages as i64)
        .bind(run.failed_steps as i64)
        .execute(&self.pool)
        .await
        .context("Failed to save run")?;

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let row = sqlx::query(&format!("SELECT {} FROM runs WHERE id = ?1", COLUMNS))
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load run")?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list_runs(&self, pipeline: &str) -> Result<Vec<RunSummary>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM runs WHERE pipeline = ?1 ORDER BY started_at DESC",
            COLUMNS
        ))
        .bind(pipeline)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list runs")?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT pipeline FROM runs ORDER BY pipeline ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list pipelines")?;

        Ok(rows.iter().map(|row| row.get("pipeline")).collect())
    }
}
