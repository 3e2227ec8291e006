//! SQLite storage backend implementation
//!
//! This module provides the relational implementation of the `MetricStore`
//! trait.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers are not blocked while a batch is being written
//! - **Connection pooling**: Statements are prepared once per connection and
//!   cached by sqlx, so repeated upserts inside a batch reuse their handles
//! - **Idempotent schema**: The `metric` table is created on first use
//!
//! ## Write path
//!
//! Every `upsert` runs an existence check followed by an insert or update
//! inside its own transaction. `batch_upsert` runs the same per-element logic
//! inside a single transaction and commits once; any failing element rolls
//! back the whole batch.
//!
//! Writers are serialized by an async mutex. SQLite only admits one writer at
//! a time anyway, and holding the mutex keeps the read-check-write sequence
//! linearizable per metric name.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, MetricStore, merge_into};
use super::error::{StorageError, StorageResult};
use super::schema::{
    CREATE_METRIC_TABLE, MetricRow, millis_to_timestamp, timestamp_to_millis,
};
use crate::{Metric, MetricKind, MetricSet, MetricValue};

const SELECT_METRIC: &str = r#"
    SELECT metric_name, metric_type, metric_delta, metric_value, created_at, updated_at
    FROM metric
    WHERE metric_name = ?
"#;

const SELECT_ALL_METRICS: &str = r#"
    SELECT metric_name, metric_type, metric_delta, metric_value, created_at, updated_at
    FROM metric
    ORDER BY metric_name ASC
"#;

const INSERT_METRIC: &str = r#"
    INSERT INTO metric (metric_name, metric_type, metric_delta, metric_value, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

const UPDATE_METRIC: &str = r#"
    UPDATE metric
    SET metric_delta = ?, metric_value = ?, updated_at = ?
    WHERE metric_name = ?
"#;

/// SQLite storage backend
///
/// Stores one row per metric name in a local SQLite database file.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    db_path: String,
    write_lock: Mutex<()>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Configure SQLite (WAL mode, busy timeout)
    /// 3. Create the `metric` table if it is missing
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use metrics_relay::storage::sqlite::SqliteStore;
    /// # async fn example() -> anyhow::Result<()> {
    /// let store = SqliteStore::new("./metrics.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("ensuring metric table exists");
        sqlx::query(CREATE_METRIC_TABLE).execute(&pool).await?;

        info!("SQLite backend ready");

        Ok(Self {
            pool,
            db_path: db_path_str,
            write_lock: Mutex::new(()),
        })
    }

    fn decode_row(row: &SqliteRow) -> StorageResult<MetricRow> {
        Ok(MetricRow {
            name: row.try_get("metric_name")?,
            kind: row.try_get("metric_type")?,
            delta: row.try_get("metric_delta")?,
            value: row.try_get("metric_value")?,
            created_at: millis_to_timestamp(row.try_get("created_at")?),
            updated_at: millis_to_timestamp(row.try_get("updated_at")?),
        })
    }

    async fn fetch(conn: &mut SqliteConnection, name: &str) -> StorageResult<Option<Metric>> {
        let row = sqlx::query(SELECT_METRIC)
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::decode_row(&row)?.into_metric()?)),
            None => Ok(None),
        }
    }

    async fn insert(conn: &mut SqliteConnection, metric: &Metric) -> StorageResult<()> {
        let row = MetricRow::from_metric(metric, Utc::now());

        sqlx::query(INSERT_METRIC)
            .bind(&row.name)
            .bind(&row.kind)
            .bind(row.delta)
            .bind(row.value)
            .bind(timestamp_to_millis(&row.created_at))
            .bind(timestamp_to_millis(&row.updated_at))
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn update(conn: &mut SqliteConnection, metric: &Metric) -> StorageResult<()> {
        let (delta, value) = match metric.value {
            MetricValue::Gauge(value) => (None, Some(value)),
            MetricValue::Counter(delta) => (Some(delta), None),
        };

        sqlx::query(UPDATE_METRIC)
            .bind(delta)
            .bind(value)
            .bind(timestamp_to_millis(&Utc::now()))
            .bind(&metric.name)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Existence check followed by insert or merge-and-update
    async fn apply(conn: &mut SqliteConnection, metric: &Metric) -> StorageResult<Metric> {
        match Self::fetch(conn, &metric.name).await? {
            None => {
                Self::insert(conn, metric).await?;
                Ok(metric.clone())
            }
            Some(stored) => {
                let merged = merge_into(Some(&stored), metric)?;
                Self::update(conn, &merged).await?;
                Ok(merged)
            }
        }
    }
}

#[async_trait]
impl MetricStore for SqliteStore {
    #[instrument(skip(self))]
    async fn get(&self, name: &str) -> StorageResult<Metric> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, name)
            .await?
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    #[instrument(skip(self))]
    async fn get_all(&self) -> StorageResult<MetricSet> {
        let rows = sqlx::query(SELECT_ALL_METRICS)
            .fetch_all(&self.pool)
            .await?;

        let mut metrics = MetricSet::new();
        for row in rows {
            let metric = Self::decode_row(&row)?.into_metric()?;
            metrics.insert(metric.name.clone(), metric);
        }

        debug!("loaded {} metrics", metrics.len());
        Ok(metrics)
    }

    #[instrument(skip(self, metric), fields(name = %metric.name))]
    async fn upsert(&self, metric: Metric) -> StorageResult<Metric> {
        let _guard = self.write_lock.lock().await;

        let mut tx = self.pool.begin().await?;
        let stored = match Self::apply(&mut tx, &metric).await {
            Ok(stored) => stored,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };
        tx.commit().await?;

        Ok(stored)
    }

    #[instrument(skip(self, batch), fields(count = batch.len()))]
    async fn batch_upsert(&self, batch: Vec<Metric>) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;

        debug!("applying batch of {} metrics", batch.len());

        let mut tx = self.pool.begin().await?;
        for metric in &batch {
            if let Err(e) = Self::apply(&mut tx, metric).await {
                warn!("rolling back batch, {} failed: {}", metric.name, e);
                tx.rollback().await?;
                return Err(e);
            }
        }
        tx.commit().await?;

        debug!("batch committed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn reset_counter(&self, name: &str) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut tx = self.pool.begin().await?;
        let reset = Metric::counter(name, 0);

        let result = match Self::fetch(&mut tx, name).await {
            Ok(None) => Self::insert(&mut tx, &reset).await,
            Ok(Some(stored)) if stored.kind() == MetricKind::Counter => {
                Self::update(&mut tx, &reset).await
            }
            Ok(Some(stored)) => Err(StorageError::KindMismatch {
                name: name.to_string(),
                stored: stored.kind(),
                incoming: MetricKind::Counter,
            }),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => tx.commit().await?,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        // Simple ping query to verify connection
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
