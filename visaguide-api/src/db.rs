//! PostgreSQL Record Store
//!
//! Connection pooling through deadpool-postgres and a [`RecordStore`]
//! implementation over a single `visa_info` table. The pool and the schema are
//! created lazily, once, on first use.

use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts,
};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_postgres::{types::ToSql, NoTls, Row};
use uuid::Uuid;
use visaguide_core::{
    ContentRecord, GeneratedContent, GuideError, GuideResult, Provider, RecordStatus, RequestKey,
    StoreError, Timestamp,
};
use visaguide_storage::{stale_cutoff, RecordPatch, RecordStore};

use crate::error::{ApiError, ApiResult};

// ============================================================================
// DATABASE CONFIGURATION
// ============================================================================

/// Database connection configuration.
#[derive(Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait/create/recycle timeout for pooled connections
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "visaguide".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("max_size", &self.max_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    ///
    /// Environment variables: `VISAGUIDE_DB_HOST`, `VISAGUIDE_DB_PORT`,
    /// `VISAGUIDE_DB_NAME`, `VISAGUIDE_DB_USER`, `VISAGUIDE_DB_PASSWORD`,
    /// `VISAGUIDE_DB_POOL_SIZE`, `VISAGUIDE_DB_TIMEOUT` (seconds).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("VISAGUIDE_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("VISAGUIDE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("VISAGUIDE_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("VISAGUIDE_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("VISAGUIDE_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("VISAGUIDE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: std::env::var("VISAGUIDE_DB_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig {
            max_size: self.max_size,
            timeouts: Timeouts {
                wait: Some(self.timeout),
                create: Some(self.timeout),
                recycle: Some(self.timeout),
            },
            ..Default::default()
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))
    }
}

// ============================================================================
// SQL
// ============================================================================

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS visa_info (
    id                  UUID PRIMARY KEY,
    resident_country    TEXT NOT NULL,
    nationality         TEXT NOT NULL,
    destination         TEXT NOT NULL,
    visa_category       TEXT NOT NULL,
    visa_type           TEXT NOT NULL,
    visa_description    TEXT,
    eligibility         TEXT,
    required_documents  TEXT,
    application_process TEXT,
    processing_time     TEXT,
    fees                TEXT,
    validity            TEXT,
    stay_duration       TEXT,
    restrictions        TEXT,
    additional_notes    TEXT,
    status              TEXT NOT NULL,
    source              TEXT,
    last_updated        TIMESTAMPTZ,
    updated_at          TIMESTAMPTZ NOT NULL,
    CONSTRAINT visa_info_key UNIQUE
        (resident_country, nationality, destination, visa_category, visa_type)
);
CREATE INDEX IF NOT EXISTS visa_info_last_updated_idx ON visa_info (last_updated);
CREATE INDEX IF NOT EXISTS visa_info_updated_at_idx ON visa_info (updated_at);
"#;

macro_rules! record_columns {
    () => {
        "id, resident_country, nationality, destination, visa_category, visa_type, \
         visa_description, eligibility, required_documents, application_process, \
         processing_time, fees, validity, stay_duration, restrictions, additional_notes, \
         status, source, last_updated, updated_at"
    };
}

/// Content columns are only overwritten when `$21` is true. `source` and
/// `last_updated` keep their stored value when the write leaves them null.
const UPSERT_SQL: &str = concat!(
    "INSERT INTO visa_info (",
    record_columns!(),
    ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20) \
     ON CONFLICT ON CONSTRAINT visa_info_key DO UPDATE SET \
     visa_description    = CASE WHEN $21 THEN EXCLUDED.visa_description    ELSE visa_info.visa_description END, \
     eligibility         = CASE WHEN $21 THEN EXCLUDED.eligibility         ELSE visa_info.eligibility END, \
     required_documents  = CASE WHEN $21 THEN EXCLUDED.required_documents  ELSE visa_info.required_documents END, \
     application_process = CASE WHEN $21 THEN EXCLUDED.application_process ELSE visa_info.application_process END, \
     processing_time     = CASE WHEN $21 THEN EXCLUDED.processing_time     ELSE visa_info.processing_time END, \
     fees                = CASE WHEN $21 THEN EXCLUDED.fees                ELSE visa_info.fees END, \
     validity            = CASE WHEN $21 THEN EXCLUDED.validity            ELSE visa_info.validity END, \
     stay_duration       = CASE WHEN $21 THEN EXCLUDED.stay_duration       ELSE visa_info.stay_duration END, \
     restrictions        = CASE WHEN $21 THEN EXCLUDED.restrictions        ELSE visa_info.restrictions END, \
     additional_notes    = CASE WHEN $21 THEN EXCLUDED.additional_notes    ELSE visa_info.additional_notes END, \
     status              = EXCLUDED.status, \
     source              = COALESCE(EXCLUDED.source, visa_info.source), \
     last_updated        = COALESCE(EXCLUDED.last_updated, visa_info.last_updated), \
     updated_at          = EXCLUDED.updated_at \
     RETURNING ",
    record_columns!()
);

const UPDATE_SQL: &str = "UPDATE visa_info SET \
     visa_description    = CASE WHEN $6 THEN $7  ELSE visa_description END, \
     eligibility         = CASE WHEN $6 THEN $8  ELSE eligibility END, \
     required_documents  = CASE WHEN $6 THEN $9  ELSE required_documents END, \
     application_process = CASE WHEN $6 THEN $10 ELSE application_process END, \
     processing_time     = CASE WHEN $6 THEN $11 ELSE processing_time END, \
     fees                = CASE WHEN $6 THEN $12 ELSE fees END, \
     validity            = CASE WHEN $6 THEN $13 ELSE validity END, \
     stay_duration       = CASE WHEN $6 THEN $14 ELSE stay_duration END, \
     restrictions        = CASE WHEN $6 THEN $15 ELSE restrictions END, \
     additional_notes    = CASE WHEN $6 THEN $16 ELSE additional_notes END, \
     status              = $17, \
     source              = COALESCE($18, source), \
     last_updated        = COALESCE($19, last_updated), \
     updated_at          = $20 \
     WHERE resident_country = $1 AND nationality = $2 AND destination = $3 \
       AND visa_category = $4 AND visa_type = $5";

const FIND_ONE_SQL: &str = concat!(
    "SELECT ",
    record_columns!(),
    " FROM visa_info WHERE resident_country = $1 AND nationality = $2 AND destination = $3 \
      AND visa_category = $4 AND visa_type = $5"
);

const FIND_STALE_SQL: &str = concat!(
    "SELECT ",
    record_columns!(),
    " FROM visa_info WHERE last_updated < $1 ORDER BY last_updated ASC LIMIT $2"
);

const PURGE_SQL: &str = "DELETE FROM visa_info WHERE updated_at < $1";

// ============================================================================
// POSTGRES RECORD STORE
// ============================================================================

/// Record store backed by PostgreSQL.
///
/// The pool is built, and the schema bootstrapped, on the first operation.
/// Concurrent first callers wait on the same initialization.
pub struct PgRecordStore {
    config: DbConfig,
    pool: OnceCell<Pool>,
}

impl PgRecordStore {
    pub fn new(config: DbConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    /// Use an existing pool. The schema is still bootstrapped on first use.
    pub async fn with_pool(config: DbConfig, pool: Pool) -> GuideResult<Self> {
        bootstrap_schema(&pool).await?;
        Ok(Self {
            config,
            pool: OnceCell::new_with(Some(pool)),
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    async fn pool(&self) -> GuideResult<&Pool> {
        self.pool
            .get_or_try_init(|| async {
                let pool = self.config.create_pool().map_err(|e| {
                    StoreError::ConnectionFailed {
                        reason: e.message,
                    }
                })?;
                bootstrap_schema(&pool).await?;
                tracing::info!(
                    host = %self.config.host,
                    dbname = %self.config.dbname,
                    max_size = self.config.max_size,
                    "Postgres record store ready"
                );
                Ok::<Pool, GuideError>(pool)
            })
            .await
    }

    async fn conn(&self) -> GuideResult<deadpool_postgres::Object> {
        let pool = self.pool().await?;
        pool.get().await.map_err(|e| {
            StoreError::ConnectionFailed {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Round-trip a trivial query. Used by the readiness probe.
    pub async fn ping(&self) -> ApiResult<()> {
        let pool = self.pool().await.map_err(ApiError::from)?;
        let conn = pool.get().await?;
        conn.query_one("SELECT 1", &[]).await?;
        Ok(())
    }

    /// Current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.get().map(|p| p.status().size).unwrap_or(0)
    }
}

async fn bootstrap_schema(pool: &Pool) -> GuideResult<()> {
    let conn = pool.get().await.map_err(|e| StoreError::ConnectionFailed {
        reason: e.to_string(),
    })?;
    conn.batch_execute(SCHEMA_SQL)
        .await
        .map_err(|e| StoreError::QueryFailed {
            reason: format!("schema bootstrap failed: {}", e),
        })?;
    Ok(())
}

/// Content columns in table order, for binding as parameters.
fn content_params(content: &GeneratedContent) -> [&Option<String>; 10] {
    [
        &content.visa_description,
        &content.eligibility,
        &content.required_documents,
        &content.application_process,
        &content.processing_time,
        &content.fees,
        &content.validity,
        &content.stay_duration,
        &content.restrictions,
        &content.additional_notes,
    ]
}

fn text(row: &Row, column: &str) -> GuideResult<String> {
    row.try_get::<_, String>(column).map_err(|e| column_error(column, e))
}

fn opt_text(row: &Row, column: &str) -> GuideResult<Option<String>> {
    row.try_get::<_, Option<String>>(column)
        .map_err(|e| column_error(column, e))
}

fn column_error(column: &str, e: tokio_postgres::Error) -> GuideError {
    StoreError::QueryFailed {
        reason: format!("column '{}': {}", column, e),
    }
    .into()
}

fn record_from_row(row: &Row) -> GuideResult<ContentRecord> {
    let id: Uuid = row.try_get("id").map_err(|e| column_error("id", e))?;
    let status: RecordStatus = text(row, "status")?.parse()?;
    let source = match opt_text(row, "source")? {
        Some(raw) => Some(raw.parse::<Provider>().map_err(|e| StoreError::QueryFailed {
            reason: e.to_string(),
        })?),
        None => None,
    };

    Ok(ContentRecord {
        id,
        key: RequestKey::new(
            text(row, "resident_country")?,
            text(row, "nationality")?,
            text(row, "destination")?,
            text(row, "visa_category")?,
            text(row, "visa_type")?,
        ),
        content: GeneratedContent {
            visa_description: opt_text(row, "visa_description")?,
            eligibility: opt_text(row, "eligibility")?,
            required_documents: opt_text(row, "required_documents")?,
            application_process: opt_text(row, "application_process")?,
            processing_time: opt_text(row, "processing_time")?,
            fees: opt_text(row, "fees")?,
            validity: opt_text(row, "validity")?,
            stay_duration: opt_text(row, "stay_duration")?,
            restrictions: opt_text(row, "restrictions")?,
            additional_notes: opt_text(row, "additional_notes")?,
        },
        status,
        source,
        last_updated: row
            .try_get::<_, Option<Timestamp>>("last_updated")
            .map_err(|e| column_error("last_updated", e))?,
        updated_at: row
            .try_get::<_, Timestamp>("updated_at")
            .map_err(|e| column_error("updated_at", e))?,
    })
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn upsert(&self, key: &RequestKey, patch: &RecordPatch) -> GuideResult<ContentRecord> {
        let conn = self.conn().await?;

        let id = visaguide_core::new_entity_id();
        let content = patch.content.clone().unwrap_or_default();
        let status = patch.status.as_str();
        let source = patch.source.map(|p| p.as_str());
        let has_content = patch.has_content();

        let mut params: Vec<&(dyn ToSql + Sync)> = vec![
            &id,
            &key.resident_country,
            &key.nationality,
            &key.destination,
            &key.visa_category,
            &key.visa_type,
        ];
        for column in content_params(&content) {
            params.push(column);
        }
        params.push(&status);
        params.push(&source);
        params.push(&patch.last_updated);
        params.push(&patch.updated_at);
        params.push(&has_content);

        let row = conn
            .query_one(UPSERT_SQL, &params)
            .await
            .map_err(|e| StoreError::UpsertFailed {
                key: key.composite_id().into_inner(),
                reason: e.to_string(),
            })?;
        record_from_row(&row)
    }

    async fn find_one(&self, key: &RequestKey) -> GuideResult<Option<ContentRecord>> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                FIND_ONE_SQL,
                &[
                    &key.resident_country,
                    &key.nationality,
                    &key.destination,
                    &key.visa_category,
                    &key.visa_type,
                ],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn update_fields(&self, key: &RequestKey, patch: &RecordPatch) -> GuideResult<()> {
        let conn = self.conn().await?;

        let content = patch.content.clone().unwrap_or_default();
        let status = patch.status.as_str();
        let source = patch.source.map(|p| p.as_str());
        let has_content = patch.has_content();

        let mut params: Vec<&(dyn ToSql + Sync)> = vec![
            &key.resident_country,
            &key.nationality,
            &key.destination,
            &key.visa_category,
            &key.visa_type,
            &has_content,
        ];
        for column in content_params(&content) {
            params.push(column);
        }
        params.push(&status);
        params.push(&source);
        params.push(&patch.last_updated);
        params.push(&patch.updated_at);

        let updated = conn
            .execute(UPDATE_SQL, &params)
            .await
            .map_err(|e| StoreError::UpdateFailed {
                key: key.composite_id().into_inner(),
                reason: e.to_string(),
            })?;

        if updated == 0 {
            return Err(StoreError::NotFound {
                key: key.composite_id().into_inner(),
            }
            .into());
        }
        Ok(())
    }

    async fn find_stale(&self, cutoff: Timestamp, limit: usize) -> GuideResult<Vec<ContentRecord>> {
        let conn = self.conn().await?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = conn
            .query(FIND_STALE_SQL, &[&cutoff, &limit])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        rows.iter().map(record_from_row).collect()
    }

    async fn purge_older_than(&self, days: u32) -> GuideResult<u64> {
        let conn = self.conn().await?;
        let cutoff = stale_cutoff(days, Utc::now());
        let removed = conn
            .execute(PURGE_SQL, &[&cutoff])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        tracing::info!(removed, days, "Purged untouched records");
        Ok(removed)
    }

    async fn health_check(&self) -> GuideResult<()> {
        self.ping().await.map_err(|e| {
            StoreError::ConnectionFailed { reason: e.message }.into()
        })
    }
}
