//! # PostgreSQL Registry Store
//!
//! sqlx-backed [`RegistryStore`]. Queries are built at runtime so the crate
//! compiles without a live database; the schema ships as an embedded migration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};

use super::{RegistryEntry, RegistryStore};
use crate::config::DatabaseConfig;
use crate::error::{DeployerError, DeployerResult, RegistryError, RegistryResult};
use crate::state_machine::ImportStatus;

const SELECT_COLUMNS: &str = r#"
    SELECT filename, workflow_name, remote_id, local_checksum, trigger_paths, is_active,
           import_status, last_import_at, last_error, retry_count, created_at, updated_at
    FROM workflow_registry
"#;

#[derive(Debug, FromRow)]
struct RegistryRow {
    filename: String,
    workflow_name: String,
    remote_id: Option<String>,
    local_checksum: String,
    trigger_paths: Vec<String>,
    is_active: bool,
    import_status: String,
    last_import_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    retry_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RegistryRow> for RegistryEntry {
    type Error = RegistryError;

    fn try_from(row: RegistryRow) -> Result<Self, Self::Error> {
        let import_status =
            row.import_status
                .parse::<ImportStatus>()
                .map_err(|reason| RegistryError::InvalidRow {
                    filename: row.filename.clone(),
                    reason,
                })?;

        Ok(RegistryEntry {
            filename: row.filename,
            workflow_name: row.workflow_name,
            remote_id: row.remote_id,
            local_checksum: row.local_checksum,
            trigger_paths: row.trigger_paths,
            is_active: row.is_active,
            import_status,
            last_import_at: row.last_import_at,
            last_error: row.last_error,
            retry_count: row.retry_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgRegistryStore {
    pool: PgPool,
}

impl PgRegistryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using the configured database URL
    pub async fn connect(config: &DatabaseConfig) -> DeployerResult<Self> {
        let url = config.url.as_deref().ok_or_else(|| {
            DeployerError::ConfigurationError("database.url is not configured".to_string())
        })?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await
            .map_err(RegistryError::from)?;
        info!(max_connections = config.max_connections, "Connected registry database");
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> DeployerResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RegistryError::DatabaseError(format!("Migration failed: {e}")))?;
        debug!("Registry migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn convert(rows: Vec<RegistryRow>) -> RegistryResult<Vec<RegistryEntry>> {
        rows.into_iter().map(RegistryEntry::try_from).collect()
    }
}

#[async_trait]
impl RegistryStore for PgRegistryStore {
    async fn find_by_filename(&self, filename: &str) -> RegistryResult<Option<RegistryEntry>> {
        let sql = format!("{SELECT_COLUMNS} WHERE filename = $1");
        let row = sqlx::query_as::<_, RegistryRow>(&sql)
            .bind(filename)
            .fetch_optional(&self.pool)
            .await?;
        row.map(RegistryEntry::try_from).transpose()
    }

    async fn list_all(&self) -> RegistryResult<Vec<RegistryEntry>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY filename");
        let rows = sqlx::query_as::<_, RegistryRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Self::convert(rows)
    }

    async fn list_by_status(
        &self,
        statuses: &[ImportStatus],
    ) -> RegistryResult<Vec<RegistryEntry>> {
        let statuses: Vec<String> = statuses.iter().map(ToString::to_string).collect();
        let sql = format!("{SELECT_COLUMNS} WHERE import_status = ANY($1) ORDER BY filename");
        let rows = sqlx::query_as::<_, RegistryRow>(&sql)
            .bind(&statuses)
            .fetch_all(&self.pool)
            .await?;
        Self::convert(rows)
    }

    async fn upsert(&self, entry: &RegistryEntry) -> RegistryResult<RegistryEntry> {
        let sql = format!(
            r#"
            INSERT INTO workflow_registry
                (filename, workflow_name, remote_id, local_checksum, trigger_paths, is_active,
                 import_status, last_import_at, last_error, retry_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (filename) DO UPDATE SET
                workflow_name = EXCLUDED.workflow_name,
                remote_id = EXCLUDED.remote_id,
                local_checksum = EXCLUDED.local_checksum,
                trigger_paths = EXCLUDED.trigger_paths,
                is_active = EXCLUDED.is_active,
                import_status = EXCLUDED.import_status,
                last_import_at = EXCLUDED.last_import_at,
                last_error = EXCLUDED.last_error,
                retry_count = EXCLUDED.retry_count,
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            "filename, workflow_name, remote_id, local_checksum, trigger_paths, is_active, \
             import_status, last_import_at, last_error, retry_count, created_at, updated_at"
        );

        let row = sqlx::query_as::<_, RegistryRow>(&sql)
            .bind(&entry.filename)
            .bind(&entry.workflow_name)
            .bind(&entry.remote_id)
            .bind(&entry.local_checksum)
            .bind(&entry.trigger_paths)
            .bind(entry.is_active)
            .bind(entry.import_status.to_string())
            .bind(entry.last_import_at)
            .bind(&entry.last_error)
            .bind(entry.retry_count)
            .bind(entry.created_at)
            .bind(entry.updated_at)
            .fetch_one(&self.pool)
            .await?;

        RegistryEntry::try_from(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> RegistryRow {
        let now = Utc::now();
        RegistryRow {
            filename: "a.json".into(),
            workflow_name: "A".into(),
            remote_id: Some("wf-1".into()),
            local_checksum: "abc".into(),
            trigger_paths: vec!["hook".into()],
            is_active: false,
            import_status: status.into(),
            last_import_at: None,
            last_error: None,
            retry_count: 2,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_conversion() {
        let entry = RegistryEntry::try_from(row("pending_activation")).unwrap();
        assert_eq!(entry.import_status, ImportStatus::PendingActivation);
        assert_eq!(entry.retry_count, 2);
        assert_eq!(entry.trigger_paths, vec!["hook"]);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = RegistryEntry::try_from(row("exploded")).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRow { .. }));
    }
}
