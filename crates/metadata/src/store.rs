//! Metadata store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{AnalyticsRepo, ApiKeyRepo, ProjectRepo, UpdateRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    UpdateRepo + ProjectRepo + ApiKeyRepo + AnalyticsRepo + Send + Sync
{
    /// Create or update the schema.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS updates (
    id                  TEXT PRIMARY KEY NOT NULL,
    project_slug        TEXT NOT NULL,
    update_id           TEXT NOT NULL,
    runtime_version     TEXT NOT NULL,
    channel             TEXT NOT NULL,
    platform            TEXT NOT NULL,
    bundle_path         TEXT,
    created_at          TEXT NOT NULL,
    is_active           INTEGER NOT NULL DEFAULT 1,
    is_rollback         INTEGER NOT NULL DEFAULT 0,
    rollout_percentage  INTEGER NOT NULL DEFAULT 100,
    downloads           INTEGER NOT NULL DEFAULT 0,
    metadata            TEXT
);

CREATE INDEX IF NOT EXISTS idx_updates_lookup
    ON updates(project_slug, runtime_version, channel, is_active, created_at);
CREATE INDEX IF NOT EXISTS idx_updates_update_id ON updates(update_id);

CREATE TABLE IF NOT EXISTS projects (
    id            TEXT PRIMARY KEY NOT NULL,
    slug          TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    description   TEXT,
    created_at    TEXT NOT NULL,
    update_count  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS api_keys (
    id            TEXT PRIMARY KEY NOT NULL,
    name          TEXT NOT NULL,
    key_hash      TEXT NOT NULL UNIQUE,
    prefix        TEXT NOT NULL,
    scopes        TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    last_used_at  TEXT
);

CREATE TABLE IF NOT EXISTS downloads (
    id           TEXT PRIMARY KEY NOT NULL,
    update_id    TEXT NOT NULL,
    platform     TEXT NOT NULL,
    timestamp    TEXT NOT NULL,
    success      INTEGER NOT NULL DEFAULT 1,
    device_hash  TEXT
);

CREATE INDEX IF NOT EXISTS idx_downloads_update ON downloads(update_id);
CREATE INDEX IF NOT EXISTS idx_downloads_timestamp ON downloads(timestamp);
"#;

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) a SQLite store at `path` and run
    /// migrations.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // avoids persistent "database is locked" failures under load.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use airlift_core::hash::sha256_hex;
    use airlift_core::{CHANNEL_PRODUCTION, PLATFORM_ALL};
    use rand::RngCore;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn clamp_rollout(value: i64) -> i64 {
        value.clamp(0, 100)
    }

    #[async_trait]
    impl UpdateRepo for SqliteStore {
        async fn create_update(&self, update: NewUpdate) -> MetadataResult<UpdateRecord> {
            let id = Uuid::new_v4();
            let created_at = update.created_at.unwrap_or_else(OffsetDateTime::now_utc);
            let channel = if update.channel.is_empty() {
                CHANNEL_PRODUCTION.to_string()
            } else {
                update.channel
            };
            let platform = if update.platform.is_empty() {
                PLATFORM_ALL.to_string()
            } else {
                update.platform
            };
            let rollout = clamp_rollout(update.rollout_percentage.unwrap_or(100));
            let metadata_json = update
                .metadata
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| MetadataError::Serialization(format!("update metadata: {e}")))?;

            sqlx::query(
                r#"
                INSERT INTO updates (
                    id, project_slug, update_id, runtime_version, channel,
                    platform, bundle_path, created_at, is_active, is_rollback,
                    rollout_percentage, downloads, metadata
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, 0, ?)
                "#,
            )
            .bind(id)
            .bind(&update.project_slug)
            .bind(&update.update_id)
            .bind(&update.runtime_version)
            .bind(&channel)
            .bind(&platform)
            .bind(&update.bundle_path)
            .bind(created_at)
            .bind(update.is_rollback)
            .bind(rollout)
            .bind(&metadata_json)
            .execute(&self.pool)
            .await?;

            Ok(UpdateRecord {
                id,
                project_slug: update.project_slug,
                update_id: update.update_id,
                runtime_version: update.runtime_version,
                channel,
                platform,
                bundle_path: update.bundle_path,
                created_at,
                is_active: true,
                is_rollback: update.is_rollback,
                rollout_percentage: rollout,
                downloads: 0,
                metadata: update.metadata,
            })
        }

        async fn find_latest(
            &self,
            project_slug: &str,
            runtime_version: &str,
            channel: &str,
            platform: &str,
        ) -> MetadataResult<Option<UpdateRecord>> {
            let row = sqlx::query_as::<_, UpdateRow>(
                r#"
                SELECT * FROM updates
                WHERE project_slug = ? AND runtime_version = ? AND channel = ?
                  AND is_active = 1 AND platform IN (?, ?)
                ORDER BY created_at DESC
                LIMIT 1
                "#,
            )
            .bind(project_slug)
            .bind(runtime_version)
            .bind(channel)
            .bind(platform)
            .bind(PLATFORM_ALL)
            .fetch_optional(&self.pool)
            .await?;

            row.map(UpdateRecord::try_from).transpose()
        }

        async fn find_update(&self, id: Uuid) -> MetadataResult<Option<UpdateRecord>> {
            let row = sqlx::query_as::<_, UpdateRow>("SELECT * FROM updates WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            row.map(UpdateRecord::try_from).transpose()
        }

        async fn find_update_by_update_id(
            &self,
            update_id: &str,
        ) -> MetadataResult<Option<UpdateRecord>> {
            let row = sqlx::query_as::<_, UpdateRow>(
                "SELECT * FROM updates WHERE update_id = ? ORDER BY created_at DESC LIMIT 1",
            )
            .bind(update_id)
            .fetch_optional(&self.pool)
            .await?;
            row.map(UpdateRecord::try_from).transpose()
        }

        async fn list_updates(
            &self,
            filter: &UpdateFilter,
            limit: i64,
            offset: i64,
        ) -> MetadataResult<(Vec<UpdateRecord>, i64)> {
            let mut count_query =
                sqlx::QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM updates WHERE 1=1");
            let mut list_query =
                sqlx::QueryBuilder::<Sqlite>::new("SELECT * FROM updates WHERE 1=1");

            for query in [&mut count_query, &mut list_query] {
                if let Some(slug) = &filter.project_slug {
                    query.push(" AND project_slug = ").push_bind(slug.clone());
                }
                if let Some(channel) = &filter.channel {
                    query.push(" AND channel = ").push_bind(channel.clone());
                }
                if let Some(runtime) = &filter.runtime_version {
                    query
                        .push(" AND runtime_version = ")
                        .push_bind(runtime.clone());
                }
            }

            let total: i64 = count_query
                .build_query_scalar()
                .fetch_one(&self.pool)
                .await?;

            list_query
                .push(" ORDER BY created_at DESC LIMIT ")
                .push_bind(limit)
                .push(" OFFSET ")
                .push_bind(offset);

            let rows: Vec<UpdateRow> = list_query
                .build_query_as()
                .fetch_all(&self.pool)
                .await?;

            let records = rows
                .into_iter()
                .map(UpdateRecord::try_from)
                .collect::<MetadataResult<Vec<_>>>()?;

            Ok((records, total))
        }

        async fn patch_update(&self, id: Uuid, patch: &UpdatePatch) -> MetadataResult<()> {
            if patch.is_active.is_none() && patch.rollout_percentage.is_none() {
                return Ok(());
            }

            let mut query = sqlx::QueryBuilder::<Sqlite>::new("UPDATE updates SET ");
            let mut fields = query.separated(", ");
            if let Some(is_active) = patch.is_active {
                fields.push("is_active = ");
                fields.push_bind_unseparated(is_active);
            }
            if let Some(rollout) = patch.rollout_percentage {
                fields.push("rollout_percentage = ");
                fields.push_bind_unseparated(clamp_rollout(rollout));
            }
            query.push(" WHERE id = ").push_bind(id);

            let result = query.build().execute(&self.pool).await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("update {id} not found")));
            }
            Ok(())
        }

        async fn delete_update(&self, id: Uuid) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM updates WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("update {id} not found")));
            }
            Ok(())
        }

        async fn delete_updates_by_project(&self, project_slug: &str) -> MetadataResult<u64> {
            let result = sqlx::query("DELETE FROM updates WHERE project_slug = ?")
                .bind(project_slug)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        }

        async fn increment_downloads(&self, id: Uuid) -> MetadataResult<()> {
            sqlx::query("UPDATE updates SET downloads = downloads + 1 WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }
    }

    #[async_trait]
    impl ProjectRepo for SqliteStore {
        async fn create_project(
            &self,
            slug: &str,
            name: &str,
            description: Option<&str>,
        ) -> MetadataResult<ProjectRecord> {
            if self.find_project(slug).await?.is_some() {
                return Err(MetadataError::AlreadyExists(format!(
                    "project '{slug}' already exists"
                )));
            }

            let record = ProjectRecord {
                id: Uuid::new_v4(),
                slug: slug.to_string(),
                name: name.to_string(),
                description: description.map(str::to_string),
                created_at: OffsetDateTime::now_utc(),
                update_count: 0,
            };

            sqlx::query(
                "INSERT INTO projects (id, slug, name, description, created_at, update_count) \
                 VALUES (?, ?, ?, ?, ?, 0)",
            )
            .bind(record.id)
            .bind(&record.slug)
            .bind(&record.name)
            .bind(&record.description)
            .bind(record.created_at)
            .execute(&self.pool)
            .await?;

            Ok(record)
        }

        async fn ensure_project(&self, slug: &str, name: &str) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO projects (id, slug, name, description, created_at, update_count) \
                 VALUES (?, ?, ?, NULL, ?, 0) ON CONFLICT(slug) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(slug)
            .bind(name)
            .bind(OffsetDateTime::now_utc())
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn list_projects(&self) -> MetadataResult<Vec<ProjectRecord>> {
            let rows = sqlx::query_as::<_, ProjectRecord>(
                "SELECT * FROM projects ORDER BY created_at DESC",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn find_project(&self, slug: &str) -> MetadataResult<Option<ProjectRecord>> {
            let row = sqlx::query_as::<_, ProjectRecord>("SELECT * FROM projects WHERE slug = ?")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn delete_project(&self, slug: &str) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM projects WHERE slug = ?")
                .bind(slug)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("project '{slug}' not found")));
            }
            Ok(())
        }

        async fn adjust_update_count(&self, slug: &str, delta: i64) -> MetadataResult<()> {
            sqlx::query(
                "UPDATE projects SET update_count = MAX(0, update_count + ?) WHERE slug = ?",
            )
            .bind(delta)
            .bind(slug)
            .execute(&self.pool)
            .await?;
            Ok(())
        }
    }

    #[async_trait]
    impl ApiKeyRepo for SqliteStore {
        async fn create_api_key(
            &self,
            name: &str,
            scopes: &[String],
        ) -> MetadataResult<(String, ApiKeyRecord)> {
            let mut key_bytes = [0u8; 32];
            rand::rngs::OsRng.fill_bytes(&mut key_bytes);
            let plaintext = format!("ota_{}", hex::encode(key_bytes));
            let key_hash = sha256_hex(plaintext.as_bytes());

            let record = ApiKeyRecord {
                id: Uuid::new_v4(),
                name: name.to_string(),
                key_hash: key_hash.clone(),
                prefix: plaintext[..8].to_string(),
                scopes: scopes.to_vec(),
                created_at: OffsetDateTime::now_utc(),
                last_used_at: None,
            };

            let scopes_json = serde_json::to_string(&record.scopes)
                .map_err(|e| MetadataError::Serialization(format!("api key scopes: {e}")))?;

            sqlx::query(
                "INSERT INTO api_keys (id, name, key_hash, prefix, scopes, created_at, last_used_at) \
                 VALUES (?, ?, ?, ?, ?, ?, NULL)",
            )
            .bind(record.id)
            .bind(&record.name)
            .bind(&record.key_hash)
            .bind(&record.prefix)
            .bind(&scopes_json)
            .bind(record.created_at)
            .execute(&self.pool)
            .await?;

            Ok((plaintext, record))
        }

        async fn validate_api_key(
            &self,
            plaintext: &str,
        ) -> MetadataResult<Option<ApiKeyRecord>> {
            let key_hash = sha256_hex(plaintext.as_bytes());
            let row = sqlx::query_as::<_, ApiKeyRow>("SELECT * FROM api_keys WHERE key_hash = ?")
                .bind(&key_hash)
                .fetch_optional(&self.pool)
                .await?;
            row.map(ApiKeyRecord::try_from).transpose()
        }

        async fn touch_api_key(&self, id: Uuid, used_at: OffsetDateTime) -> MetadataResult<()> {
            sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
                .bind(used_at)
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn list_api_keys(&self) -> MetadataResult<Vec<ApiKeyRecord>> {
            let rows =
                sqlx::query_as::<_, ApiKeyRow>("SELECT * FROM api_keys ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?;
            rows.into_iter()
                .map(ApiKeyRecord::try_from)
                .collect::<MetadataResult<Vec<_>>>()
        }

        async fn delete_api_key(&self, id: Uuid) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM api_keys WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("api key {id} not found")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AnalyticsRepo for SqliteStore {
        async fn log_download(&self, event: NewDownload) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO downloads (id, update_id, platform, timestamp, success, device_hash) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4())
            .bind(event.update_id)
            .bind(&event.platform)
            .bind(OffsetDateTime::now_utc())
            .bind(event.success)
            .bind(&event.device_hash)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn download_summary(&self) -> MetadataResult<DownloadSummary> {
            let now = OffsetDateTime::now_utc();
            let start_of_day = now.replace_time(time::Time::MIDNIGHT);
            let start_of_week = now - time::Duration::days(7);

            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM downloads")
                .fetch_one(&self.pool)
                .await?;
            let today: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM downloads WHERE timestamp >= ?")
                    .bind(start_of_day)
                    .fetch_one(&self.pool)
                    .await?;
            let week: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM downloads WHERE timestamp >= ?")
                    .bind(start_of_week)
                    .fetch_one(&self.pool)
                    .await?;

            let by_platform: Vec<(String, i64)> = sqlx::query_as(
                "SELECT platform, COUNT(*) FROM downloads GROUP BY platform",
            )
            .fetch_all(&self.pool)
            .await?;

            let by_channel: Vec<(String, i64)> = sqlx::query_as(
                "SELECT u.channel, COUNT(*) FROM downloads d \
                 JOIN updates u ON u.id = d.update_id GROUP BY u.channel",
            )
            .fetch_all(&self.pool)
            .await?;

            let by_runtime: Vec<(String, i64)> = sqlx::query_as(
                "SELECT u.runtime_version, COUNT(*) FROM downloads d \
                 JOIN updates u ON u.id = d.update_id GROUP BY u.runtime_version",
            )
            .fetch_all(&self.pool)
            .await?;

            Ok(DownloadSummary {
                total_downloads: total,
                today_downloads: today,
                week_downloads: week,
                by_platform: by_platform.into_iter().collect(),
                by_channel: by_channel.into_iter().collect(),
                by_runtime_version: by_runtime.into_iter().collect(),
            })
        }
    }
}
