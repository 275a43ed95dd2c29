use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use linkarr_model::{LibraryStats, MediaKind, MediaRecord, RecordQuery, RecordStatus};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;

use crate::error::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS media_records (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    source_path         TEXT NOT NULL UNIQUE,
    source_filename     TEXT NOT NULL,
    file_size           INTEGER NOT NULL DEFAULT 0,
    parsed_title        TEXT,
    parsed_year         INTEGER,
    parsed_season       INTEGER,
    parsed_episode      INTEGER,
    media_kind          TEXT NOT NULL DEFAULT 'unknown',
    catalog_id          INTEGER,
    catalog_title       TEXT,
    catalog_year        INTEGER,
    catalog_poster_url  TEXT,
    destination_path    TEXT,
    status              TEXT NOT NULL DEFAULT 'pending',
    error_message       TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL,
    processed_at        TEXT
);
CREATE INDEX IF NOT EXISTS idx_media_records_status ON media_records(status);
CREATE INDEX IF NOT EXISTS idx_media_records_kind ON media_records(media_kind);
CREATE INDEX IF NOT EXISTS idx_media_records_catalog ON media_records(catalog_id);
"#;

/// Fields known before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub source_path: String,
    pub source_filename: String,
    pub file_size: i64,
    pub parsed_title: Option<String>,
    pub parsed_year: Option<i64>,
    pub parsed_season: Option<i64>,
    pub parsed_episode: Option<i64>,
    pub media_kind: MediaKind,
}

/// Durable store for [`MediaRecord`]s, one row per distinct source path.
///
/// Every operation acquires its own pooled connection and commits as a
/// single statement, so concurrent workers never hold state across each
/// other's writes.
#[derive(Debug, Clone)]
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    /// Open (creating if missing) the database at `path`.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init().await?;
        info!(path = %path.display(), "record store ready");
        Ok(store)
    }

    /// In-memory store for tests.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .expect("static connection string");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a new pending record. A duplicate `source_path` collapses to
    /// an update of the observation fields; parse, match, and status of the
    /// existing row are preserved.
    pub async fn insert(&self, new: NewRecord) -> Result<MediaRecord> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, MediaRecord>(
            r#"
            INSERT INTO media_records (
                source_path, source_filename, file_size,
                parsed_title, parsed_year, parsed_season, parsed_episode,
                media_kind, status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)
            ON CONFLICT(source_path) DO UPDATE SET
                source_filename = excluded.source_filename,
                file_size = excluded.file_size,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(&new.source_path)
        .bind(&new.source_filename)
        .bind(new.file_size)
        .bind(&new.parsed_title)
        .bind(new.parsed_year)
        .bind(new.parsed_season)
        .bind(new.parsed_episode)
        .bind(new.media_kind)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    /// Persist every mutable field of `record`. `updated_at` is bumped here.
    pub async fn update(&self, record: &MediaRecord) -> Result<MediaRecord> {
        let now = Utc::now();
        let updated = sqlx::query_as::<_, MediaRecord>(
            r#"
            UPDATE media_records SET
                source_filename = ?,
                file_size = ?,
                parsed_title = ?,
                parsed_year = ?,
                parsed_season = ?,
                parsed_episode = ?,
                media_kind = ?,
                catalog_id = ?,
                catalog_title = ?,
                catalog_year = ?,
                catalog_poster_url = ?,
                destination_path = ?,
                status = ?,
                error_message = ?,
                updated_at = ?,
                processed_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&record.source_filename)
        .bind(record.file_size)
        .bind(&record.parsed_title)
        .bind(record.parsed_year)
        .bind(record.parsed_season)
        .bind(record.parsed_episode)
        .bind(record.media_kind)
        .bind(record.catalog_id)
        .bind(&record.catalog_title)
        .bind(record.catalog_year)
        .bind(&record.catalog_poster_url)
        .bind(&record.destination_path)
        .bind(record.status)
        .bind(&record.error_message)
        .bind(now)
        .bind(record.processed_at)
        .bind(record.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM media_records WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Option<MediaRecord>> {
        let record =
            sqlx::query_as::<_, MediaRecord>("SELECT * FROM media_records WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(record)
    }

    pub async fn find_by_source_path(&self, path: &str) -> Result<Option<MediaRecord>> {
        let record = sqlx::query_as::<_, MediaRecord>(
            "SELECT * FROM media_records WHERE source_path = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Filtered listing ordered by `created_at` descending.
    pub async fn query(&self, query: &RecordQuery) -> Result<Vec<MediaRecord>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM media_records WHERE 1 = 1");
        Self::push_filters(&mut qb, query.status, query.kind, query.search.as_deref());
        qb.push(" ORDER BY created_at DESC, id DESC");
        if query.limit.is_some() || query.offset.is_some() {
            qb.push(" LIMIT ").push_bind(query.limit.unwrap_or(-1));
            if let Some(offset) = query.offset {
                qb.push(" OFFSET ").push_bind(offset);
            }
        }
        let records = qb.build_query_as::<MediaRecord>().fetch_all(&self.pool).await?;
        Ok(records)
    }

    /// Records ordered for the grouped media view: by catalog title, then
    /// season, then episode. Callers fold the result with
    /// [`linkarr_model::fold_groups`].
    pub async fn group_by_media(
        &self,
        status: Option<RecordStatus>,
        kind: Option<MediaKind>,
        search: Option<&str>,
    ) -> Result<Vec<MediaRecord>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM media_records WHERE 1 = 1");
        Self::push_filters(&mut qb, status, kind, search);
        qb.push(
            " ORDER BY COALESCE(catalog_title, parsed_title, source_filename) COLLATE NOCASE, \
             parsed_season, parsed_episode",
        );
        let records = qb.build_query_as::<MediaRecord>().fetch_all(&self.pool).await?;
        Ok(records)
    }

    fn push_filters(
        qb: &mut QueryBuilder<'_, Sqlite>,
        status: Option<RecordStatus>,
        kind: Option<MediaKind>,
        search: Option<&str>,
    ) {
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(kind) = kind {
            qb.push(" AND media_kind = ").push_bind(kind);
        }
        if let Some(search) = search
            && !search.is_empty()
        {
            let pattern = format!("%{}%", search);
            qb.push(" AND (catalog_title LIKE ")
                .push_bind(pattern.clone())
                .push(" OR parsed_title LIKE ")
                .push_bind(pattern.clone())
                .push(" OR source_filename LIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }

    /// Every record, for the orphan sweep.
    pub async fn list_all(&self) -> Result<Vec<MediaRecord>> {
        let records =
            sqlx::query_as::<_, MediaRecord>("SELECT * FROM media_records ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(records)
    }

    /// Records in any of `statuses`, oldest first. Used by reprocessing.
    pub async fn list_by_statuses(
        &self,
        statuses: &[RecordStatus],
    ) -> Result<Vec<MediaRecord>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM media_records WHERE status IN (");
        let mut separated = qb.separated(", ");
        for status in statuses {
            separated.push_bind(*status);
        }
        qb.push(") ORDER BY id");
        let records = qb.build_query_as::<MediaRecord>().fetch_all(&self.pool).await?;
        Ok(records)
    }

    /// Aggregate counts. One snapshot query, so the sums are consistent with
    /// each other at the moment the read began.
    pub async fn stats(&self) -> Result<LibraryStats> {
        let stats = sqlx::query_as::<_, LibraryStats>(
            r#"
            SELECT
                COUNT(*) AS total_files,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'matched') AS matched,
                COUNT(*) FILTER (WHERE status = 'linked') AS linked,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) FILTER (WHERE status = 'manual') AS manual,
                COUNT(*) FILTER (WHERE status = 'ignored') AS ignored,
                COUNT(*) FILTER (WHERE media_kind = 'movie') AS movies_total,
                COUNT(*) FILTER (WHERE media_kind = 'tv') AS tv_total,
                COUNT(DISTINCT catalog_id) FILTER (
                    WHERE media_kind = 'tv' AND catalog_id IS NOT NULL
                ) AS series_count,
                COUNT(DISTINCT catalog_id) FILTER (
                    WHERE media_kind = 'tv' AND catalog_id IS NOT NULL AND status = 'linked'
                ) AS series_linked,
                COUNT(*) FILTER (WHERE status = 'linked' AND media_kind = 'movie') AS linked_movies,
                COUNT(*) FILTER (WHERE status = 'linked' AND media_kind = 'tv') AS linked_tv,
                COUNT(*) FILTER (WHERE status = 'pending' AND media_kind = 'movie') AS pending_movies,
                COUNT(*) FILTER (WHERE status = 'pending' AND media_kind = 'tv') AS pending_tv,
                COUNT(*) FILTER (WHERE status = 'manual' AND media_kind = 'movie') AS manual_movies,
                COUNT(*) FILTER (WHERE status = 'manual' AND media_kind = 'tv') AS manual_tv,
                COUNT(*) FILTER (WHERE status = 'failed' AND media_kind = 'movie') AS failed_movies,
                COUNT(*) FILTER (WHERE status = 'failed' AND media_kind = 'tv') AS failed_tv
            FROM media_records
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}
