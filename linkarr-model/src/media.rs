use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a source file was identified as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum MediaKind {
    Movie,
    Tv,
    #[default]
    Unknown,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
            MediaKind::Unknown => "unknown",
        }
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a record sits in the ingestion lifecycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum RecordStatus {
    /// Observed but not yet processed.
    Pending,
    /// A catalog match was found, link not yet materialized.
    Matched,
    /// Destination link exists on disk.
    Linked,
    /// Unexpected error; message in `error_message`.
    Failed,
    /// Needs operator attention (no match, missing fields).
    Manual,
    /// Excluded by operator command.
    Ignored,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Matched => "matched",
            RecordStatus::Linked => "linked",
            RecordStatus::Failed => "failed",
            RecordStatus::Manual => "manual",
            RecordStatus::Ignored => "ignored",
        }
    }
}

impl Display for RecordStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row per distinct source path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MediaRecord {
    pub id: i64,
    pub source_path: String,
    pub source_filename: String,
    pub file_size: i64,
    pub parsed_title: Option<String>,
    pub parsed_year: Option<i64>,
    pub parsed_season: Option<i64>,
    pub parsed_episode: Option<i64>,
    pub media_kind: MediaKind,
    pub catalog_id: Option<i64>,
    pub catalog_title: Option<String>,
    pub catalog_year: Option<i64>,
    pub catalog_poster_url: Option<String>,
    pub destination_path: Option<String>,
    pub status: RecordStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl MediaRecord {
    /// Display title: the catalog title once matched, the parsed title before.
    pub fn title(&self) -> &str {
        self.catalog_title
            .as_deref()
            .or(self.parsed_title.as_deref())
            .unwrap_or(&self.source_filename)
    }
}

/// Filter for record listings. All fields optional; `limit`/`offset` page the
/// result ordered by `created_at` descending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordQuery {
    pub status: Option<RecordStatus>,
    pub kind: Option<MediaKind>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Episodes of one season, in episode order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonGroup {
    pub season: i64,
    pub episodes: Vec<MediaRecord>,
}

/// Records folded by title: one group per movie or series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaGroup {
    pub title: String,
    pub kind: MediaKind,
    pub catalog_id: Option<i64>,
    pub year: Option<i64>,
    pub poster_url: Option<String>,
    pub total: usize,
    pub linked: usize,
    /// Populated for TV groups, season-bucketed.
    pub seasons: Vec<SeasonGroup>,
    /// Populated for movie (and unknown) groups.
    pub files: Vec<MediaRecord>,
}

/// Fold records ordered by `(catalog_title, parsed_season, parsed_episode)`
/// into per-title groups, bucketing TV episodes by season.
pub fn fold_groups(records: Vec<MediaRecord>) -> Vec<MediaGroup> {
    let mut groups: Vec<MediaGroup> = Vec::new();

    for record in records {
        let title = record.title().to_string();
        let matches_last = groups
            .last()
            .is_some_and(|g| g.title == title && g.kind == record.media_kind);
        if !matches_last {
            groups.push(MediaGroup {
                title,
                kind: record.media_kind,
                catalog_id: record.catalog_id,
                year: record.catalog_year.or(record.parsed_year),
                poster_url: record.catalog_poster_url.clone(),
                total: 0,
                linked: 0,
                seasons: Vec::new(),
                files: Vec::new(),
            });
        }

        let group = groups.last_mut().expect("group pushed above");
        group.total += 1;
        if record.status == RecordStatus::Linked {
            group.linked += 1;
        }
        if group.poster_url.is_none() {
            group.poster_url = record.catalog_poster_url.clone();
        }

        if record.media_kind == MediaKind::Tv {
            let season = record.parsed_season.unwrap_or(1);
            match group.seasons.iter_mut().find(|s| s.season == season) {
                Some(bucket) => bucket.episodes.push(record),
                None => group.seasons.push(SeasonGroup {
                    season,
                    episodes: vec![record],
                }),
            }
        } else {
            group.files.push(record);
        }
    }

    // Input ordering guarantees episode order inside a season, but seasons of
    // one series can interleave with unmatched records; keep them sorted.
    for group in &mut groups {
        group.seasons.sort_by_key(|s| s.season);
    }
    groups
}
