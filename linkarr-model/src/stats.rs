use serde::{Deserialize, Serialize};

/// Aggregate counts over the record store. Eventually consistent: reflects
/// every record committed before the snapshot read began.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LibraryStats {
    pub total_files: i64,

    // By status.
    pub pending: i64,
    pub matched: i64,
    pub linked: i64,
    pub failed: i64,
    pub manual: i64,
    pub ignored: i64,

    // By kind (file counts; tv counts episodes).
    pub movies_total: i64,
    pub tv_total: i64,

    // Distinct series, keyed by catalog id.
    pub series_count: i64,
    pub series_linked: i64,

    // Status × kind breakdown.
    pub linked_movies: i64,
    pub linked_tv: i64,
    pub pending_movies: i64,
    pub pending_tv: i64,
    pub manual_movies: i64,
    pub manual_tv: i64,
    pub failed_movies: i64,
    pub failed_tv: i64,
}
