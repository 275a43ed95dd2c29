use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counts reported when a scan finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Video files discovered under the configured sources.
    pub scanned: usize,
    /// Records created during this scan.
    pub new: usize,
    /// Pending records that went through match + link.
    pub processed: usize,
    pub linked: usize,
    pub failed: usize,
    pub manual: usize,
    /// Records removed by the orphan sweep.
    pub deleted: usize,
}

/// Counts reported when a reprocess pass finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReprocessSummary {
    pub total: usize,
    pub processed: usize,
    pub linked: usize,
    pub failed: usize,
    pub manual: usize,
}

/// Snapshot of the periodic driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoScanStatus {
    pub enabled: bool,
    pub interval: u64,
    pub unit: String,
    pub running: bool,
    pub last_scan: Option<DateTime<Utc>>,
    pub next_scan: Option<DateTime<Utc>>,
}
