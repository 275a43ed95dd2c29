use serde::{Deserialize, Serialize};

use crate::media::MediaRecord;
use crate::scan::{ReprocessSummary, ScanSummary};
use crate::stats::LibraryStats;

/// Events published on the in-process bus and fanned out to live
/// subscribers. Wire form is JSON: `{"type": "...", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    FileAdded(MediaRecord),
    FileUpdated(MediaRecord),
    FileDeleted { id: i64 },
    ScanStarted,
    ScanProgress {
        current: usize,
        total: usize,
        filename: String,
    },
    ScanCompleted(ScanSummary),
    StatsUpdated(LibraryStats),
    ReprocessStarted { total: usize },
    ReprocessProgress {
        current: usize,
        total: usize,
        linked: usize,
        filename: String,
    },
    ReprocessCompleted(ReprocessSummary),
}

impl Event {
    /// Stable event kind label, matching the wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::FileAdded(_) => "file_added",
            Event::FileUpdated(_) => "file_updated",
            Event::FileDeleted { .. } => "file_deleted",
            Event::ScanStarted => "scan_started",
            Event::ScanProgress { .. } => "scan_progress",
            Event::ScanCompleted(_) => "scan_completed",
            Event::StatsUpdated(_) => "stats_updated",
            Event::ReprocessStarted { .. } => "reprocess_started",
            Event::ReprocessProgress { .. } => "reprocess_progress",
            Event::ReprocessCompleted(_) => "reprocess_completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_tag_with_snake_case_type() {
        let event = Event::ScanProgress {
            current: 50,
            total: 120,
            filename: "50/120".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "scan_progress");
        assert_eq!(value["data"]["current"], 50);
        assert_eq!(event.kind(), "scan_progress");
    }

    #[test]
    fn unit_variant_has_no_data() {
        let value = serde_json::to_value(Event::ScanStarted).unwrap();
        assert_eq!(value["type"], "scan_started");
        assert!(value.get("data").is_none());
    }
}
