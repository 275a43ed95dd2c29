//! Core data model definitions shared across Linkarr crates.

pub mod events;
pub mod media;
pub mod scan;
pub mod stats;

// Intentionally curated re-exports for downstream consumers.
pub use events::Event;
pub use media::{
    MediaGroup, MediaKind, MediaRecord, RecordQuery, RecordStatus,
    SeasonGroup, fold_groups,
};
pub use scan::{AutoScanStatus, ReprocessSummary, ScanSummary};
pub use stats::LibraryStats;
