//! Core library for the Linkarr media organizer.
//!
//! The ingestion pipeline lives here: filesystem discovery, heuristic
//! filename parsing, catalog matching with progressive fallback, hardlink
//! materialization, and the concurrent scheduler that drives them with
//! durable per-record state and live progress events.

pub mod arr;
pub mod autoscan;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod events;
pub mod linker;
pub mod parser;
pub mod store;

pub use arr::{RadarrClient, SonarrClient};
pub use autoscan::AutoScanner;
pub use catalog::{CatalogMatch, Matcher, MetadataMatcher, TmdbClient, TvdbClient};
pub use engine::IngestionEngine;
pub use error::{CoreError, Result};
pub use events::{EventBus, Subscription};
pub use linker::{FileLinker, LinkMethod};
pub use parser::{MediaParser, ParsedMedia};
pub use store::{NewRecord, RecordStore};
