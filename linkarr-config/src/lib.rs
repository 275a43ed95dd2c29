//! Runtime-mutable configuration for Linkarr.
//!
//! A single JSON document on disk holds every operator-tunable setting:
//! source and destination roots, catalog credentials, auto-scan cadence,
//! and discovery filters. [`ConfigStore`] caches the document in memory and
//! replaces it atomically on update (write to temp file, then rename).

mod model;
mod store;

pub use model::{AppConfig, ConfigPatch, SourceMode};
pub use store::{ConfigError, ConfigStore};
