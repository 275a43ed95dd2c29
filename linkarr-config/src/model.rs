use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Discovery layout: one mixed source tree, or one tree per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    #[default]
    Unified,
    Separate,
}

impl Display for SourceMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceMode::Unified => f.write_str("unified"),
            SourceMode::Separate => f.write_str("separate"),
        }
    }
}

fn default_source_path() -> String {
    "/mnt/alldebrid/torrents".to_string()
}

fn default_source_movies_path() -> String {
    "/mnt/alldebrid/movies".to_string()
}

fn default_source_tv_path() -> String {
    "/mnt/alldebrid/tv".to_string()
}

fn default_movies_path() -> String {
    "/mnt/media/movies".to_string()
}

fn default_tv_path() -> String {
    "/mnt/media/tv".to_string()
}

fn default_auto_scan_interval() -> u64 {
    30
}

fn default_auto_scan_unit() -> String {
    "minutes".to_string()
}

fn default_tmdb_language() -> String {
    "fr-FR".to_string()
}

fn default_min_video_size_mb() -> u64 {
    50
}

fn default_video_extensions() -> Vec<String> {
    [".mkv", ".mp4", ".avi", ".mov", ".wmv", ".m4v", ".webm"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// The persisted configuration document. Unknown fields in the stored JSON
/// are dropped on load; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source_mode: SourceMode,

    /// Source root in unified mode.
    #[serde(default = "default_source_path")]
    pub source_path: String,

    /// Source roots in separate mode; kind is forced per root.
    #[serde(default = "default_source_movies_path")]
    pub source_movies_path: String,
    #[serde(default = "default_source_tv_path")]
    pub source_tv_path: String,

    /// Destination roots.
    #[serde(default = "default_movies_path")]
    pub movies_path: String,
    #[serde(default = "default_tv_path")]
    pub tv_path: String,

    pub radarr_url: String,
    pub radarr_api_key: String,
    pub sonarr_url: String,
    pub sonarr_api_key: String,

    /// When set, a scan refuses to start unless both arr endpoints respond.
    pub require_arr: bool,

    pub auto_scan_enabled: bool,
    #[serde(default = "default_auto_scan_interval")]
    pub auto_scan_interval: u64,
    /// "seconds" or "minutes".
    #[serde(default = "default_auto_scan_unit")]
    pub auto_scan_unit: String,

    pub tmdb_api_key: String,
    #[serde(default = "default_tmdb_language")]
    pub tmdb_language: String,
    pub tvdb_api_key: String,
    pub tvdb_language: String,

    #[serde(default = "default_min_video_size_mb")]
    pub min_video_size_mb: u64,
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_mode: SourceMode::Unified,
            source_path: default_source_path(),
            source_movies_path: default_source_movies_path(),
            source_tv_path: default_source_tv_path(),
            movies_path: default_movies_path(),
            tv_path: default_tv_path(),
            radarr_url: String::new(),
            radarr_api_key: String::new(),
            sonarr_url: String::new(),
            sonarr_api_key: String::new(),
            require_arr: false,
            auto_scan_enabled: false,
            auto_scan_interval: default_auto_scan_interval(),
            auto_scan_unit: default_auto_scan_unit(),
            tmdb_api_key: String::new(),
            tmdb_language: default_tmdb_language(),
            tvdb_api_key: String::new(),
            tvdb_language: String::new(),
            min_video_size_mb: default_min_video_size_mb(),
            video_extensions: default_video_extensions(),
        }
    }
}

impl AppConfig {
    pub fn source_path(&self) -> PathBuf {
        PathBuf::from(&self.source_path)
    }

    pub fn source_movies_path(&self) -> PathBuf {
        PathBuf::from(&self.source_movies_path)
    }

    pub fn source_tv_path(&self) -> PathBuf {
        PathBuf::from(&self.source_tv_path)
    }

    pub fn movies_path(&self) -> PathBuf {
        PathBuf::from(&self.movies_path)
    }

    pub fn tv_path(&self) -> PathBuf {
        PathBuf::from(&self.tv_path)
    }

    /// Minimum qualifying video size in bytes.
    pub fn min_video_size(&self) -> u64 {
        self.min_video_size_mb * 1024 * 1024
    }

    /// Recognized extensions, lowercased, with their leading dot.
    pub fn video_extensions(&self) -> HashSet<String> {
        self.video_extensions
            .iter()
            .map(|ext| ext.to_lowercase())
            .collect()
    }

    /// Auto-scan cadence in seconds, honoring the configured unit.
    pub fn auto_scan_interval_seconds(&self) -> u64 {
        if self.auto_scan_unit == "seconds" {
            self.auto_scan_interval
        } else {
            self.auto_scan_interval * 60
        }
    }

    /// True when an update to `other` changes any field the periodic driver
    /// reads, meaning the driver should be restarted.
    pub fn auto_scan_fields_differ(&self, other: &AppConfig) -> bool {
        self.auto_scan_enabled != other.auto_scan_enabled
            || self.auto_scan_interval != other.auto_scan_interval
            || self.auto_scan_unit != other.auto_scan_unit
    }
}

/// Partial update: only non-null fields are merged into the document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub source_mode: Option<SourceMode>,
    pub source_path: Option<String>,
    pub source_movies_path: Option<String>,
    pub source_tv_path: Option<String>,
    pub movies_path: Option<String>,
    pub tv_path: Option<String>,
    pub radarr_url: Option<String>,
    pub radarr_api_key: Option<String>,
    pub sonarr_url: Option<String>,
    pub sonarr_api_key: Option<String>,
    pub require_arr: Option<bool>,
    pub auto_scan_enabled: Option<bool>,
    pub auto_scan_interval: Option<u64>,
    pub auto_scan_unit: Option<String>,
    pub tmdb_api_key: Option<String>,
    pub tmdb_language: Option<String>,
    pub tvdb_api_key: Option<String>,
    pub tvdb_language: Option<String>,
    pub min_video_size_mb: Option<u64>,
    pub video_extensions: Option<Vec<String>>,
}

macro_rules! merge_fields {
    ($patch:ident => $config:ident: $($field:ident),* $(,)?) => {
        $(if let Some(value) = $patch.$field {
            $config.$field = value;
        })*
    };
}

impl ConfigPatch {
    /// Apply every present field onto `config`.
    pub fn apply(self, config: &mut AppConfig) {
        let patch = self;
        merge_fields!(patch => config:
            source_mode,
            source_path,
            source_movies_path,
            source_tv_path,
            movies_path,
            tv_path,
            radarr_url,
            radarr_api_key,
            sonarr_url,
            sonarr_api_key,
            require_arr,
            auto_scan_enabled,
            auto_scan_interval,
            auto_scan_unit,
            tmdb_api_key,
            tmdb_language,
            tvdb_api_key,
            tvdb_language,
            min_video_size_mb,
            video_extensions,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_video_size_converts_megabytes() {
        let config = AppConfig {
            min_video_size_mb: 50,
            ..AppConfig::default()
        };
        assert_eq!(config.min_video_size(), 50 * 1024 * 1024);
    }

    #[test]
    fn interval_honors_unit() {
        let mut config = AppConfig {
            auto_scan_interval: 5,
            ..AppConfig::default()
        };
        assert_eq!(config.auto_scan_interval_seconds(), 300);
        config.auto_scan_unit = "seconds".into();
        assert_eq!(config.auto_scan_interval_seconds(), 5);
    }

    #[test]
    fn patch_merges_only_present_fields() {
        let mut config = AppConfig::default();
        let patch = ConfigPatch {
            movies_path: Some("/library/movies".into()),
            auto_scan_enabled: Some(true),
            ..ConfigPatch::default()
        };
        patch.apply(&mut config);
        assert_eq!(config.movies_path, "/library/movies");
        assert!(config.auto_scan_enabled);
        assert_eq!(config.tv_path, default_tv_path());
    }

    #[test]
    fn extensions_lowercased() {
        let config = AppConfig {
            video_extensions: vec![".MKV".into(), ".mp4".into()],
            ..AppConfig::default()
        };
        assert!(config.video_extensions().contains(".mkv"));
    }
}
