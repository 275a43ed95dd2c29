//! Pure filename/path analysis: episode numbering, specials, titles.
//!
//! Parsing is deterministic and side-effect free. The entry point is
//! [`MediaParser::parse_path`], which combines the filename parse with
//! parent-directory context for season folders and bare episode files.

mod episode;
mod specials;
mod title;

use std::path::Path;

use linkarr_model::MediaKind;
use once_cell::sync::Lazy;
use regex::Regex;

/// Structured result of parsing one file path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMedia {
    pub title: Option<String>,
    pub year: Option<i64>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub kind: MediaKind,
    pub quality: Option<String>,
    pub source: Option<String>,
    pub codec: Option<String>,
    pub release_group: Option<String>,
}

static RE_SXXEXX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)S\d{1,2}E\d{1,3}").unwrap());

static RE_IGNORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)creditless|\bNCOP\b|\bNCED\b").unwrap());

/// Standalone OP/ED tag ("OP2", "ED1 Creditless") with no episode numbering.
static RE_OPED_STANDALONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|\s)(?:OP|ED)\d*(?:\s|v\d|$)").unwrap());

/// A 4-digit token straight into `SxxExx` is a title, not a year ("1923").
static RE_NUMERIC_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\d{4})\s+S(\d{1,2})E(\d{1,3})").unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct MediaParser;

impl MediaParser {
    pub fn new() -> Self {
        Self
    }

    /// True when `filename` should be excluded from discovery outright:
    /// creditless OP/ED material with no usable episode numbering.
    pub fn should_ignore(&self, filename: &str) -> bool {
        let normalized = title::normalize(title::strip_extension(filename));
        if RE_SXXEXX.is_match(&normalized) {
            return false;
        }
        // OP/EDs with season context parse as specials; keep them.
        if specials::RE_SEASON_CONTEXT.is_match(&normalized) {
            return false;
        }
        RE_IGNORE.is_match(&normalized) || RE_OPED_STANDALONE.is_match(&normalized)
    }

    /// Parse a bare name (filename or directory name) with no parent
    /// context.
    pub fn parse_filename(&self, name: &str) -> ParsedMedia {
        let raw = title::strip_extension(name);
        let normalized = title::normalize(raw);
        let prepared = episode::preprocess(&normalized);

        let mut parsed = ParsedMedia {
            quality: title::extract_quality(raw),
            source: title::extract_source(raw),
            codec: title::extract_codec(raw),
            release_group: title::extract_release_group(raw),
            ..ParsedMedia::default()
        };

        if let Some(caps) = RE_NUMERIC_TITLE.captures(&prepared) {
            parsed.title = Some(caps[1].to_string());
            parsed.season = caps[2].parse().ok();
            parsed.episode = caps[3].parse().ok();
            parsed.kind = MediaKind::Tv;
            return parsed;
        }

        if let Some(special) = specials::detect(&prepared) {
            parsed.kind = MediaKind::Tv;
            parsed.season = Some(0);
            parsed.episode = Some(special.episode);
            let mut head = &prepared[..special.start];
            // "Show S01 NCED 2": the season marker belongs to the special's
            // context, not the show title.
            if let Some(marker) = episode::detect_season(head) {
                head = &head[..marker.start];
            }
            parsed.year = title::extract_year(head).map(|(year, _)| year);
            let cleaned = title::clean_title(head, parsed.year);
            parsed.title = (!cleaned.is_empty()).then_some(cleaned);
            return parsed;
        }

        if let Some(hit) = episode::detect(&prepared) {
            parsed.kind = MediaKind::Tv;
            parsed.season = hit.season;
            parsed.episode = Some(hit.episode);
            let head = &prepared[..hit.start];
            parsed.year = title::extract_year(head).map(|(year, _)| year);
            let cleaned = title::clean_title(head, parsed.year);
            parsed.title = (!cleaned.is_empty()).then_some(cleaned);
            return parsed;
        }

        if let Some(season) = episode::detect_season(&prepared) {
            parsed.kind = MediaKind::Tv;
            parsed.season = Some(season.season);
            let head = &prepared[..season.start];
            parsed.year = title::extract_year(head).map(|(year, _)| year);
            let cleaned = title::clean_title(head, parsed.year);
            parsed.title = (!cleaned.is_empty()).then_some(cleaned);
            return parsed;
        }

        // No episode numbering anywhere: movie material.
        let (year, cut) = match (
            title::extract_year(&prepared),
            title::quality_cutoff(&prepared),
        ) {
            (Some((year, year_at)), Some(noise_at)) => {
                (Some(year), year_at.min(noise_at))
            }
            (Some((year, year_at)), None) => (Some(year), year_at),
            (None, Some(noise_at)) => (None, noise_at),
            (None, None) => (None, prepared.len()),
        };
        parsed.year = year;
        let cleaned = title::clean_title(&prepared[..cut], year);
        parsed.title = (!cleaned.is_empty()).then_some(cleaned);
        parsed.kind = if parsed.title.is_some() && parsed.year.is_some() {
            MediaKind::Movie
        } else {
            MediaKind::Unknown
        };
        parsed
    }

    /// Parse a full path, folding in parent-directory context:
    /// - a filename with no numbering inside a titled season folder becomes
    ///   that show's episode (parent title/year/season supersede);
    /// - an episode-only filename inherits the parent's season (default 1)
    ///   and title;
    /// - a season folder with no own title borrows the grandparent's.
    pub fn parse_path(&self, path: &Path) -> ParsedMedia {
        let stem = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut parsed = self.parse_filename(&stem);

        let Some(parent_name) = parent_component(path) else {
            return parsed;
        };
        let mut parent = self.parse_filename(&parent_name);

        // A pure season folder ("Season 2") borrows the show title from the
        // grandparent directory.
        if parent.season.is_some()
            && parent.title.is_none()
            && let Some(grandparent_name) = path
                .parent()
                .and_then(parent_component)
        {
            let grandparent = self.parse_filename(&grandparent_name);
            parent.title = grandparent.title;
            parent.year = parent.year.or(grandparent.year);
        }

        match (parsed.season, parsed.episode) {
            (None, None) => {
                if parent.title.is_some() && parent.season.is_some() {
                    // Parent supersedes: this file is an episode of the
                    // parent's show even though its own name said nothing.
                    parsed.title = parent.title;
                    parsed.year = parent.year;
                    parsed.season = parent.season;
                    parsed.episode =
                        Some(episode::bare_episode(&stem_normalized(&stem)).unwrap_or(1));
                    parsed.kind = MediaKind::Tv;
                } else if parsed.title.is_none() {
                    // Nothing usable in the filename; take the parent parse.
                    parsed.title = parent.title;
                    parsed.year = parsed.year.or(parent.year);
                    parsed.season = parent.season;
                    parsed.episode = parent.episode;
                    if parent.kind != MediaKind::Unknown {
                        parsed.kind = parent.kind;
                    }
                }
            }
            (None, Some(_)) => {
                parsed.season = Some(parent.season.unwrap_or(1));
                if parent.title.is_some() {
                    parsed.title = parent.title;
                    parsed.year = parent.year.or(parsed.year);
                }
                parsed.kind = MediaKind::Tv;
            }
            _ => {
                if parsed.title.is_none() && parent.title.is_some() {
                    parsed.title = parent.title;
                    parsed.year = parsed.year.or(parent.year);
                }
            }
        }

        parsed
    }
}

fn stem_normalized(stem: &str) -> String {
    title::normalize(title::strip_extension(stem))
}

fn parent_component(path: &Path) -> Option<String> {
    let name = path.parent()?.file_name()?.to_string_lossy().into_owned();
    (!name.is_empty()).then_some(name)
}
