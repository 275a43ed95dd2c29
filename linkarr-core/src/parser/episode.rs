use once_cell::sync::Lazy;
use regex::Regex;

/// Episode numbering found in a filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeMatch {
    pub season: Option<i64>,
    pub episode: i64,
    /// Byte offset where the numbering begins; the title lives before it.
    pub start: usize,
}

/// Season marker without an episode ("Show S17", "Season 2", "Saison 3").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonMatch {
    pub season: i64,
    pub start: usize,
}

static RE_EPISODE_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(E\d{1,3})\s*v\d+\b").unwrap());

/// `S1 - 2`, `S1.2` (dots already normalized to spaces) and similar
/// non-standard forms collapse to `S01E02` before pattern matching.
static RE_LOOSE_SEASON_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS(\d{1,2})\s*(?:[-–]\s*)?(\d{1,3})\b").unwrap());

static RE_SEASON_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS(\d{1,2})\s*E(\d{1,3})").unwrap());

static RE_NXNN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})x(\d{1,3})\b").unwrap());

static RE_SEASON_WORD_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bseason\s*(\d{1,2})\s*episode\s*(\d{1,3})\b").unwrap()
});

static RE_EPISODE_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:e|ep|episode)\s*(\d{1,3})\b").unwrap());

static RE_SEASON_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|\s)s(?:eason|aison)?\s*(\d{1,2})(?:\s|$)").unwrap()
});

/// Bare episode number for files inside a season folder ("03 - Title",
/// "05"). Only meaningful when a parent supplies the season.
static RE_BARE_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3})(?:\s*[-–]\s|\s|$)").unwrap());

/// Normalize non-standard episode expressions before pattern matching.
pub fn preprocess(name: &str) -> String {
    let stripped = RE_EPISODE_VERSION.replace_all(name, "$1");
    RE_LOOSE_SEASON_EPISODE
        .replace_all(&stripped, "S${1}E${2}")
        .into_owned()
}

/// Find episode numbering, trying patterns in order of confidence.
pub fn detect(name: &str) -> Option<EpisodeMatch> {
    if let Some(caps) = RE_SEASON_EPISODE.captures(name) {
        return Some(EpisodeMatch {
            season: caps[1].parse().ok(),
            episode: caps[2].parse().ok()?,
            start: caps.get(0)?.start(),
        });
    }
    if let Some(caps) = RE_NXNN.captures(name) {
        return Some(EpisodeMatch {
            season: caps[1].parse().ok(),
            episode: caps[2].parse().ok()?,
            start: caps.get(0)?.start(),
        });
    }
    if let Some(caps) = RE_SEASON_WORD_EPISODE.captures(name) {
        return Some(EpisodeMatch {
            season: caps[1].parse().ok(),
            episode: caps[2].parse().ok()?,
            start: caps.get(0)?.start(),
        });
    }
    if let Some(caps) = RE_EPISODE_ONLY.captures(name) {
        return Some(EpisodeMatch {
            season: None,
            episode: caps[1].parse().ok()?,
            start: caps.get(0)?.start(),
        });
    }
    None
}

/// Find a season marker with no episode attached.
pub fn detect_season(name: &str) -> Option<SeasonMatch> {
    let caps = RE_SEASON_ONLY.captures(name)?;
    let whole = caps.get(0)?;
    // The pattern may consume the separating space; the marker itself
    // starts at the following byte.
    let mut start = whole.start();
    if name.as_bytes().get(start) == Some(&b' ') {
        start += 1;
    }
    Some(SeasonMatch {
        season: caps[1].parse().ok()?,
        start,
    })
}

/// Leading bare number, for filenames whose parent names the season.
pub fn bare_episode(name: &str) -> Option<i64> {
    RE_BARE_EPISODE
        .captures(name)
        .and_then(|caps| caps[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_sxxexx() {
        let hit = detect("Breaking Bad S01E07 1080p").unwrap();
        assert_eq!(hit.season, Some(1));
        assert_eq!(hit.episode, 7);
        assert_eq!(&"Breaking Bad S01E07 1080p"[..hit.start], "Breaking Bad ");
    }

    #[test]
    fn nxnn_form() {
        let hit = detect("Show 2x13").unwrap();
        assert_eq!(hit.season, Some(2));
        assert_eq!(hit.episode, 13);
    }

    #[test]
    fn season_word_form() {
        let hit = detect("Show Season 3 Episode 4").unwrap();
        assert_eq!(hit.season, Some(3));
        assert_eq!(hit.episode, 4);
    }

    #[test]
    fn episode_only_has_no_season() {
        let hit = detect("E05 - Chartreuse Light").unwrap();
        assert_eq!(hit.season, None);
        assert_eq!(hit.episode, 5);
        assert_eq!(hit.start, 0);
    }

    #[test]
    fn preprocess_rewrites_loose_forms() {
        assert_eq!(preprocess("Show S1 - 2"), "Show S1E2");
        assert_eq!(preprocess("Show S2 13"), "Show S2E13");
        assert_eq!(preprocess("Show S01E01v2"), "Show S01E01");
        assert_eq!(preprocess("Show E01 v2 rest"), "Show E01 rest");
    }

    #[test]
    fn preprocess_leaves_years_alone() {
        // A 4-digit token is never an episode.
        assert_eq!(preprocess("Show S2 2013"), "Show S2 2013");
    }

    #[test]
    fn preprocessed_loose_form_parses() {
        let rewritten = preprocess("Show S1 - 2");
        let hit = detect(&rewritten).unwrap();
        assert_eq!(hit.season, Some(1));
        assert_eq!(hit.episode, 2);
    }

    #[test]
    fn season_only_marker() {
        let hit = detect_season("Les Simpson S17").unwrap();
        assert_eq!(hit.season, 17);
        assert!(detect_season("Season 2").is_some());
        assert!(detect_season("Saison 3").is_some());
        assert!(detect_season("Random Folder").is_none());
    }

    #[test]
    fn bare_episode_needs_leading_number() {
        assert_eq!(bare_episode("03 - Episode Name"), Some(3));
        assert_eq!(bare_episode("05"), Some(5));
        assert_eq!(bare_episode("2012"), None);
        assert_eq!(bare_episode("Title 03"), None);
    }
}
