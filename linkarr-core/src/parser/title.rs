use once_cell::sync::Lazy;
use regex::Regex;

static RE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bwww\.[a-z0-9-]+(?:\.[a-z]{2,4})+").unwrap());

static RE_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").unwrap());

static RE_PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());

static RE_YEAR_PARENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\((?:19|20)\d{2}\)$").unwrap());

static RE_NOISE_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:int[ée]grale|complete|collection|vostfr|multi|french|truefrench)\b")
        .unwrap()
});

static RE_SEASON_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:saisons?\s*\d{1,2}(?:\s*[-aà]\s*\d{1,2})?|s\d{1,2}\s*-\s*s\d{1,2})\b")
        .unwrap()
});

// Dangling `(` happens when the title was cut right before a `(year)`.
static RE_TRAILING_JUNK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_\s(]+$").unwrap());

static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:19|20)\d{2}").unwrap());

/// First cut point for movie titles: everything from the first release
/// marker onward is noise.
static RE_QUALITY_CUTOFF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s[\(\[]?(?:BluRay|BDRip|BRRip|WEBRip|WEB[\s-]?DL|HDTV|SDTV|DVDRip|HDRip|HDCAM|CAM|Remux|x264|x265|h\.?264|h\.?265|HEVC|XviD|DivX|AV1|10\s?bit|HDR10?|AC3|E?AAC|DTS|FLAC|2160p|1080p|720p|576p|480p|4K|UHD|VOSTFR|MULTi|FRENCH|TRUEFRENCH)\b.*$",
    )
    .unwrap()
});

const QUALITY_TOKENS: &[&str] = &[
    "2160p", "4K", "UHD", "1080p", "720p", "576p", "480p", "360p",
];

const SOURCE_TOKENS: &[&str] = &[
    "BluRay", "Bluray", "BDRip", "BRRip", "WEBRip", "WEB-DL", "WEBDL", "WebDl", "HDTV",
    "SDTV", "DVDRip", "DVD", "HDCAM", "HDRip", "CAM",
];

const CODEC_TOKENS: &[&str] = &[
    "x264", "x265", "H264", "H265", "h264", "h265", "HEVC", "XviD", "DivX", "AV1",
];

static RE_RELEASE_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"-(\w+)$").unwrap());

static RE_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(mkv|mp4|avi|mov|wmv|flv|webm|m4v|mpg|mpeg|ts)$").unwrap()
});

/// Drop a trailing video extension, if any.
pub fn strip_extension(name: &str) -> &str {
    match RE_EXTENSION.find(name) {
        Some(m) => &name[..m.start()],
        None => name,
    }
}

/// Separator normalization: URL fragments out, dots and underscores to
/// spaces. Replacements are byte-for-byte so downstream match offsets stay
/// valid against the normalized string.
pub fn normalize(name: &str) -> String {
    let cleaned = RE_URL.replace_all(name, |m: &regex::Captures<'_>| {
        " ".repeat(m[0].len())
    });
    cleaned.replace(['.', '_'], " ")
}

/// First plausible release year (1900-2099) with its byte offset.
///
/// A 4-digit token at the very start of the name is usually a numeric title
/// ("2012", "1917"); when another year token exists later, that later one
/// wins and the leading token stays part of the title.
pub fn extract_year(name: &str) -> Option<(i64, usize)> {
    let bytes = name.as_bytes();
    let mut candidates = RE_YEAR.find_iter(name).filter_map(|m| {
        // Reject digit runs longer than four ("12345", "20190101").
        let digit_before = m.start() > 0 && bytes[m.start() - 1].is_ascii_digit();
        let digit_after = bytes.get(m.end()).is_some_and(|b| b.is_ascii_digit());
        if digit_before || digit_after {
            return None;
        }
        let year: i64 = m.as_str().parse().ok()?;
        Some((year, m.start()))
    });

    let first = candidates.next()?;
    if first.1 == 0
        && let Some(second) = candidates.next()
    {
        return Some(second);
    }
    Some(first)
}

/// Offset where release noise starts, if any.
pub fn quality_cutoff(name: &str) -> Option<usize> {
    RE_QUALITY_CUTOFF.find(name).map(|m| m.start())
}

/// Scrub a raw title fragment: bracketed tags, non-year parenthesized tags,
/// release noise, the already-extracted year, season ranges, and dangling
/// separators.
pub fn clean_title(raw: &str, year: Option<i64>) -> String {
    let mut title = RE_BRACKETS.replace_all(raw, " ").into_owned();

    title = RE_PARENS
        .replace_all(&title, |caps: &regex::Captures<'_>| {
            if RE_YEAR_PARENS.is_match(&caps[0]) {
                caps[0].to_string()
            } else {
                " ".to_string()
            }
        })
        .into_owned();

    title = RE_SEASON_RANGE.replace_all(&title, " ").into_owned();
    title = RE_NOISE_TOKENS.replace_all(&title, " ").into_owned();

    if let Some(year) = year {
        title = title.replace(&format!("({year})"), " ");
        title = title.replace(&year.to_string(), " ");
    }

    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
    RE_TRAILING_JUNK.replace(&collapsed, "").into_owned()
}

pub fn extract_quality(name: &str) -> Option<String> {
    QUALITY_TOKENS
        .iter()
        .find(|token| name.contains(*token))
        .map(|token| token.to_string())
}

pub fn extract_source(name: &str) -> Option<String> {
    SOURCE_TOKENS
        .iter()
        .find(|token| name.contains(*token))
        .map(|token| token.to_string())
}

pub fn extract_codec(name: &str) -> Option<String> {
    CODEC_TOKENS
        .iter()
        .find(|token| name.contains(*token))
        .map(|token| token.to_string())
}

pub fn extract_release_group(name: &str) -> Option<String> {
    RE_RELEASE_GROUP
        .captures(name)
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_replaces_separators_in_place() {
        let normalized = normalize("The.Dark_Knight");
        assert_eq!(normalized, "The Dark Knight");
        assert_eq!(normalized.len(), "The.Dark_Knight".len());
    }

    #[test]
    fn normalize_blanks_urls() {
        let normalized = normalize("www.site-name.com Movie.Title");
        assert!(!normalized.contains("site-name"));
        assert!(normalized.contains("Movie Title"));
    }

    #[test]
    fn extract_year_skips_small_numbers() {
        assert_eq!(extract_year("Movie 1999 rest").map(|(y, _)| y), Some(1999));
        assert_eq!(extract_year("Movie (2023)").map(|(y, _)| y), Some(2023));
        assert!(extract_year("Movie 12345").is_none());
        assert!(extract_year("300").is_none());
    }

    #[test]
    fn leading_year_token_yields_to_later_year() {
        // "2012" is the title, 2009 the release year.
        assert_eq!(extract_year("2012 2009 1080p").map(|(y, _)| y), Some(2009));
        // A lone leading year is still a year.
        assert_eq!(extract_year("1999 BluRay").map(|(y, _)| y), Some(1999));
    }

    #[test]
    fn clean_title_keeps_year_parens_only() {
        assert_eq!(clean_title("Title (2019)", None), "Title (2019)");
        assert_eq!(clean_title("Title (FR import) [TAG]", None), "Title");
    }

    #[test]
    fn clean_title_strips_release_noise() {
        assert_eq!(
            clean_title("Serie Intégrale Saisons 1-3 VOSTFR MULTi", None),
            "Serie"
        );
        assert_eq!(clean_title("Show S1-S3 Complete", None), "Show");
    }

    #[test]
    fn clean_title_removes_extracted_year() {
        assert_eq!(clean_title("The Matrix 1999", Some(1999)), "The Matrix");
    }

    #[test]
    fn quality_cutoff_finds_first_marker() {
        let name = "The Matrix 1999 1080p BluRay x264";
        let cut = quality_cutoff(name).unwrap();
        assert_eq!(&name[..cut], "The Matrix 1999");
    }

    #[test]
    fn release_group_is_final_dash_token() {
        assert_eq!(
            extract_release_group("Movie.2008.x264-SPARKS").as_deref(),
            Some("SPARKS")
        );
        assert_eq!(extract_release_group("Movie.ends.here"), None);
    }
}
