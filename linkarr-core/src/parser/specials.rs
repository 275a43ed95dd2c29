use once_cell::sync::Lazy;
use regex::Regex;

/// A filename identified as an extra rather than a regular episode. Extras
/// land in season 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialMatch {
    pub episode: i64,
    /// Byte offset where the special marker begins; everything before it is
    /// title material.
    pub start: usize,
}

/// OP/ED with explicit season context ("S01 - NCOP 01"). Also consulted by
/// the ignore filter: these stay in discovery even though they carry
/// creditless markers.
pub static RE_SEASON_CONTEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bS\d{1,2}\s*[-–]\s*(?:NCOP|NCED|OP|ED)\s*(\d+)").unwrap()
});

static RE_CREDITLESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bNC(?:ED|OP)\s*(\d+)").unwrap());

static RE_ANIME_OPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:OP|ED)\s*(\d+)").unwrap());

static RE_MISC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:SP|OVA|OAD|OAV|Bonus|Extra|PV|CM)\s*(\d+)?\b").unwrap()
});

static RE_BEHIND_THE_SCENES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:BETISIER|BLOOPERS?|GAG\s*REEL|MAKING\s*OF|BEHIND\s*THE\s*SCENES?|DELETED\s*SCENES?|FEATURETTES?|INTERVIEWS?)\b",
    )
    .unwrap()
});

// Order matters: season-context first so its title span is preferred.
static PATTERNS: &[&Lazy<Regex>] = &[
    &RE_SEASON_CONTEXT,
    &RE_CREDITLESS,
    &RE_ANIME_OPED,
    &RE_MISC,
    &RE_BEHIND_THE_SCENES,
];

/// Match `name` against the ordered specials table. First hit wins; the
/// episode number is the captured digit group, defaulting to 1.
pub fn detect(name: &str) -> Option<SpecialMatch> {
    for pattern in PATTERNS {
        if let Some(captures) = pattern.captures(name) {
            let whole = captures.get(0).expect("group 0 always present");
            let episode = captures
                .get(1)
                .and_then(|digits| digits.as_str().parse().ok())
                .unwrap_or(1);
            return Some(SpecialMatch {
                episode,
                start: whole.start(),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_context_oped() {
        let hit = detect("Akame ga Kill! S01 - NCOP 01").unwrap();
        assert_eq!(hit.episode, 1);
        assert_eq!(&"Akame ga Kill! S01 - NCOP 01"[..hit.start], "Akame ga Kill! ");
    }

    #[test]
    fn creditless_with_number() {
        assert_eq!(detect("Show NCED 2").unwrap().episode, 2);
        assert_eq!(detect("Show NCOP3").unwrap().episode, 3);
    }

    #[test]
    fn leading_oped_tag() {
        assert_eq!(detect("OP 2 Creditless").unwrap().episode, 2);
        assert_eq!(detect("ED1").unwrap().episode, 1);
    }

    #[test]
    fn misc_specials_default_to_one() {
        assert_eq!(detect("Show OVA").unwrap().episode, 1);
        assert_eq!(detect("Show OVA 4").unwrap().episode, 4);
        assert_eq!(detect("Show Bonus 2").unwrap().episode, 2);
    }

    #[test]
    fn behind_the_scenes_words() {
        for name in [
            "Show Bloopers",
            "Show Gag Reel",
            "Show Making Of",
            "Show Behind The Scenes",
            "Show Deleted Scenes",
            "Show Featurettes",
            "Show Interviews",
            "Film BETISIER",
        ] {
            let hit = detect(name).unwrap_or_else(|| panic!("no match for {name}"));
            assert_eq!(hit.episode, 1, "{name}");
        }
    }

    #[test]
    fn word_prefixes_do_not_trigger() {
        assert!(detect("Extraction 2").is_none());
        assert!(detect("The Spanish Main").is_none());
        assert!(detect("Operation Overlord").is_none());
    }
}
