//! Clients for the remote metadata catalogs.
//!
//! TMDB is the primary catalog; TVDB serves as a series fallback when TMDB
//! comes up empty. Both treat transient failures (network errors, non-200
//! responses, timeouts) as empty result sets so a flaky remote never
//! poisons a record.

mod tmdb;
mod tvdb;

use async_trait::async_trait;
use linkarr_model::MediaKind;
use serde::{Deserialize, Serialize};

pub use tmdb::TmdbClient;
pub use tvdb::TvdbClient;

/// A candidate returned by a catalog search, normalized across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogMatch {
    pub id: i64,
    pub title: String,
    pub year: Option<i64>,
    pub poster_url: Option<String>,
    pub kind: MediaKind,
    pub popularity: f64,
}

/// The matching seam the ingestion engine depends on.
#[async_trait]
pub trait Matcher: Send + Sync {
    /// Best catalog candidate for a parsed title, or `None`.
    async fn match_media(
        &self,
        title: &str,
        year: Option<i64>,
        kind: MediaKind,
    ) -> Option<CatalogMatch>;
}

/// Production matcher: progressive TMDB lookups, then TVDB for series.
#[derive(Debug)]
pub struct MetadataMatcher {
    tmdb: TmdbClient,
    tvdb: TvdbClient,
}

impl MetadataMatcher {
    pub fn new(tmdb: TmdbClient, tvdb: TvdbClient) -> Self {
        Self { tmdb, tvdb }
    }

    pub fn tmdb(&self) -> &TmdbClient {
        &self.tmdb
    }
}

#[async_trait]
impl Matcher for MetadataMatcher {
    async fn match_media(
        &self,
        title: &str,
        year: Option<i64>,
        kind: MediaKind,
    ) -> Option<CatalogMatch> {
        if title.is_empty() {
            return None;
        }
        if let Some(found) = self.tmdb.match_media(title, year, kind).await {
            return Some(found);
        }
        if kind == MediaKind::Tv {
            return self.tvdb.match_series(title, year).await;
        }
        None
    }
}

/// Search attempts in order: exact (title, year), then title alone, then a
/// cleaned variant when the title is short or carries non-alphanumeric
/// noise.
pub(crate) fn search_attempts(title: &str, year: Option<i64>) -> Vec<(String, Option<i64>)> {
    let mut attempts = Vec::new();
    if year.is_some() {
        attempts.push((title.to_string(), year));
    }
    attempts.push((title.to_string(), None));

    let needs_cleaning = title.len() < 4
        || title
            .chars()
            .any(|c| !c.is_alphanumeric() && !c.is_whitespace());
    if needs_cleaning {
        let cleaned: String = title
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c.is_whitespace() {
                    c
                } else {
                    ' '
                }
            })
            .collect();
        let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        if !cleaned.is_empty() && cleaned != title {
            attempts.push((cleaned, None));
        }
    }
    attempts
}

/// Pick from one non-empty result set: exact year wins when known,
/// otherwise the most popular candidate.
pub(crate) fn pick_candidate(
    results: Vec<CatalogMatch>,
    year: Option<i64>,
) -> Option<CatalogMatch> {
    if let Some(year) = year
        && let Some(exact) = results.iter().find(|candidate| candidate.year == Some(year))
    {
        return Some(exact.clone());
    }
    results.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i64, year: Option<i64>, popularity: f64) -> CatalogMatch {
        CatalogMatch {
            id,
            title: format!("Title {id}"),
            year,
            poster_url: None,
            kind: MediaKind::Movie,
            popularity,
        }
    }

    #[test]
    fn attempts_start_with_year_when_known() {
        let attempts = search_attempts("The Matrix", Some(1999));
        assert_eq!(attempts[0], ("The Matrix".to_string(), Some(1999)));
        assert_eq!(attempts[1], ("The Matrix".to_string(), None));
        assert_eq!(attempts.len(), 2);
    }

    #[test]
    fn noisy_title_gets_cleaned_variant() {
        let attempts = search_attempts("Akame ga Kill!", None);
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[1].0, "Akame ga Kill");
    }

    #[test]
    fn exact_year_beats_popularity() {
        let results = vec![
            candidate(1, Some(2001), 99.0),
            candidate(2, Some(1999), 10.0),
        ];
        assert_eq!(pick_candidate(results, Some(1999)).unwrap().id, 2);
    }

    #[test]
    fn without_year_first_result_wins() {
        let results = vec![candidate(1, None, 99.0), candidate(2, Some(1999), 10.0)];
        assert_eq!(pick_candidate(results, None).unwrap().id, 1);
    }
}
