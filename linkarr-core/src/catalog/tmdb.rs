use std::sync::Arc;
use std::time::Duration;

use linkarr_config::ConfigStore;
use linkarr_model::MediaKind;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{CatalogMatch, pick_candidate, search_attempts};

const BASE_URL: &str = "https://api.themoviedb.org/3";
const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RESULTS_PER_ENDPOINT: usize = 10;
const RESULTS_MERGED: usize = 15;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: i64,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    poster_path: Option<String>,
    #[serde(default)]
    popularity: f64,
}

impl SearchItem {
    fn into_match(self, kind: MediaKind) -> CatalogMatch {
        let date = match kind {
            MediaKind::Tv => self.first_air_date.as_deref(),
            _ => self.release_date.as_deref(),
        };
        let year = date
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse::<i64>().ok());
        CatalogMatch {
            id: self.id,
            title: match kind {
                MediaKind::Tv => self.name.unwrap_or_default(),
                _ => self.title.unwrap_or_default(),
            },
            year,
            poster_url: self
                .poster_path
                .map(|path| format!("{IMAGE_BASE_URL}{path}")),
            kind,
            popularity: self.popularity,
        }
    }
}

/// TMDB search/detail client. Language and API key come from the config
/// document (`TMDB_API_KEY` in the environment as a fallback).
#[derive(Debug, Clone)]
pub struct TmdbClient {
    http: reqwest::Client,
    config: Arc<ConfigStore>,
}

impl TmdbClient {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction");
        Self { http, config }
    }

    fn api_key(&self) -> String {
        let configured = self.config.load().tmdb_api_key;
        if configured.is_empty() {
            std::env::var("TMDB_API_KEY").unwrap_or_default()
        } else {
            configured
        }
    }

    fn language(&self) -> String {
        self.config.load().tmdb_language
    }

    async fn search(
        &self,
        endpoint: &str,
        year_param: &str,
        query: &str,
        year: Option<i64>,
        kind: MediaKind,
    ) -> Vec<CatalogMatch> {
        let mut params = vec![
            ("api_key".to_string(), self.api_key()),
            ("language".to_string(), self.language()),
            ("query".to_string(), query.to_string()),
        ];
        if let Some(year) = year {
            params.push((year_param.to_string(), year.to_string()));
        }

        let response = match self
            .http
            .get(format!("{BASE_URL}/{endpoint}"))
            .query(&params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(%err, endpoint, "tmdb search request failed");
                return Vec::new();
            }
        };
        if !response.status().is_success() {
            debug!(status = %response.status(), endpoint, "tmdb search non-200");
            return Vec::new();
        }

        match response.json::<SearchResponse>().await {
            Ok(body) => body
                .results
                .into_iter()
                .take(RESULTS_PER_ENDPOINT)
                .map(|item| item.into_match(kind))
                .collect(),
            Err(err) => {
                warn!(%err, endpoint, "tmdb search body unreadable");
                Vec::new()
            }
        }
    }

    pub async fn search_movie(&self, query: &str, year: Option<i64>) -> Vec<CatalogMatch> {
        self.search("search/movie", "year", query, year, MediaKind::Movie)
            .await
    }

    pub async fn search_tv(&self, query: &str, year: Option<i64>) -> Vec<CatalogMatch> {
        self.search(
            "search/tv",
            "first_air_date_year",
            query,
            year,
            MediaKind::Tv,
        )
        .await
    }

    /// Movie and TV searches issued in parallel, merged by popularity.
    pub async fn search_multi(&self, query: &str, year: Option<i64>) -> Vec<CatalogMatch> {
        let (movies, series) =
            tokio::join!(self.search_movie(query, year), self.search_tv(query, year));
        let mut merged: Vec<CatalogMatch> = movies.into_iter().chain(series).collect();
        merged.sort_by(|a, b| {
            b.popularity
                .partial_cmp(&a.popularity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        merged.truncate(RESULTS_MERGED);
        merged
    }

    async fn details(&self, path: String) -> Option<serde_json::Value> {
        let params = [
            ("api_key".to_string(), self.api_key()),
            ("language".to_string(), self.language()),
        ];
        let response = self
            .http
            .get(format!("{BASE_URL}/{path}"))
            .query(&params)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.json().await.ok()
    }

    pub async fn movie_details(&self, id: i64) -> Option<serde_json::Value> {
        self.details(format!("movie/{id}")).await
    }

    pub async fn tv_details(&self, id: i64) -> Option<serde_json::Value> {
        self.details(format!("tv/{id}")).await
    }

    /// Progressive lookup: each attempt queries the endpoint selected by
    /// `kind`; the first non-empty result set decides.
    pub async fn match_media(
        &self,
        title: &str,
        year: Option<i64>,
        kind: MediaKind,
    ) -> Option<CatalogMatch> {
        for (query, attempt_year) in search_attempts(title, year) {
            let results = match kind {
                MediaKind::Movie => self.search_movie(&query, attempt_year).await,
                MediaKind::Tv => self.search_tv(&query, attempt_year).await,
                MediaKind::Unknown => self.search_multi(&query, attempt_year).await,
            };
            if !results.is_empty() {
                return pick_candidate(results, year);
            }
        }
        None
    }
}
