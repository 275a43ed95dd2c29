use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use linkarr_config::ConfigStore;
use linkarr_model::MediaKind;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{CatalogMatch, pick_candidate};

const BASE_URL: &str = "https://api4.thetvdb.com/v4";
const LOGIN_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const RESULTS_CLAMP: usize = 10;

/// TVDB tokens are valid for a month; refresh daily with a safety margin.
const TOKEN_LIFETIME_HOURS: i64 = 24;
const TOKEN_REFRESH_MARGIN_MINUTES: i64 = 5;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires: DateTime<Utc>,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    data: LoginData,
}

#[derive(Debug, Default, Deserialize)]
struct LoginData {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: Option<serde_json::Value>,
    tvdb_id: Option<serde_json::Value>,
    name: Option<String>,
    year: Option<serde_json::Value>,
    first_air_time: Option<String>,
    image_url: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    score: f64,
}

fn value_to_id(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim_start_matches("series-").parse().ok(),
        _ => None,
    }
}

impl SearchItem {
    fn into_match(self) -> Option<CatalogMatch> {
        let id = self
            .tvdb_id
            .as_ref()
            .and_then(value_to_id)
            .or_else(|| self.id.as_ref().and_then(value_to_id))?;
        let year = match &self.year {
            Some(serde_json::Value::Number(n)) => n.as_i64(),
            Some(serde_json::Value::String(s)) => s.parse().ok(),
            _ => None,
        }
        .or_else(|| {
            self.first_air_time
                .as_deref()
                .and_then(|d| d.get(..4))
                .and_then(|y| y.parse().ok())
        });
        Some(CatalogMatch {
            id,
            title: self.name.unwrap_or_default(),
            year,
            poster_url: self.image_url.or(self.thumbnail),
            kind: MediaKind::Tv,
            popularity: self.score,
        })
    }
}

/// TVDB v4 client. Authentication is a bearer token obtained from the
/// `/login` endpoint; the cached token is refreshed behind a lock so
/// concurrent workers trigger at most one refresh.
#[derive(Debug)]
pub struct TvdbClient {
    http: reqwest::Client,
    config: Arc<ConfigStore>,
    token: Mutex<Option<CachedToken>>,
}

impl TvdbClient {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction");
        Self {
            http,
            config,
            token: Mutex::new(None),
        }
    }

    fn api_key(&self) -> String {
        let configured = self.config.load().tvdb_api_key;
        if configured.is_empty() {
            std::env::var("TVDB_API_KEY").unwrap_or_default()
        } else {
            configured
        }
    }

    /// Current token, refreshing if expired or the key changed. Callers
    /// observe either the old still-valid token or the newly issued one.
    async fn token(&self) -> Option<String> {
        let api_key = self.api_key();
        if api_key.is_empty() {
            return None;
        }

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.api_key == api_key
            && Utc::now()
                < token.expires - chrono::Duration::minutes(TOKEN_REFRESH_MARGIN_MINUTES)
        {
            return Some(token.token.clone());
        }

        let response = self
            .http
            .post(format!("{BASE_URL}/login"))
            .timeout(LOGIN_TIMEOUT)
            .json(&json!({ "apikey": api_key }))
            .send()
            .await;
        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = %response.status(), "tvdb login rejected");
                return None;
            }
            Err(err) => {
                warn!(%err, "tvdb login failed");
                return None;
            }
        };

        let token = response
            .json::<LoginResponse>()
            .await
            .ok()
            .and_then(|body| body.data.token)?;
        *cached = Some(CachedToken {
            token: token.clone(),
            expires: Utc::now() + chrono::Duration::hours(TOKEN_LIFETIME_HOURS),
            api_key,
        });
        debug!("tvdb token refreshed");
        Some(token)
    }

    pub async fn search_series(&self, query: &str, year: Option<i64>) -> Vec<CatalogMatch> {
        let Some(token) = self.token().await else {
            return Vec::new();
        };

        let mut params = vec![
            ("query".to_string(), query.to_string()),
            ("type".to_string(), "series".to_string()),
        ];
        if let Some(year) = year {
            params.push(("year".to_string(), year.to_string()));
        }

        let response = match self
            .http
            .get(format!("{BASE_URL}/search"))
            .query(&params)
            .bearer_auth(&token)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(status = %response.status(), "tvdb search non-200");
                return Vec::new();
            }
            Err(err) => {
                warn!(%err, "tvdb search failed");
                return Vec::new();
            }
        };

        match response.json::<SearchResponse>().await {
            Ok(body) => body
                .data
                .into_iter()
                .take(RESULTS_CLAMP)
                .filter_map(SearchItem::into_match)
                .collect(),
            Err(err) => {
                warn!(%err, "tvdb search body unreadable");
                Vec::new()
            }
        }
    }

    /// Progressive series lookup: (title, year), then title alone, with an
    /// exact-year preference inside each result set.
    pub async fn match_series(&self, title: &str, year: Option<i64>) -> Option<CatalogMatch> {
        if title.is_empty() {
            return None;
        }
        let mut attempts = Vec::new();
        if year.is_some() {
            attempts.push(year);
        }
        attempts.push(None);

        for attempt_year in attempts {
            let results = self.search_series(title, attempt_year).await;
            if !results.is_empty() {
                return pick_candidate(results, year);
            }
        }
        None
    }
}
