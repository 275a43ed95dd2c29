//! Radarr/Sonarr reachability checks.
//!
//! Linkarr does not drive the arr services; it only verifies they respond
//! when `require_arr` gates a scan, and surfaces their version in the
//! config test endpoint.

use std::sync::Arc;
use std::time::Duration;

use linkarr_config::ConfigStore;
use serde::Deserialize;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct SystemStatus {
    version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrService {
    Radarr,
    Sonarr,
}

impl ArrService {
    fn name(&self) -> &'static str {
        match self {
            ArrService::Radarr => "Radarr",
            ArrService::Sonarr => "Sonarr",
        }
    }
}

#[derive(Debug, Clone)]
struct ArrClient {
    service: ArrService,
    http: reqwest::Client,
    config: Arc<ConfigStore>,
}

impl ArrClient {
    fn new(service: ArrService, config: Arc<ConfigStore>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction");
        Self {
            service,
            http,
            config,
        }
    }

    fn credentials(&self) -> (String, String) {
        let config = self.config.load();
        match self.service {
            ArrService::Radarr => (config.radarr_url, config.radarr_api_key),
            ArrService::Sonarr => (config.sonarr_url, config.sonarr_api_key),
        }
    }

    fn configured(&self) -> bool {
        let (base_url, api_key) = self.credentials();
        !base_url.is_empty() && !api_key.is_empty()
    }

    /// Probe `/api/v3/system/status`. Returns `(reachable, message)`.
    async fn test_connection(&self) -> (bool, String) {
        let (base_url, api_key) = self.credentials();
        if base_url.is_empty() || api_key.is_empty() {
            return (false, format!("{} not configured", self.service.name()));
        }
        let base_url = base_url.trim_end_matches('/');
        if Url::parse(base_url).is_err() {
            return (false, format!("{} URL is invalid", self.service.name()));
        }

        let response = self
            .http
            .get(format!("{base_url}/api/v3/system/status"))
            .header("X-Api-Key", api_key)
            .send()
            .await;
        match response {
            Ok(response) if response.status().is_success() => {
                let version = response
                    .json::<SystemStatus>()
                    .await
                    .ok()
                    .and_then(|status| status.version)
                    .unwrap_or_else(|| "?".to_string());
                (
                    true,
                    format!("connected to {} v{version}", self.service.name()),
                )
            }
            Ok(response) => (
                false,
                format!("{} returned {}", self.service.name(), response.status()),
            ),
            Err(err) => (false, format!("{}: {err}", self.service.name())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RadarrClient(ArrClient);

impl RadarrClient {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self(ArrClient::new(ArrService::Radarr, config))
    }

    pub fn configured(&self) -> bool {
        self.0.configured()
    }

    pub async fn test_connection(&self) -> (bool, String) {
        self.0.test_connection().await
    }
}

#[derive(Debug, Clone)]
pub struct SonarrClient(ArrClient);

impl SonarrClient {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self(ArrClient::new(ArrService::Sonarr, config))
    }

    pub fn configured(&self) -> bool {
        self.0.configured()
    }

    pub async fn test_connection(&self) -> (bool, String) {
        self.0.test_connection().await
    }
}
