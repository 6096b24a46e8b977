//! Time-boxed session cookie cache
//!
//! Cookie-gated sites reject requests that lack a browser session. A
//! remote collection service drives a headless browser and hands back one
//! cookie header per domain; this module caches that answer for a fixed
//! freshness window.
//!
//! The cache holds a single entry covering every required domain. An entry
//! older than the window is never served. A refresh that leaves any
//! required domain empty clears the cache so the next call refreshes again.
//! Refreshes are single-flight: concurrent callers wait on the one in
//! progress instead of starting their own.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{AnistreamError, Result};

/// Settings for the remote cookie service and the cache in front of it
#[derive(Debug, Clone)]
pub struct CookieServiceConfig {
    /// Endpoint answering `GET` with `{success, cookies}`
    pub url: String,
    /// Sent as `x-api-key`
    pub api_key: String,
    /// Upper bound on one service call (default: 15s)
    pub timeout: Duration,
    /// Maximum age of a served entry (default: 25 minutes)
    pub freshness: Duration,
    /// Domains that must all be present and non-empty in a refresh
    pub required_domains: Vec<String>,
}

impl Default for CookieServiceConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3001/cookies".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(15),
            freshness: Duration::from_secs(25 * 60),
            required_domains: vec!["animepahe.ru".to_string(), "kwik.si".to_string()],
        }
    }
}

/// Anything that can produce a fresh domain → cookie-header map
#[async_trait]
pub trait CookieSource: Send + Sync {
    async fn fetch_cookies(&self) -> Result<HashMap<String, String>>;
}

#[derive(Debug, Deserialize)]
struct CookieServiceResponse {
    success: bool,
    #[serde(default)]
    cookies: Option<HashMap<String, String>>,
}

/// HTTP client for the headless-browser cookie service
pub struct CookieServiceClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl CookieServiceClient {
    pub fn new(config: &CookieServiceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AnistreamError::Transport)?;

        Ok(Self {
            http,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl CookieSource for CookieServiceClient {
    async fn fetch_cookies(&self) -> Result<HashMap<String, String>> {
        let service_error = |e: reqwest::Error| {
            if e.is_timeout() {
                AnistreamError::CredentialService(format!("{} timed out", self.url))
            } else {
                AnistreamError::CredentialService(format!("{}: {}", self.url, e))
            }
        };

        let response = self
            .http
            .get(&self.url)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(service_error)?
            .error_for_status()
            .map_err(service_error)?;

        let body: CookieServiceResponse = response.json().await.map_err(|e| {
            AnistreamError::CredentialService(format!("unexpected response shape: {}", e))
        })?;

        match body {
            CookieServiceResponse {
                success: true,
                cookies: Some(cookies),
            } => Ok(cookies),
            _ => Err(AnistreamError::CredentialService(
                "service did not report success".to_string(),
            )),
        }
    }
}

/// Fixed cookie map, for cookies captured by hand or in tests
#[derive(Debug, Clone, Default)]
pub struct StaticCookieSource {
    cookies: HashMap<String, String>,
}

impl StaticCookieSource {
    pub fn new<K, V>(cookies: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cookies: cookies
                .into_iter()
                .map(|(domain, header)| (domain.into(), header.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl CookieSource for StaticCookieSource {
    async fn fetch_cookies(&self) -> Result<HashMap<String, String>> {
        Ok(self.cookies.clone())
    }
}

/// One cached refresh result
#[derive(Debug, Clone)]
pub struct SessionCookies {
    cookies: HashMap<String, String>,
    fetched_at: Instant,
}

impl SessionCookies {
    /// Cookie header string for a domain
    pub fn get(&self, domain: &str) -> Option<&str> {
        self.cookies.get(domain).map(String::as_str)
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    fn is_fresh(&self, window: Duration) -> bool {
        self.fetched_at.elapsed() < window
    }
}

/// Process-wide cookie cache, passed to the providers that need it
pub struct CookieCache {
    source: Arc<dyn CookieSource>,
    required_domains: Vec<String>,
    freshness: Duration,
    state: Mutex<Option<SessionCookies>>,
}

impl CookieCache {
    pub fn new(
        source: Arc<dyn CookieSource>,
        required_domains: Vec<String>,
        freshness: Duration,
    ) -> Self {
        Self {
            source,
            required_domains,
            freshness,
            state: Mutex::new(None),
        }
    }

    /// Cache backed by the HTTP cookie service
    pub fn from_config(config: &CookieServiceConfig) -> Result<Self> {
        let source = CookieServiceClient::new(config)?;
        Ok(Self::new(
            Arc::new(source),
            config.required_domains.clone(),
            config.freshness,
        ))
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// Current cookies, refreshing first when the entry is missing or stale
    ///
    /// # Errors
    /// - `CredentialService` if the service call fails; cache state is untouched
    /// - `IncompleteCredentials` if a required domain came back empty; the
    ///   cache is cleared
    pub async fn cookies(&self) -> Result<SessionCookies> {
        let mut state = self.state.lock().await;

        if let Some(entry) = state.as_ref()
            && entry.is_fresh(self.freshness)
        {
            return Ok(entry.clone());
        }

        tracing::info!(domains = ?self.required_domains, "refreshing session cookies");
        let fetched = self.source.fetch_cookies().await?;

        let missing: Vec<String> = self
            .required_domains
            .iter()
            .filter(|domain| {
                fetched
                    .get(domain.as_str())
                    .is_none_or(|value| value.trim().is_empty())
            })
            .cloned()
            .collect();

        if !missing.is_empty() {
            tracing::warn!(?missing, "cookie refresh incomplete, clearing cache");
            *state = None;
            return Err(AnistreamError::IncompleteCredentials(missing));
        }

        let entry = SessionCookies {
            cookies: fetched,
            fetched_at: Instant::now(),
        };
        *state = Some(entry.clone());
        Ok(entry)
    }

    /// Cookie header for one domain
    ///
    /// # Errors
    /// As [`CookieCache::cookies`], plus `IncompleteCredentials` when the
    /// domain is not part of the cached entry
    pub async fn cookie_header(&self, domain: &str) -> Result<String> {
        let cookies = self.cookies().await?;
        cookies
            .get(domain)
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| AnistreamError::IncompleteCredentials(vec![domain.to_string()]))
    }

    /// Drop the cached entry so the next call refreshes
    pub async fn invalidate(&self) {
        *self.state.lock().await = None;
    }
}
