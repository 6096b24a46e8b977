//! HTTP client with request pacing and manual redirect handling
//!
//! Every provider and extractor shares one `HttpClient`. Redirects are
//! followed by hand so the final URL of a chain can be captured and so a
//! redirect that lands on a media file is reported instead of downloaded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;
use url::Url;

use crate::error::{AnistreamError, Result};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum requests per second (default: 2.0)
    pub requests_per_second: f64,
    /// Page-load timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Maximum redirect hops followed per request (default: 5)
    pub max_redirects: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2.0,
            timeout_secs: 30,
            max_redirects: 5,
        }
    }
}

/// Rate limiter to control request frequency
///
/// Ensures requests are spaced at least `min_interval` apart.
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the specified requests per second
    pub fn new(requests_per_second: f64) -> Self {
        let min_interval = Duration::from_secs_f64(1.0 / requests_per_second);
        Self {
            min_interval,
            last_request: Arc::new(Mutex::new(Instant::now() - min_interval)),
        }
    }

    /// Wait until the minimum interval since the previous request has elapsed
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();

        if elapsed < self.min_interval {
            sleep(self.min_interval - elapsed).await;
        }

        *last = Instant::now();
    }

    /// Get the minimum interval between requests
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

/// Browser-like user agent sent on every request
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A fetched response after redirects were followed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// URL the chain ended on
    pub url: String,
    /// Response body; empty when the chain stopped at a media file
    pub body: String,
    /// `name=value` pairs from every `Set-Cookie` seen along the chain
    pub set_cookies: Vec<String>,
}

/// How an HTML form wants to be submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

impl FormMethod {
    /// Reads a form's `method` attribute, defaulting to GET like browsers do
    pub fn from_attr(attr: Option<&str>) -> Self {
        match attr.map(|m| m.trim().to_ascii_lowercase()) {
            Some(m) if m == "post" => FormMethod::Post,
            _ => FormMethod::Get,
        }
    }
}

/// Shared HTTP client wrapper
///
/// Handles pacing, status mapping and redirect capture for all upstream
/// calls. Performs no retries; a failed call is surfaced to the caller.
pub struct HttpClient {
    client: reqwest::Client,
    rate_limiter: RateLimiter,
    max_redirects: usize,
}

impl HttpClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .default_headers(default_headers)
            .build()
            .map_err(AnistreamError::Transport)?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(config.requests_per_second),
            max_redirects: config.max_redirects,
        })
    }

    /// GET a URL and return the page the redirect chain ends on
    pub async fn get(&self, url: &str, headers: &HeaderMap) -> Result<Page> {
        let request = self.client.get(url).headers(headers.clone());
        self.execute(request, url, headers).await
    }

    /// GET a URL and return only its body
    pub async fn get_text(&self, url: &str, headers: &HeaderMap) -> Result<String> {
        Ok(self.get(url, headers).await?.body)
    }

    /// GET a URL and decode its JSON body into `T`
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, headers: &HeaderMap) -> Result<T> {
        let body = self.get_text(url, headers).await?;
        serde_json::from_str(&body)
            .map_err(|e| AnistreamError::Parse(format!("JSON from {}: {}", url, e)))
    }

    /// POST a JSON body and decode the JSON response into `T`
    pub async fn post_json<B, T>(&self, url: &str, body: &B, headers: &HeaderMap) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.client.post(url).headers(headers.clone()).json(body);
        let page = self.execute(request, url, headers).await?;
        serde_json::from_str(&page.body)
            .map_err(|e| AnistreamError::Parse(format!("JSON from {}: {}", url, e)))
    }

    /// Submit form fields the way the form's method asks for
    ///
    /// Redirects are followed and the final URL is reported in the returned
    /// page, which is how a confirmation form reveals its target.
    pub async fn submit_form(
        &self,
        url: &str,
        method: FormMethod,
        fields: &[(String, String)],
        headers: &HeaderMap,
    ) -> Result<Page> {
        let request = match method {
            FormMethod::Post => self.client.post(url).form(fields),
            FormMethod::Get => self.client.get(url).query(fields),
        };
        self.execute(request.headers(headers.clone()), url, headers)
            .await
    }

    /// Send the first request, then walk redirects with GETs
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        origin: &str,
        headers: &HeaderMap,
    ) -> Result<Page> {
        self.rate_limiter.acquire().await;
        tracing::debug!(url = origin, "upstream request");

        let mut response = request
            .send()
            .await
            .map_err(|e| AnistreamError::from_request(e, origin))?;
        let mut current_url = origin.to_string();
        let mut set_cookies = Vec::new();

        for _ in 0..=self.max_redirects {
            collect_set_cookies(response.headers(), &mut set_cookies);
            check_status(&response, &current_url)?;

            if response.status().is_redirection()
                && let Some(next) = redirect_target(response.headers(), &current_url)
            {
                // Don't follow into media files (would download the stream)
                if is_media_url(&next) {
                    return Ok(Page {
                        url: next,
                        body: String::new(),
                        set_cookies,
                    });
                }

                current_url = next;
                self.rate_limiter.acquire().await;
                tracing::debug!(url = %current_url, "following redirect");
                response = self
                    .client
                    .request(Method::GET, &current_url)
                    .headers(headers.clone())
                    .send()
                    .await
                    .map_err(|e| AnistreamError::from_request(e, &current_url))?;
                continue;
            }

            let body = response
                .text()
                .await
                .map_err(|e| AnistreamError::from_request(e, &current_url))?;
            return Ok(Page {
                url: current_url,
                body,
                set_cookies,
            });
        }

        Err(AnistreamError::Parse(format!(
            "Too many redirects starting at {}",
            origin
        )))
    }

    /// Get a reference to the rate limiter (for testing)
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}

/// Builds a header map from name/value pairs
///
/// # Errors
/// Returns `Parse` if a name or value is not a valid header
pub fn header_map(pairs: &[(&str, &str)]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AnistreamError::Parse(format!("header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AnistreamError::Parse(format!("header value for {}: {}", name, e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Returns true for URLs whose path ends in a streamable media extension
pub fn is_media_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    [".m3u8", ".mp4", ".mkv", ".webm", ".ts"]
        .iter()
        .any(|ext| path.ends_with(ext))
}

fn check_status(response: &reqwest::Response, url: &str) -> Result<()> {
    let status = response.status();
    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(AnistreamError::RateLimited),
        StatusCode::NOT_FOUND => Err(AnistreamError::NotFound(url.to_string())),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AnistreamError::Auth(format!(
            "{} returned {}",
            url, status
        ))),
        _ if status.is_client_error() || status.is_server_error() => response
            .error_for_status_ref()
            .map(|_| ())
            .map_err(AnistreamError::Transport),
        _ => Ok(()),
    }
}

fn redirect_target(headers: &HeaderMap, current_url: &str) -> Option<String> {
    let location = headers.get(reqwest::header::LOCATION)?.to_str().ok()?;
    let base = Url::parse(current_url).ok()?;
    base.join(location).ok().map(String::from)
}

fn collect_set_cookies(headers: &HeaderMap, into: &mut Vec<String>) {
    for value in headers.get_all(reqwest::header::SET_COOKIE) {
        if let Ok(raw) = value.to_str()
            && let Some(pair) = raw.split(';').next()
        {
            let pair = pair.trim();
            if !pair.is_empty() {
                into.push(pair.to_string());
            }
        }
    }
}
