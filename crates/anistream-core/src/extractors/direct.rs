//! Direct-pattern extractor
//!
//! Fetches an embed page with the cookies and referer its host demands and
//! scans the raw body for HLS playlist links.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use super::{VideoExtractor, quality_from_url, unescape_url};
use crate::client::{HttpClient, header_map, is_media_url};
use crate::cookies::CookieCache;
use crate::error::{AnistreamError, Result};
use crate::types::VideoSource;

const M3U8_PATTERN: &str = r#"https?:(?:\\?/){2}[^\s"'<>]+?\.m3u8(?:\?[^\s"'<>]*)?"#;

/// Scans embed pages for `.m3u8` URLs
pub struct DirectPatternExtractor {
    http: Arc<HttpClient>,
    referer: Option<String>,
    cookies: Option<(Arc<CookieCache>, String)>,
}

impl DirectPatternExtractor {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self {
            http,
            referer: None,
            cookies: None,
        }
    }

    /// Send this referer with every page fetch
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Attach the cached cookie header for `domain` to every page fetch
    pub fn with_cookies(mut self, cache: Arc<CookieCache>, domain: impl Into<String>) -> Self {
        self.cookies = Some((cache, domain.into()));
        self
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let cookie = match &self.cookies {
            Some((cache, domain)) => Some(cache.cookie_header(domain).await?),
            None => None,
        };

        let mut pairs: Vec<(&str, &str)> = Vec::new();
        if let Some(referer) = &self.referer {
            pairs.push(("referer", referer.as_str()));
        }
        if let Some(cookie) = &cookie {
            pairs.push(("cookie", cookie.as_str()));
        }

        self.http.get_text(url, &header_map(&pairs)?).await
    }
}

#[async_trait]
impl VideoExtractor for DirectPatternExtractor {
    fn name(&self) -> &str {
        "direct-pattern"
    }

    async fn extract(&self, url: &str) -> Result<Vec<VideoSource>> {
        // Already a stream: nothing to scan
        if is_media_url(url) {
            return Ok(vec![VideoSource::new(url, quality_from_url(url))]);
        }

        let body = self.fetch_page(url).await?;
        let sources = scan_m3u8(&body)?;
        if sources.is_empty() {
            tracing::debug!(url, "no m3u8 link in page");
        }
        Ok(sources)
    }
}

/// Every distinct `.m3u8` URL in a page body, in order of appearance
pub fn scan_m3u8(body: &str) -> Result<Vec<VideoSource>> {
    let re = Regex::new(M3U8_PATTERN)
        .map_err(|e| AnistreamError::Parse(format!("Invalid pattern: {}", e)))?;

    let mut seen: Vec<String> = Vec::new();
    for m in re.find_iter(body) {
        let url = unescape_url(m.as_str());
        if !seen.contains(&url) {
            seen.push(url);
        }
    }

    Ok(seen
        .into_iter()
        .map(|url| {
            let quality = quality_from_url(&url);
            VideoSource::new(url, quality)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http() -> Arc<HttpClient> {
        Arc::new(
            HttpClient::with_config(ClientConfig {
                requests_per_second: 1000.0,
                ..ClientConfig::default()
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_scan_plain_and_escaped_links() {
        let body = r#"
            <script>
              const a = "https://na-02.cdn.example/stream/ab/cd/uwu.m3u8";
              const b = {"file":"https:\/\/na-02.cdn.example\/stream\/720p\/index.m3u8?e=1"};
              const c = 'https://na-02.cdn.example/stream/ab/cd/uwu.m3u8';
            </script>
        "#;

        let sources = scan_m3u8(body).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].url, "https://na-02.cdn.example/stream/ab/cd/uwu.m3u8");
        assert!(sources[0].is_m3u8);
        assert_eq!(sources[1].url, "https://na-02.cdn.example/stream/720p/index.m3u8?e=1");
        assert_eq!(sources[1].quality, Some("720p".to_string()));
    }

    #[test]
    fn test_scan_without_match_is_empty() {
        let body = "<html><body><video src='/movie.mp4'></video></body></html>";
        assert!(scan_m3u8(body).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extract_fetches_with_referer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/e/abc"))
            .and(header("referer", "https://animepahe.ru/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<script>source='https://eu-11.files.example/stream/01/abc/uwu.m3u8'</script>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let extractor = DirectPatternExtractor::new(http()).with_referer("https://animepahe.ru/");
        let sources = extractor
            .extract(&format!("{}/e/abc", server.uri()))
            .await
            .unwrap();

        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].url, "https://eu-11.files.example/stream/01/abc/uwu.m3u8");
    }

    #[tokio::test]
    async fn test_extract_returns_empty_when_pattern_misses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>gone</p>"))
            .mount(&server)
            .await;

        let extractor = DirectPatternExtractor::new(http());
        let sources = extractor.extract(&server.uri()).await.unwrap();
        assert!(sources.is_empty());
    }

    #[tokio::test]
    async fn test_media_url_is_returned_without_fetching() {
        let extractor = DirectPatternExtractor::new(http());
        let sources = extractor
            .extract("https://files.example/ep1/1080p/video.mp4?st=abc")
            .await
            .unwrap();

        assert_eq!(sources.len(), 1);
        assert!(!sources[0].is_m3u8);
        assert_eq!(sources[0].quality, Some("1080p".to_string()));
    }
}
