//! AnimePahe provider
//!
//! Cookie-gated site: every request carries the session cookie header from
//! the shared [`CookieCache`]. Catalog ids are the site's anime session;
//! episode ids are `<animeSession>/<episodeSession>`.
//!
//! Download links on a play page lead through a confirmation page and a
//! token-protected form before the stream host hands out the final URL.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use scraper::Html;
use serde::Deserialize;

use super::{AnimeProvider, find_server, search_page, validate_query};
use crate::client::{FormMethod, HttpClient, Page, header_map};
use crate::cookies::CookieCache;
use crate::dom::{select_all_text, select_attr, select_text, selector, text_of};
use crate::error::{AnistreamError, Result};
use crate::extractors::{DirectPatternExtractor, VideoExtractor, parse_resolution_from_text};
use crate::ids::{SessionEpisodeId, absolute_url, is_resolved_url};
use crate::types::{
    AnimeInfo, AnimeStatus, CatalogEntry, Episode, EpisodeServer, EpisodeSources, SearchPage,
    StreamCategory, VideoSource,
};

const SEARCH_PAGE_SIZE: u64 = 8;
const TOKEN_FIELD: &str = "_token";

/// Configuration for [`AnimePahe`]
#[derive(Debug, Clone)]
pub struct AnimePaheConfig {
    /// Site root (default: `https://animepahe.ru`)
    pub base_url: String,
    /// Cookie-cache key for the site itself
    pub cookie_domain: String,
    /// Cookie-cache key for the stream host behind the download links
    pub kwik_domain: String,
}

impl Default for AnimePaheConfig {
    fn default() -> Self {
        Self {
            base_url: "https://animepahe.ru".to_string(),
            cookie_domain: "animepahe.ru".to_string(),
            kwik_domain: "kwik.si".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    per_page: Option<u64>,
    #[serde(default)]
    data: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    title: String,
    session: String,
    #[serde(default)]
    poster: Option<String>,
    #[serde(default)]
    episodes: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    #[serde(default = "first_page")]
    last_page: u32,
    #[serde(default)]
    data: Vec<Release>,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct Release {
    episode: serde_json::Value,
    session: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    audio: Option<String>,
}

/// Confirmation form found on an interstitial page
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConfirmForm {
    action: String,
    method: FormMethod,
    fields: Vec<(String, String)>,
}

/// AnimePahe scraper
pub struct AnimePahe {
    http: Arc<HttpClient>,
    cookies: Arc<CookieCache>,
    base_url: String,
    cookie_domain: String,
    kwik_domain: String,
    extractor: DirectPatternExtractor,
}

impl AnimePahe {
    pub fn new(http: Arc<HttpClient>, cookies: Arc<CookieCache>, config: AnimePaheConfig) -> Self {
        let extractor = DirectPatternExtractor::new(Arc::clone(&http))
            .with_referer(format!("https://{}/", config.kwik_domain))
            .with_cookies(Arc::clone(&cookies), config.kwik_domain.clone());

        Self {
            http,
            cookies,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cookie_domain: config.cookie_domain,
            kwik_domain: config.kwik_domain,
            extractor,
        }
    }

    async fn site_headers(&self) -> Result<HeaderMap> {
        let cookie = self.cookies.cookie_header(&self.cookie_domain).await?;
        let referer = format!("{}/", self.base_url);
        header_map(&[("cookie", cookie.as_str()), ("referer", referer.as_str())])
    }

    async fn kwik_headers(&self, referer: &str, set_cookies: &[String]) -> Result<HeaderMap> {
        let cookie = self.cookies.cookie_header(&self.kwik_domain).await?;
        let cookie = merge_cookie_header(&cookie, set_cookies);
        header_map(&[("cookie", cookie.as_str()), ("referer", referer)])
    }

    /// Drops cached cookies when the upstream rejected them
    async fn guard_auth<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(AnistreamError::Auth(reason)) = &result {
            tracing::warn!(%reason, "upstream rejected session cookies, invalidating cache");
            self.cookies.invalidate().await;
        }
        result
    }

    async fn get_page(&self, url: &str) -> Result<Page> {
        let headers = self.site_headers().await?;
        self.guard_auth(self.http.get(url, &headers).await).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let headers = self.site_headers().await?;
        self.guard_auth(self.http.get_json(url, &headers).await).await
    }

    async fn fetch_releases(&self, anime_id: &str) -> Result<Vec<Episode>> {
        let release_url = |page: u32| {
            format!(
                "{}/api?m=release&id={}&sort=episode_asc&page={}",
                self.base_url,
                urlencoding::encode(anime_id),
                page
            )
        };

        let first: ReleaseResponse = self.get_json(&release_url(1)).await?;
        let mut releases = first.data;
        for page in 2..=first.last_page {
            let next: ReleaseResponse = self.get_json(&release_url(page)).await?;
            releases.extend(next.data);
        }

        let mut episodes: BTreeMap<u32, Episode> = BTreeMap::new();
        for release in releases {
            let Some(number) = episode_number(&release.episode) else {
                tracing::warn!(anime_id, episode = %release.episode, "unusable episode number dropped");
                continue;
            };
            let id = SessionEpisodeId {
                anime_id: anime_id.to_string(),
                session: release.session,
            };
            episodes.entry(number).or_insert_with(|| Episode {
                url: Some(format!("{}/play/{}", self.base_url, id)),
                id: id.to_string(),
                number,
                title: release.title.filter(|t| !t.trim().is_empty()),
                is_subbed: true,
                is_dubbed: release
                    .audio
                    .as_deref()
                    .is_some_and(|audio| audio.eq_ignore_ascii_case("eng")),
            });
        }

        Ok(episodes.into_values().collect())
    }

    /// Walks one download link to a playable stream
    ///
    /// Interstitial page (optionally one more `a.redirect` hop), then the
    /// confirmation form with its anti-automation token, then the stream
    /// host's final URL handed to the extractor.
    async fn resolve_link(&self, link: &str) -> Result<Vec<VideoSource>> {
        let mut page = self.get_page(link).await?;
        let mut form = parse_confirm_form(&page.body, &page.url)?;

        if form.is_none()
            && let Some(next) = parse_redirect_link(&page.body, &page.url)?
        {
            let headers = self.kwik_headers(&page.url, &page.set_cookies).await?;
            page = self
                .guard_auth(self.http.get(&next, &headers).await)
                .await?;
            form = parse_confirm_form(&page.body, &page.url)?;
        }

        let form = form.ok_or_else(|| {
            AnistreamError::Resolution(format!("no confirmation form behind {}", link))
        })?;

        let headers = self.kwik_headers(&page.url, &page.set_cookies).await?;
        let submitted = self
            .guard_auth(
                self.http
                    .submit_form(&form.action, form.method, &form.fields, &headers)
                    .await,
            )
            .await?;
        tracing::debug!(link, target = %submitted.url, "confirmation form resolved");

        self.extractor.extract(&submitted.url).await
    }

    fn playback_headers(&self) -> BTreeMap<String, String> {
        [("Referer".to_string(), format!("https://{}/", self.kwik_domain))]
            .into_iter()
            .collect()
    }

    /// Resolves links in order, skipping the ones whose chain breaks
    async fn resolve_links(
        &self,
        episode_id: &str,
        links: &[EpisodeServer],
    ) -> Result<EpisodeSources> {
        let mut sources = Vec::new();
        let mut rejected = None;

        for link in links {
            match self.resolve_link(&link.url).await {
                Ok(found) if found.is_empty() => {
                    tracing::warn!(episode_id, server = %link.name, "link yielded no stream, skipping");
                }
                Ok(found) => {
                    let fallback_quality = quality_from_name(&link.name);
                    sources.extend(found.into_iter().map(|mut source| {
                        if source.quality.is_none() {
                            source.quality = fallback_quality.clone();
                        }
                        source
                    }));
                }
                Err(err) => {
                    tracing::warn!(episode_id, server = %link.name, error = %err, "link chain failed, skipping");
                    if matches!(
                        err,
                        AnistreamError::Auth(_)
                            | AnistreamError::IncompleteCredentials(_)
                            | AnistreamError::CredentialService(_)
                    ) {
                        rejected = Some(err);
                    }
                }
            }
        }

        if sources.is_empty() {
            return Err(rejected.unwrap_or_else(|| {
                AnistreamError::NoSource(format!(
                    "{}: none of {} links resolved",
                    episode_id,
                    links.len()
                ))
            }));
        }

        Ok(EpisodeSources {
            headers: self.playback_headers(),
            sources,
        })
    }
}

#[async_trait]
impl AnimeProvider for AnimePahe {
    fn name(&self) -> &str {
        "animepahe"
    }

    async fn search(&self, query: &str, page: u32) -> Result<SearchPage<CatalogEntry>> {
        let query = validate_query(query)?;
        let page = page.max(1);
        let url = format!(
            "{}/api?m=search&q={}&page={}",
            self.base_url,
            urlencoding::encode(query),
            page
        );

        let response: SearchResponse = self.get_json(&url).await?;
        let page_size = response.per_page.filter(|size| *size > 0).unwrap_or(SEARCH_PAGE_SIZE);

        let results = response
            .data
            .into_iter()
            .map(|item| CatalogEntry {
                url: format!("{}/anime/{}", self.base_url, item.session),
                id: item.session,
                title: item.title,
                image: item.poster,
                total_sub: item.episodes,
                total_dub: None,
            })
            .collect();

        Ok(search_page(page, response.total, page_size, results))
    }

    async fn fetch_anime_info(&self, id: &str) -> Result<AnimeInfo> {
        let id = id.trim();
        if id.is_empty() || id.contains('/') {
            return Err(AnistreamError::InvalidId(format!(
                "'{}' is not an anime session id",
                id
            )));
        }

        let url = format!("{}/anime/{}", self.base_url, id);
        let page = self.get_page(&url).await?;
        let mut info = parse_info_page(&page.body, id, &url, &self.base_url)?;

        let episodes = self.fetch_releases(id).await?;
        info.total_episodes = u32::try_from(episodes.len()).unwrap_or(u32::MAX);
        info.has_sub = episodes.iter().any(|e| e.is_subbed);
        info.has_dub = episodes.iter().any(|e| e.is_dubbed);
        info.episodes = episodes;
        Ok(info)
    }

    async fn fetch_episode_servers(
        &self,
        episode_id: &str,
        category: StreamCategory,
    ) -> Result<Vec<EpisodeServer>> {
        let id = SessionEpisodeId::parse(episode_id)?;
        let url = format!("{}/play/{}", self.base_url, id);
        let page = self.get_page(&url).await?;

        let links = parse_download_links(&page.body, &page.url)?;
        if links.is_empty() {
            return Err(AnistreamError::NotFound(format!(
                "no download links for {}",
                episode_id
            )));
        }
        Ok(filter_by_category(links, category))
    }

    async fn fetch_episode_sources(
        &self,
        episode_id: &str,
        server: Option<&str>,
        category: StreamCategory,
    ) -> Result<EpisodeSources> {
        if is_resolved_url(episode_id) {
            let link = EpisodeServer {
                name: server.unwrap_or("kwik").to_string(),
                url: episode_id.trim().to_string(),
            };
            return self.resolve_links(episode_id, &[link]).await;
        }

        let servers = self.fetch_episode_servers(episode_id, category).await?;
        match server {
            Some(name) => {
                let chosen = find_server(&servers, name).ok_or_else(|| {
                    AnistreamError::NotFound(format!("server '{}' for {}", name, episode_id))
                })?;
                self.resolve_links(episode_id, std::slice::from_ref(chosen))
                    .await
            }
            None => self.resolve_links(episode_id, &servers).await,
        }
    }
}

/// Episode number from a release entry; fractional numbers are not episodes
fn episode_number(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::Number(n) => match n.as_u64() {
            Some(whole) => u32::try_from(whole).ok(),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
                .map(|f| f as u32),
        },
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_info_page(html: &str, id: &str, url: &str, base_url: &str) -> Result<AnimeInfo> {
    let document = Html::parse_document(html);

    let title = select_text(&document, "div.title-wrapper > h1 > span")?
        .ok_or_else(|| AnistreamError::Parse(format!("title missing on info page for {}", id)))?;

    let image = select_attr(&document, "div.anime-poster a", "href")?
        .or(select_attr(&document, "div.anime-poster img", "data-src")?)
        .or(select_attr(&document, "div.anime-poster img", "src")?)
        .and_then(|src| absolute_url(base_url, &src).ok());

    let mut status = AnimeStatus::Unknown;
    let mut media_type = None;
    for line in select_all_text(&document, "div.anime-info p")? {
        if let Some(label) = line.strip_prefix("Status:") {
            status = AnimeStatus::from_label(label);
        } else if let Some(label) = line.strip_prefix("Type:") {
            media_type = Some(label.trim().to_string()).filter(|t| !t.is_empty());
        }
    }

    Ok(AnimeInfo {
        id: id.to_string(),
        title,
        url: url.to_string(),
        image,
        description: select_text(&document, "div.anime-summary")?,
        genres: select_all_text(&document, "div.anime-genre ul li")?,
        status,
        media_type,
        total_episodes: 0,
        has_sub: false,
        has_dub: false,
        episodes: Vec::new(),
    })
}

/// Download links of a play page, named `kwik-<quality>` with an `-eng`
/// suffix for dubbed audio
fn parse_download_links(html: &str, page_url: &str) -> Result<Vec<EpisodeServer>> {
    let document = Html::parse_document(html);
    let link_selector = selector("#pickDownload a[href]")?;

    let mut links = Vec::new();
    for anchor in document.select(&link_selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(url) = absolute_url(page_url, href) else {
            tracing::warn!(href, "unusable download link dropped");
            continue;
        };

        let label = text_of(&anchor);
        let mut name = match parse_resolution_from_text(&label) {
            0 => "kwik".to_string(),
            resolution => format!("kwik-{}p", resolution),
        };
        if label
            .split_whitespace()
            .any(|word| word.eq_ignore_ascii_case("eng"))
        {
            name.push_str("-eng");
        }

        links.push(EpisodeServer { name, url });
    }

    Ok(links)
}

/// Keeps links matching the requested audio track, or all of them when
/// none match
fn filter_by_category(links: Vec<EpisodeServer>, category: StreamCategory) -> Vec<EpisodeServer> {
    let wants_dub = category == StreamCategory::Dub;
    let matching: Vec<EpisodeServer> = links
        .iter()
        .filter(|link| link.name.ends_with("-eng") == wants_dub)
        .cloned()
        .collect();

    if matching.is_empty() { links } else { matching }
}

fn quality_from_name(name: &str) -> Option<String> {
    match parse_resolution_from_text(name) {
        0 => None,
        resolution => Some(format!("{}p", resolution)),
    }
}

/// Finds the confirmation form and its fields
///
/// # Errors
/// Returns `Resolution` when the form carries no anti-automation token
fn parse_confirm_form(html: &str, page_url: &str) -> Result<Option<ConfirmForm>> {
    let document = Html::parse_document(html);
    let form_selector = selector("form[action]")?;
    let input_selector = selector("input[name]")?;

    let Some(form) = document.select(&form_selector).next() else {
        return Ok(None);
    };

    let action = form.value().attr("action").unwrap_or_default();
    let action = absolute_url(page_url, action)?;
    let method = FormMethod::from_attr(form.value().attr("method"));

    let fields: Vec<(String, String)> = form
        .select(&input_selector)
        .filter_map(|input| {
            let attrs = input.value();
            let name = attrs.attr("name")?;
            Some((name.to_string(), attrs.attr("value").unwrap_or_default().to_string()))
        })
        .collect();

    let has_token = fields
        .iter()
        .any(|(name, value)| name == TOKEN_FIELD && !value.trim().is_empty());
    if !has_token {
        return Err(AnistreamError::Resolution(format!(
            "confirmation form on {} has no {}",
            page_url, TOKEN_FIELD
        )));
    }

    Ok(Some(ConfirmForm {
        action,
        method,
        fields,
    }))
}

fn parse_redirect_link(html: &str, page_url: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    select_attr(&document, "a.redirect", "href")?
        .map(|href| absolute_url(page_url, &href))
        .transpose()
}

/// Cached cookie header plus cookies the chain picked up along the way
fn merge_cookie_header(cached: &str, set_cookies: &[String]) -> String {
    let mut parts: Vec<&str> = cached
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    for cookie in set_cookies {
        let name = cookie.split('=').next().unwrap_or_default();
        parts.retain(|part| part.split('=').next() != Some(name));
        parts.push(cookie.as_str());
    }
    parts.join("; ")
}
