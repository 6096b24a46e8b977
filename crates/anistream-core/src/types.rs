//! Normalized data types shared by every provider
//!
//! Field names serialize in camelCase so UI and bot layers can consume
//! them without a mapping step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A search-result row identifying a title on one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Composite id, `<slug>$<siteInternalId>` on slug-based sites
    pub id: String,

    pub title: String,

    /// Full URL to the title page
    pub url: String,

    pub image: Option<String>,

    /// Number of subtitled episodes, when the site reports it
    pub total_sub: Option<u32>,

    /// Number of dubbed episodes, when the site reports it
    pub total_dub: Option<u32>,
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage<T> {
    /// 1-based page number
    pub current_page: u32,
    pub has_next_page: bool,
    pub total_pages: u32,
    pub results: Vec<T>,
}

/// Airing status of a title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnimeStatus {
    Completed,
    Ongoing,
    NotYetAired,
    Unknown,
}

impl AnimeStatus {
    /// Maps a site's status label through the fixed status table
    ///
    /// Anything outside the table is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Finished Airing" => AnimeStatus::Completed,
            "Currently Airing" => AnimeStatus::Ongoing,
            "Not yet aired" => AnimeStatus::NotYetAired,
            _ => AnimeStatus::Unknown,
        }
    }
}

/// Audio track of an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamCategory {
    #[default]
    Sub,
    Dub,
}

impl std::str::FromStr for StreamCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sub" => Ok(StreamCategory::Sub),
            "dub" => Ok(StreamCategory::Dub),
            other => Err(format!("unknown category '{}', expected sub or dub", other)),
        }
    }
}

/// A title with its merged episode list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimeInfo {
    pub id: String,
    pub title: String,
    pub url: String,
    pub image: Option<String>,
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub status: AnimeStatus,

    /// Media type label (e.g. "TV", "Movie")
    #[serde(rename = "type")]
    pub media_type: Option<String>,

    pub total_episodes: u32,
    pub has_sub: bool,
    pub has_dub: bool,

    /// Sorted ascending by number, one entry per number
    pub episodes: Vec<Episode>,
}

/// A single merged episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    pub number: u32,
    pub title: Option<String>,
    pub url: Option<String>,
    pub is_subbed: bool,
    pub is_dubbed: bool,
}

/// A named upstream backend mapped to its intermediate URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeServer {
    pub name: String,
    pub url: String,
}

/// A directly playable stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSource {
    pub url: String,

    /// Quality label (e.g. "1080p")
    pub quality: Option<String>,

    #[serde(rename = "isM3U8")]
    pub is_m3u8: bool,
}

impl VideoSource {
    /// Builds a source, flagging HLS playlists by their extension
    pub fn new(url: impl Into<String>, quality: Option<String>) -> Self {
        let url = url.into();
        let is_m3u8 = url
            .split('?')
            .next()
            .is_some_and(|path| path.ends_with(".m3u8"));
        Self {
            url,
            quality,
            is_m3u8,
        }
    }
}

/// Playable sources for one episode plus the headers a player must send
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EpisodeSources {
    pub headers: BTreeMap<String, String>,
    pub sources: Vec<VideoSource>,
}
