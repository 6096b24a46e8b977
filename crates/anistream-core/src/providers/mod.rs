//! Anime providers
//!
//! Every site implements [`AnimeProvider`], so callers can hold any of them
//! as `Arc<dyn AnimeProvider>` and walk the same
//! search → info → sources sequence.

mod animeowl;
mod animepahe;

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use async_trait::async_trait;

use crate::error::{AnistreamError, Result};
use crate::types::{
    AnimeInfo, CatalogEntry, Episode, EpisodeServer, EpisodeSources, SearchPage, StreamCategory,
};

pub use animeowl::{AnimeOwl, AnimeOwlConfig};
pub use animepahe::{AnimePahe, AnimePaheConfig};

/// Capability set every provider offers
#[async_trait]
pub trait AnimeProvider: Send + Sync {
    /// Stable short name (e.g. "animeowl")
    fn name(&self) -> &str;

    /// Search the catalog; `page` is 1-based
    async fn search(&self, query: &str, page: u32) -> Result<SearchPage<CatalogEntry>>;

    /// Title details with the merged, ascending episode list
    async fn fetch_anime_info(&self, id: &str) -> Result<AnimeInfo>;

    /// Servers offering an episode on the requested track
    async fn fetch_episode_servers(
        &self,
        episode_id: &str,
        category: StreamCategory,
    ) -> Result<Vec<EpisodeServer>>;

    /// Playable sources for an episode
    ///
    /// `episode_id` may already be a resolved server URL, in which case
    /// server lookup is skipped. `server` defaults to the provider's
    /// primary backend.
    async fn fetch_episode_sources(
        &self,
        episode_id: &str,
        server: Option<&str>,
        category: StreamCategory,
    ) -> Result<EpisodeSources>;
}

/// Number of pages needed for `total` results at `page_size` per page
pub fn total_pages(total: u64, page_size: u64) -> u32 {
    if page_size == 0 {
        return 0;
    }
    u32::try_from(total.div_ceil(page_size)).unwrap_or(u32::MAX)
}

/// Whether a page follows `current_page`
pub fn has_next_page(current_page: u32, total: u64, page_size: u64) -> bool {
    current_page < total_pages(total, page_size)
}

/// Assembles a search page from the upstream's result count
pub fn search_page<T>(current_page: u32, total: u64, page_size: u64, results: Vec<T>) -> SearchPage<T> {
    SearchPage {
        current_page,
        has_next_page: has_next_page(current_page, total, page_size),
        total_pages: total_pages(total, page_size),
        results,
    }
}

/// Trims a search query, rejecting blank ones
pub(crate) fn validate_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(AnistreamError::InvalidId(
            "Search query cannot be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

/// One episode element parsed from a provider page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeNode {
    /// Site-internal element id
    pub element_id: String,
    pub number: u32,
    pub title: Option<String>,
    pub url: Option<String>,
}

/// Merges separate sub and dub lists into one entry per episode number
///
/// Sub entries come first. A dub entry whose number already exists has its
/// element id appended to the composite id with `&`; otherwise it becomes a
/// dub-only entry. Within one list, the first node for a number wins. The
/// result is sorted ascending by number.
pub fn merge_episodes(slug: &str, sub: Vec<EpisodeNode>, dub: Vec<EpisodeNode>) -> Vec<Episode> {
    let mut merged: BTreeMap<u32, Episode> = BTreeMap::new();

    for node in sub {
        merged.entry(node.number).or_insert_with(|| Episode {
            id: format!("{}${}", slug, node.element_id),
            number: node.number,
            title: node.title,
            url: node.url,
            is_subbed: true,
            is_dubbed: false,
        });
    }

    for node in dub {
        match merged.entry(node.number) {
            Entry::Occupied(mut existing) => {
                let episode = existing.get_mut();
                if !episode.is_dubbed {
                    episode.id.push('&');
                    episode.id.push_str(&node.element_id);
                    episode.is_dubbed = true;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(Episode {
                    id: format!("{}${}", slug, node.element_id),
                    number: node.number,
                    title: node.title,
                    url: node.url,
                    is_subbed: false,
                    is_dubbed: true,
                });
            }
        }
    }

    merged.into_values().collect()
}

/// Picks a server by case-insensitive name
pub(crate) fn find_server<'a>(
    servers: &'a [EpisodeServer],
    name: &str,
) -> Option<&'a EpisodeServer> {
    servers
        .iter()
        .find(|server| server.name.eq_ignore_ascii_case(name))
}
