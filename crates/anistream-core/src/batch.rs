//! Whole-season source resolution
//!
//! Episodes are resolved one at a time with a fixed pause in between so a
//! season download does not trip upstream rate limits. A failed episode is
//! recorded and the loop moves on.

use std::time::Duration;

use serde::Serialize;

use crate::error::Result;
use crate::providers::AnimeProvider;
use crate::types::{EpisodeSources, StreamCategory};

/// Pause between two episode resolutions
pub const DEFAULT_EPISODE_DELAY: Duration = Duration::from_millis(1500);

/// Sources for one episode of a season run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEpisode {
    pub number: u32,
    pub episode_id: String,
    pub sources: EpisodeSources,
}

/// An episode the season run could not resolve
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedEpisode {
    pub number: u32,
    pub episode_id: String,
    pub error: String,
}

/// Outcome of [`resolve_season`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonReport {
    pub anime_id: String,
    pub title: String,
    pub resolved: Vec<ResolvedEpisode>,
    pub failures: Vec<FailedEpisode>,
}

/// Resolves sources for every episode of a title, in episode order
///
/// # Arguments
/// * `provider` - Provider the title belongs to
/// * `anime_id` - Catalog id as returned by `search`
/// * `category` - Audio track to prefer
/// * `delay` - Pause between episodes
///
/// # Errors
/// Only fails when the title itself cannot be fetched; per-episode failures
/// end up in [`SeasonReport::failures`]
pub async fn resolve_season(
    provider: &dyn AnimeProvider,
    anime_id: &str,
    category: StreamCategory,
    delay: Duration,
) -> Result<SeasonReport> {
    let info = provider.fetch_anime_info(anime_id).await?;
    tracing::info!(
        provider = provider.name(),
        anime_id,
        episodes = info.episodes.len(),
        "resolving season"
    );

    let mut resolved = Vec::new();
    let mut failures = Vec::new();

    for (index, episode) in info.episodes.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(delay).await;
        }

        match provider
            .fetch_episode_sources(&episode.id, None, category)
            .await
        {
            Ok(sources) => resolved.push(ResolvedEpisode {
                number: episode.number,
                episode_id: episode.id.clone(),
                sources,
            }),
            Err(err) => {
                tracing::warn!(episode = episode.number, error = %err, "episode failed, continuing");
                failures.push(FailedEpisode {
                    number: episode.number,
                    episode_id: episode.id.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    tracing::info!(
        anime_id,
        resolved = resolved.len(),
        failed = failures.len(),
        "season resolved"
    );

    Ok(SeasonReport {
        anime_id: anime_id.to_string(),
        title: info.title,
        resolved,
        failures,
    })
}
