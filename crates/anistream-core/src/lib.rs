//! Anistream Core Library
//!
//! Async scraping pipeline that normalizes anime streaming sites into one
//! search → info → episode sources flow.
//!
//! # Overview
//!
//! This crate provides:
//! - Providers for an AnimeOwl-style site and a cookie-gated AnimePahe-style site
//! - Sub/dub episode merging behind composite episode ids
//! - Video extractors: a direct `.m3u8` scanner and a token-embedding
//!   extractor that deobfuscates player scripts in a JavaScript sandbox
//! - A time-boxed session cookie cache fed by a remote cookie service
//! - Sequential whole-season resolution
//!
//! # Example
//!
//! ```no_run
//! use anistream_core::{Anistream, StreamCategory, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let pipeline = Anistream::new()?;
//!     let owl = pipeline.provider("animeowl")?;
//!
//!     let page = owl.search("Dandadan", 1).await?;
//!     if let Some(entry) = page.results.first() {
//!         let info = owl.fetch_anime_info(&entry.id).await?;
//!         if let Some(episode) = info.episodes.first() {
//!             let sources = owl
//!                 .fetch_episode_sources(&episode.id, None, StreamCategory::Sub)
//!                 .await?;
//!             for source in &sources.sources {
//!                 println!("{:?} {}", source.quality, source.url);
//!             }
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Stream URLs
//!
//! Source URLs carry short-lived tokens and must be played with the headers
//! returned next to them. Do not cache them long-term.

pub mod batch;
mod client;
pub mod config;
pub mod cookies;
pub mod dom;
mod error;
pub mod extractors;
pub mod ids;
mod pipeline;
pub mod providers;
pub mod sandbox;
mod types;

// Re-export client types
pub use client::{ClientConfig, FormMethod, HttpClient, Page, RateLimiter};

// Re-export error types
pub use error::{AnistreamError, Result};

// Re-export main pipeline API
pub use batch::{SeasonReport, resolve_season};
pub use config::AnistreamConfig;
pub use cookies::{CookieCache, CookieServiceConfig, CookieSource, StaticCookieSource};
pub use pipeline::Anistream;
pub use providers::{AnimeOwl, AnimeOwlConfig, AnimePahe, AnimePaheConfig, AnimeProvider};
pub use sandbox::ScriptSandbox;

// Re-export data types
pub use types::{
    AnimeInfo, AnimeStatus, CatalogEntry, Episode, EpisodeServer, EpisodeSources, SearchPage,
    StreamCategory, VideoSource,
};
