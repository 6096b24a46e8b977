//! Main API for the anistream pipeline
//!
//! Wires one shared HTTP client and one cookie cache into every provider
//! and hands providers out by name.

use std::sync::Arc;

use crate::batch::{DEFAULT_EPISODE_DELAY, SeasonReport, resolve_season};
use crate::client::HttpClient;
use crate::config::AnistreamConfig;
use crate::cookies::CookieCache;
use crate::error::{AnistreamError, Result};
use crate::providers::{AnimeOwl, AnimePahe, AnimeProvider};
use crate::types::StreamCategory;

/// Registry of the configured providers
///
/// Providers share the rate-limited client and the cookie cache, so one
/// `Anistream` should live for the whole process.
pub struct Anistream {
    cookies: Arc<CookieCache>,
    providers: Vec<Arc<dyn AnimeProvider>>,
}

impl Anistream {
    /// Create a pipeline with default configuration
    ///
    /// # Errors
    /// Returns error if HTTP client initialization fails
    pub fn new() -> Result<Self> {
        Self::with_config(AnistreamConfig::default())
    }

    /// Create a pipeline with custom configuration
    ///
    /// # Arguments
    /// * `config` - Client, cookie-service and provider settings
    ///
    /// # Errors
    /// Returns error if HTTP client initialization fails
    pub fn with_config(config: AnistreamConfig) -> Result<Self> {
        let http = Arc::new(HttpClient::with_config(config.client)?);
        let cookies = Arc::new(CookieCache::from_config(&config.cookie_service)?);

        let providers: Vec<Arc<dyn AnimeProvider>> = vec![
            Arc::new(AnimeOwl::new(Arc::clone(&http), config.animeowl)),
            Arc::new(AnimePahe::new(
                Arc::clone(&http),
                Arc::clone(&cookies),
                config.animepahe,
            )),
        ];

        Ok(Self { cookies, providers })
    }

    /// Names of the registered providers
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Looks up a provider by case-insensitive name
    ///
    /// # Errors
    /// - `NotFound` if no provider has that name
    pub fn provider(&self, name: &str) -> Result<Arc<dyn AnimeProvider>> {
        self.providers
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
            .cloned()
            .ok_or_else(|| AnistreamError::NotFound(format!("provider '{}'", name)))
    }

    /// Shared cookie cache, e.g. to force a refresh
    pub fn cookies(&self) -> &Arc<CookieCache> {
        &self.cookies
    }

    /// Resolves every episode of a title with the default inter-episode delay
    ///
    /// # Errors
    /// - `NotFound` if the provider is unknown
    /// - any error from fetching the title itself
    pub async fn resolve_season(
        &self,
        provider: &str,
        anime_id: &str,
        category: StreamCategory,
    ) -> Result<SeasonReport> {
        let provider = self.provider(provider)?;
        resolve_season(provider.as_ref(), anime_id, category, DEFAULT_EPISODE_DELAY).await
    }
}
