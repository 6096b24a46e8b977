//! Pipeline configuration
//!
//! Every setting has a default. [`AnistreamConfig::from_env`] overrides
//! them from `ANISTREAM_*` environment variables.

use std::time::Duration;

use crate::client::ClientConfig;
use crate::cookies::CookieServiceConfig;
use crate::error::{AnistreamError, Result};
use crate::ids::host_of;
use crate::providers::{AnimeOwlConfig, AnimePaheConfig};
use crate::sandbox::ScriptSandbox;

pub const ENV_COOKIE_API_URL: &str = "ANISTREAM_COOKIE_API_URL";
pub const ENV_COOKIE_API_KEY: &str = "ANISTREAM_COOKIE_API_KEY";
pub const ENV_COOKIE_FRESHNESS_SECS: &str = "ANISTREAM_COOKIE_FRESHNESS_SECS";
pub const ENV_ANIMEOWL_URL: &str = "ANISTREAM_ANIMEOWL_URL";
pub const ENV_ANIMEPAHE_URL: &str = "ANISTREAM_ANIMEPAHE_URL";
pub const ENV_DEOBFUSCATOR: &str = "ANISTREAM_DEOBFUSCATOR";

/// Settings for the whole pipeline
#[derive(Clone, Default)]
pub struct AnistreamConfig {
    pub client: ClientConfig,
    pub cookie_service: CookieServiceConfig,
    pub animeowl: AnimeOwlConfig,
    pub animepahe: AnimePaheConfig,
}

impl AnistreamConfig {
    /// Defaults overridden by the process environment
    ///
    /// # Errors
    /// Returns `Config` for an unparsable number or an unreadable
    /// deobfuscator file
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(url) = get(ENV_COOKIE_API_URL) {
            config.cookie_service.url = url;
        }
        if let Some(key) = get(ENV_COOKIE_API_KEY) {
            config.cookie_service.api_key = key;
        }
        if let Some(secs) = get(ENV_COOKIE_FRESHNESS_SECS) {
            let secs: u64 = secs.parse().map_err(|_| {
                AnistreamError::Config(format!("{} must be whole seconds, got '{}'", ENV_COOKIE_FRESHNESS_SECS, secs))
            })?;
            config.cookie_service.freshness = Duration::from_secs(secs);
        }
        if let Some(url) = get(ENV_ANIMEOWL_URL) {
            config.animeowl.base_url = url;
        }
        if let Some(url) = get(ENV_ANIMEPAHE_URL) {
            config.set_animepahe_url(url);
        }
        if let Some(path) = get(ENV_DEOBFUSCATOR) {
            config.animeowl.sandbox = load_deobfuscator(&path)?;
        }

        Ok(config)
    }

    /// Points the cookie-gated provider at another mirror
    ///
    /// The mirror's host becomes the cookie domain the cache must fill.
    pub fn set_animepahe_url(&mut self, url: String) {
        if let Some(host) = host_of(&url) {
            self.cookie_service
                .required_domains
                .retain(|domain| *domain != self.animepahe.cookie_domain);
            self.cookie_service.required_domains.insert(0, host.clone());
            self.animepahe.cookie_domain = host;
        }
        self.animepahe.base_url = url;
    }
}

/// Sandbox running the deobfuscator stored at `path`
///
/// # Errors
/// Returns `Config` if the file cannot be read
pub fn load_deobfuscator(path: &str) -> Result<ScriptSandbox> {
    let program = std::fs::read_to_string(path)
        .map_err(|e| AnistreamError::Config(format!("deobfuscator {}: {}", path, e)))?;
    Ok(ScriptSandbox::new(program))
}
