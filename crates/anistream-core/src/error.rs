//! Error types for the anistream scraping pipeline
//!
//! One enum covers every failure a provider, extractor or the cookie
//! cache can surface. Messages carry the id and the step that failed.

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Error type for all anistream operations
///
/// Implements Display for human-readable messages and Serialize
/// so front-ends can forward the message verbatim.
#[derive(Error, Debug)]
pub enum AnistreamError {
    /// Network or transport-level failure
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Request exceeded its time bound
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Rate limited by upstream (HTTP 429)
    #[error("Rate limited - too many requests")]
    RateLimited,

    /// Expected DOM or JSON shape was absent
    #[error("Failed to parse upstream response: {0}")]
    Parse(String),

    /// Id does not resolve to any upstream resource
    #[error("Not found: {0}")]
    NotFound(String),

    /// A lookup step in episode-server resolution yielded nothing
    #[error("Could not resolve episode: {0}")]
    Resolution(String),

    /// Upstream rejected the request's credentials
    #[error("Upstream rejected credentials: {0}")]
    Auth(String),

    /// Cookie service answered but left required domains empty
    #[error("Cookie service returned incomplete credentials, missing: {}", .0.join(", "))]
    IncompleteCredentials(Vec<String>),

    /// Cookie service could not be reached or answered with an unexpected shape
    #[error("Cookie service failed: {0}")]
    CredentialService(String),

    /// Sandboxed deobfuscation produced no usable token
    #[error("Deobfuscation failed: {0}")]
    Deobfuscation(String),

    /// Every candidate server or link was exhausted without a playable source
    #[error("No playable source: {0}")]
    NoSource(String),

    /// Malformed composite id or empty query
    #[error("Invalid id: {0}")]
    InvalidId(String),

    /// Malformed URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Unusable configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AnistreamError {
    /// Wraps a reqwest error, keeping timeouts distinct from other transport failures
    pub(crate) fn from_request(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            AnistreamError::Timeout(url.to_string())
        } else {
            AnistreamError::Transport(err)
        }
    }
}

impl Serialize for AnistreamError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias for anistream operations
pub type Result<T> = std::result::Result<T, AnistreamError>;
