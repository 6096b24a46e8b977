//! Video extractors
//!
//! An extractor turns an intermediate watch-page URL into playable
//! streams. Two strategies exist:
//! - [`DirectPatternExtractor`] scans a page body for `.m3u8` links
//! - [`TokenEmbeddingExtractor`] combines stream templates with a token
//!   recovered from an obfuscated player script

mod direct;
mod token;

use async_trait::async_trait;
use regex::Regex;

use crate::error::Result;
use crate::ids::query_param;
use crate::types::VideoSource;

pub use direct::DirectPatternExtractor;
pub use token::{TokenEmbeddingExtractor, extract_token};

/// Strategy for turning a watch-page URL into playable sources
#[async_trait]
pub trait VideoExtractor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Resolve `url` into zero or more sources
    ///
    /// An empty result means "nothing found here", letting callers move on
    /// to another candidate; hard failures are errors.
    async fn extract(&self, url: &str) -> Result<Vec<VideoSource>>;
}

/// Quality label for a stream URL
///
/// Prefers a `resolution` query parameter, then a `1080p`-style marker in
/// the URL itself.
pub fn quality_from_url(url: &str) -> Option<String> {
    if let Some(resolution) = query_param(url, "resolution") {
        let resolution = resolution.trim();
        if !resolution.is_empty() {
            return Some(normalize_quality(resolution));
        }
    }

    let resolution = parse_resolution_from_text(url);
    (resolution > 0).then(|| format!("{}p", resolution))
}

/// Normalizes `"720"` and `"720P"` to `"720p"`; other labels pass through
pub fn normalize_quality(label: &str) -> String {
    let trimmed = label.trim();
    let digits = trimmed.trim_end_matches(['p', 'P']);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        format!("{}p", digits)
    } else {
        trimmed.to_string()
    }
}

/// Tries to find a resolution pattern in freeform text
pub(crate) fn parse_resolution_from_text(text: &str) -> u32 {
    if let Ok(re) = Regex::new(r"(\d{3,4})[pP]\b")
        && let Some(caps) = re.captures(text)
        && let Some(m) = caps.get(1)
        && let Ok(res) = m.as_str().parse::<u32>()
    {
        return res;
    }
    if text.contains("4K") || text.contains("4k") {
        return 2160;
    }
    0
}

/// Undoes HTML-entity and JSON slash escaping around embedded URLs
pub(crate) fn unescape_url(raw: &str) -> String {
    raw.replace("&amp;", "&").replace("\\/", "/")
}
