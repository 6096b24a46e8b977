//! Composite identifiers and URL helpers
//!
//! Providers pack several upstream identifiers into one opaque string so a
//! later call can find its way back. The encodings live here so the
//! provider code and its tests agree on one definition.

use url::Url;

use crate::error::{AnistreamError, Result};
use crate::types::StreamCategory;

/// Separates a title slug from its site-internal id or episode refs
pub const SLUG_SEPARATOR: char = '$';

/// Separates the sub episode ref from the dub episode ref
pub const TRACK_SEPARATOR: char = '&';

/// Catalog id of the form `<slug>$<siteInternalId>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogId {
    pub slug: String,
    pub internal_id: String,
}

impl CatalogId {
    pub fn new(slug: impl Into<String>, internal_id: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            internal_id: internal_id.into(),
        }
    }

    /// Parses `<slug>$<id>`; a bare slug is accepted with an empty internal id
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (slug, internal_id) = raw.split_once(SLUG_SEPARATOR).unwrap_or((raw, ""));
        if slug.is_empty() {
            return Err(AnistreamError::InvalidId(format!(
                "catalog id '{}' has no slug",
                raw
            )));
        }
        Ok(Self::new(slug, internal_id))
    }
}

impl std::fmt::Display for CatalogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.slug, SLUG_SEPARATOR, self.internal_id)
    }
}

/// Episode id of the form `<slug>$<subRef>` or `<slug>$<subRef>&<dubRef>`
///
/// A dub-only episode is encoded with its dub ref in the first position,
/// so it parses as `sub`; [`EpisodeRef::track`] hides that distinction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRef {
    pub slug: String,
    pub sub: Option<String>,
    pub dub: Option<String>,
}

impl EpisodeRef {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (slug, refs) = raw.split_once(SLUG_SEPARATOR).ok_or_else(|| {
            AnistreamError::InvalidId(format!("episode id '{}' is missing '{}'", raw, SLUG_SEPARATOR))
        })?;
        if slug.is_empty() {
            return Err(AnistreamError::InvalidId(format!(
                "episode id '{}' has no slug",
                raw
            )));
        }

        let (sub, dub) = match refs.split_once(TRACK_SEPARATOR) {
            Some((sub, dub)) => (non_empty(sub), non_empty(dub)),
            None => (non_empty(refs), None),
        };
        if sub.is_none() && dub.is_none() {
            return Err(AnistreamError::InvalidId(format!(
                "episode id '{}' carries no episode ref",
                raw
            )));
        }

        Ok(Self {
            slug: slug.to_string(),
            sub,
            dub,
        })
    }

    /// Element ref for the requested track, falling back to the other one
    pub fn track(&self, category: StreamCategory) -> Option<&str> {
        let (preferred, fallback) = match category {
            StreamCategory::Sub => (&self.sub, &self.dub),
            StreamCategory::Dub => (&self.dub, &self.sub),
        };
        preferred.as_deref().or(fallback.as_deref())
    }
}

impl std::fmt::Display for EpisodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.slug, SLUG_SEPARATOR)?;
        match (&self.sub, &self.dub) {
            (Some(sub), Some(dub)) => write!(f, "{}{}{}", sub, TRACK_SEPARATOR, dub),
            (Some(only), None) | (None, Some(only)) => write!(f, "{}", only),
            (None, None) => Ok(()),
        }
    }
}

/// Episode id of the form `<animeId>/<episodeSession>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEpisodeId {
    pub anime_id: String,
    pub session: String,
}

impl SessionEpisodeId {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim().trim_matches('/');
        match raw.split_once('/') {
            Some((anime_id, session)) if !anime_id.is_empty() && !session.is_empty() => {
                Ok(Self {
                    anime_id: anime_id.to_string(),
                    session: session.to_string(),
                })
            }
            _ => Err(AnistreamError::InvalidId(format!(
                "episode id '{}' is not <animeId>/<session>",
                raw
            ))),
        }
    }
}

impl std::fmt::Display for SessionEpisodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.anime_id, self.session)
    }
}

/// True when an episode "id" is already a fully resolved URL
pub fn is_resolved_url(candidate: &str) -> bool {
    let candidate = candidate.trim_start();
    candidate.starts_with("https://") || candidate.starts_with("http://")
}

/// Resolves a possibly relative link against a base URL
///
/// # Errors
/// Returns `InvalidUrl` if the base is not absolute or the join fails
pub fn absolute_url(base: &str, link: &str) -> Result<String> {
    let base = Url::parse(base).map_err(|e| AnistreamError::InvalidUrl(format!("{}: {}", base, e)))?;
    base.join(link.trim())
        .map(String::from)
        .map_err(|e| AnistreamError::InvalidUrl(format!("{}: {}", link, e)))
}

/// First value of a query parameter
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Last non-empty path segment of a URL
pub fn last_path_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

/// Host of a URL, e.g. `animepahe.ru`
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_string)
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_catalog_id_round_trip() {
        let id = CatalogId::parse("dandadan$4821").unwrap();
        assert_eq!(id.slug, "dandadan");
        assert_eq!(id.internal_id, "4821");
        assert_eq!(id.to_string(), "dandadan$4821");
    }

    #[test]
    fn test_catalog_id_bare_slug() {
        let id = CatalogId::parse("dandadan").unwrap();
        assert_eq!(id.internal_id, "");
        assert!(CatalogId::parse("$123").is_err());
    }

    #[test]
    fn test_episode_ref_sub_and_dub() {
        let ep = EpisodeRef::parse("dandadan$ep-101&ep-201").unwrap();
        assert_eq!(ep.slug, "dandadan");
        assert_eq!(ep.sub.as_deref(), Some("ep-101"));
        assert_eq!(ep.dub.as_deref(), Some("ep-201"));
        assert_eq!(ep.track(StreamCategory::Dub), Some("ep-201"));
    }

    #[test]
    fn test_episode_ref_sub_only_falls_back_for_dub() {
        let ep = EpisodeRef::parse("dandadan$ep-101").unwrap();
        assert_eq!(ep.dub, None);
        assert_eq!(ep.track(StreamCategory::Sub), Some("ep-101"));
        assert_eq!(ep.track(StreamCategory::Dub), Some("ep-101"));
    }

    #[test]
    fn test_episode_ref_rejects_malformed() {
        assert!(matches!(EpisodeRef::parse("no-separator"), Err(AnistreamError::InvalidId(_))));
        assert!(matches!(EpisodeRef::parse("slug$"), Err(AnistreamError::InvalidId(_))));
        assert!(matches!(EpisodeRef::parse("$ep-1"), Err(AnistreamError::InvalidId(_))));
    }

    #[test]
    fn test_session_episode_id() {
        let id = SessionEpisodeId::parse("7f3a-anime/9c1b-session").unwrap();
        assert_eq!(id.anime_id, "7f3a-anime");
        assert_eq!(id.session, "9c1b-session");
        assert_eq!(id.to_string(), "7f3a-anime/9c1b-session");
        assert!(SessionEpisodeId::parse("only-anime").is_err());
    }

    #[test]
    fn test_is_resolved_url() {
        assert!(is_resolved_url("https://animeowl.me/api/source/abc"));
        assert!(is_resolved_url("http://localhost:8080/x"));
        assert!(!is_resolved_url("dandadan$ep-1"));
    }

    #[test]
    fn test_url_helpers() {
        assert_eq!(
            absolute_url("https://animeowl.me/anime/dandadan", "/watch/ep-1").unwrap(),
            "https://animeowl.me/watch/ep-1"
        );
        assert_eq!(
            query_param("https://cdn.example/a.m3u8?resolution=1080p&x=1", "resolution"),
            Some("1080p".to_string())
        );
        assert_eq!(
            last_path_segment("https://animeowl.me/api/source/abc123/"),
            Some("abc123".to_string())
        );
        assert_eq!(host_of("https://kwik.si/f/abc"), Some("kwik.si".to_string()));
    }

    proptest! {
        #[test]
        fn prop_episode_ref_decomposes(
            slug in "[a-z0-9-]{1,20}",
            sub in "[A-Za-z0-9_-]{1,12}",
            dub in proptest::option::of("[A-Za-z0-9_-]{1,12}"),
        ) {
            let raw = match &dub {
                Some(dub) => format!("{}${}&{}", slug, sub, dub),
                None => format!("{}${}", slug, sub),
            };
            let parsed = EpisodeRef::parse(&raw).unwrap();
            prop_assert_eq!(&parsed.slug, &slug);
            prop_assert_eq!(parsed.sub.as_deref(), Some(sub.as_str()));
            prop_assert_eq!(parsed.dub.as_deref(), dub.as_deref());
            prop_assert_eq!(parsed.to_string(), raw);
        }
    }
}
