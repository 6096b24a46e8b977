//! HTML document queries shared by the providers
//!
//! Thin helpers over `scraper` so parsers read as selector lookups.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AnistreamError, Result};

/// Compiles a CSS selector, surfacing a bad selector as `Parse`
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| AnistreamError::Parse(format!("Invalid selector {}: {:?}", css, e)))
}

/// Collected, whitespace-trimmed text of an element
pub fn text_of(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Trimmed text of the first match, `None` when absent or blank
pub fn select_text(document: &Html, css: &str) -> Result<Option<String>> {
    let selector = selector(css)?;
    Ok(document
        .select(&selector)
        .next()
        .map(|el| text_of(&el))
        .filter(|text| !text.is_empty()))
}

/// Attribute value of the first match that carries it
pub fn select_attr(document: &Html, css: &str, attr: &str) -> Result<Option<String>> {
    let selector = selector(css)?;
    Ok(document
        .select(&selector)
        .find_map(|el| el.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}

/// Trimmed text of every match, blanks dropped
pub fn select_all_text(document: &Html, css: &str) -> Result<Vec<String>> {
    let selector = selector(css)?;
    Ok(document
        .select(&selector)
        .map(|el| text_of(&el))
        .filter(|text| !text.is_empty())
        .collect())
}

/// Looks up an element by its `id` attribute
///
/// Ids coming from upstream markup are not guaranteed to be valid CSS
/// identifiers, so this compares attributes instead of building `#id`.
pub fn find_by_id<'a>(document: &'a Html, tag: &str, id: &str) -> Result<Option<ElementRef<'a>>> {
    let selector = selector(&format!("{}[id]", tag))?;
    Ok(document
        .select(&selector)
        .find(|el| el.value().attr("id") == Some(id)))
}
