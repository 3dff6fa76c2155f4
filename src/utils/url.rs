// src/utils/url.rs

//! Site URL and path helpers.
//!
//! datacentermap.com paths follow `/usa/<state>/<market>/<facility>`; these
//! helpers classify hrefs by that shape.

use url::Url;

use crate::error::Result;

/// Non-market slugs that appear as links on state pages.
const NON_MARKET_SLUGS: [&str; 5] = ["quote", "contact", "about", "privacy", "terms"];

/// Split an href into non-empty path segments, tolerating absolute URLs.
pub fn path_parts(href: &str) -> Vec<String> {
    let path = if href.starts_with("http://") || href.starts_with("https://") {
        match Url::parse(href) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => return Vec::new(),
        }
    } else {
        href.to_string()
    };

    path.trim_matches('/')
        .split('/')
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Extract a state slug from an href of shape `/usa/<state>/`.
pub fn parse_state_href(href: &str) -> Option<String> {
    let parts = path_parts(href);
    match parts.as_slice() {
        [usa, state] if usa == "usa" => Some(state.clone()),
        _ => None,
    }
}

/// Extract a market slug from an href of shape `/usa/<state>/<market>/`.
///
/// Returns `None` for non-market links (quote, contact pages, ...).
pub fn parse_market_href(href: &str, state: &str) -> Option<String> {
    let parts = path_parts(href);
    match parts.as_slice() {
        [usa, s, market] if usa == "usa" && s == state => {
            if NON_MARKET_SLUGS.contains(&market.as_str()) {
                None
            } else {
                Some(market.clone())
            }
        }
        _ => None,
    }
}

/// Whether an href points at a facility under the given state and market.
pub fn is_facility_href(href: &str, state: &str, market: &str) -> bool {
    let parts = path_parts(href);
    matches!(
        parts.as_slice(),
        [usa, s, m, _] if usa == "usa" && s == state && m == market
    )
}

/// Absolute URL of a state page, derived from the base listing URL.
pub fn state_url(base_url: &str, state: &str) -> Result<String> {
    let base = Url::parse(base_url)?;
    Ok(base.join(&format!("/usa/{state}/"))?.to_string())
}

/// Absolute URL of a market page, derived from the base listing URL.
pub fn market_url(base_url: &str, state: &str, market: &str) -> Result<String> {
    let base = Url::parse(base_url)?;
    Ok(base.join(&format!("/usa/{state}/{market}/"))?.to_string())
}
