// src/utils/mod.rs

//! Shared utilities.

pub mod http;
pub mod url;

pub use url::{is_facility_href, market_url, parse_market_href, parse_state_href, state_url};
