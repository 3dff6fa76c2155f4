// src/services/mod.rs

//! Scraping services.

pub mod scraper;

pub use scraper::SiteScraper;
