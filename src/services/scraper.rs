// src/services/scraper.rs

//! Listing-site scraper service.
//!
//! Walks the datacentermap.com hierarchy: the USA index page lists states,
//! each state page lists markets, each market page lists facility cards.

use std::time::Duration;

use regex::Regex;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Datacenter, MarketLink, ScraperConfig, StateLink};
use crate::utils::http::create_client;
use crate::utils::{is_facility_href, market_url, parse_market_href, parse_state_href, state_url};

/// Listing table on index and state pages.
const LISTING_TABLE_SELECTOR: &str = "table.ui.sortable.striped.very.basic.very.compact.table tbody a[href]";

/// Facility cards on market pages.
const CARD_SELECTOR: &str = ".ui.cards a.card, .ui.cards a.ui.card, a.ui.card";

/// Service for scraping state, market and facility listings.
pub struct SiteScraper {
    config: ScraperConfig,
    client: Client,
    zip_pattern: Regex,
    suite_pattern: Regex,
}

impl SiteScraper {
    /// Create a new scraper with the given configuration.
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = create_client(config)?;
        Ok(Self {
            config: config.clone(),
            client,
            zip_pattern: Regex::new(r"^\d{5}(?:-\d{4})?$")
                .map_err(|e| AppError::config(format!("zip pattern: {e}")))?,
            suite_pattern: Regex::new(r"(?i)^(suite|ste|unit|floor|fl)\b")
                .map_err(|e| AppError::config(format!("suite pattern: {e}")))?,
        })
    }

    /// Fetch a URL with retry and exponential backoff.
    ///
    /// A 429 answer backs off `retry_delay_secs * 2^attempt`; running out of
    /// attempts yields `AppError::RateLimited`. Any other failure, transport
    /// errors and non-429 error statuses alike, retries on the same schedule
    /// before propagating. Every successful fetch is followed by the
    /// configured request delay.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let mut attempt: u32 = 0;
        loop {
            let outcome = self.client.get(url).send().await;
            attempt += 1;

            // 429 carries its own exhaustion signal; other error statuses
            // join the transport failures on the retry path below.
            let outcome = match outcome {
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= self.config.max_retries {
                        return Err(AppError::rate_limited(url, attempt));
                    }
                    let wait = self.backoff_secs(attempt);
                    log::warn!("429 from {url}, backing off {wait}s (attempt {attempt})");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                    continue;
                }
                Ok(response) => response.error_for_status(),
                Err(error) => Err(error),
            };

            match outcome {
                Ok(response) => {
                    let text = response.text().await?;
                    if self.config.request_delay_secs > 0 {
                        tokio::time::sleep(Duration::from_secs(self.config.request_delay_secs))
                            .await;
                    }
                    return Ok(text);
                }
                Err(error) => {
                    if attempt >= self.config.max_retries {
                        return Err(error.into());
                    }
                    let wait = self.backoff_secs(attempt);
                    log::warn!("Request to {url} failed ({error}), retrying in {wait}s");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
            }
        }
    }

    fn backoff_secs(&self, attempt: u32) -> u64 {
        let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        self.config.retry_delay_secs.saturating_mul(factor)
    }

    /// Fetch all states from the USA index page.
    pub async fn fetch_states(&self) -> Result<Vec<StateLink>> {
        let html = self.fetch(&self.config.base_url).await?;
        self.parse_states(&html)
    }

    /// Fetch all markets on a state page.
    pub async fn fetch_markets(&self, state: &str) -> Result<Vec<MarketLink>> {
        let url = state_url(&self.config.base_url, state)?;
        let html = self.fetch(&url).await?;
        self.parse_markets(&html, state)
    }

    /// Fetch all facility records on a market page.
    pub async fn fetch_datacenters(&self, state: &str, market: &str) -> Result<Vec<Datacenter>> {
        let url = market_url(&self.config.base_url, state, market)?;
        let html = self.fetch(&url).await?;
        self.parse_datacenters(&html, state, market, &url)
    }

    /// Parse state links out of the index page.
    pub fn parse_states(&self, html: &str) -> Result<Vec<StateLink>> {
        let document = Html::parse_document(html);
        let mut states: Vec<StateLink> = Vec::new();

        for href in Self::listing_hrefs(&document)? {
            if let Some(slug) = parse_state_href(&href) {
                states.push(StateLink {
                    url: state_url(&self.config.base_url, &slug)?,
                    slug,
                });
            }
        }

        states.sort();
        states.dedup();
        Ok(states)
    }

    /// Parse market links out of a state page.
    pub fn parse_markets(&self, html: &str, state: &str) -> Result<Vec<MarketLink>> {
        let document = Html::parse_document(html);
        let mut markets: Vec<MarketLink> = Vec::new();

        for href in Self::listing_hrefs(&document)? {
            if let Some(slug) = parse_market_href(&href, state) {
                markets.push(MarketLink {
                    url: market_url(&self.config.base_url, state, &slug)?,
                    slug,
                });
            }
        }

        markets.sort();
        markets.dedup();
        Ok(markets)
    }

    /// Parse facility cards out of a market page.
    pub fn parse_datacenters(
        &self,
        html: &str,
        state: &str,
        market: &str,
        source_url: &str,
    ) -> Result<Vec<Datacenter>> {
        let document = Html::parse_document(html);
        let card_sel = Self::parse_selector(CARD_SELECTOR)?;
        let header_sel = Self::parse_selector(".header")?;
        let desc_sel = Self::parse_selector(".description")?;

        let mut results = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for card in document.select(&card_sel) {
            let Some(href) = card.value().attr("href").map(str::trim) else {
                continue;
            };
            if !is_facility_href(href, state, market) {
                continue;
            }
            if !seen.insert(href.to_string()) {
                continue;
            }

            let Some(header) = card.select(&header_sel).next() else {
                continue;
            };
            let Some(desc) = card.select(&desc_sel).next() else {
                continue;
            };

            if let Some(dc) = self.parse_card(&header, &desc, state, market, source_url) {
                results.push(dc);
            }
        }

        if results.is_empty() {
            log::debug!("0 facility cards on {source_url} (html {} bytes)", html.len());
        }

        Ok(results)
    }

    /// Build a record from a card's header and description elements.
    ///
    /// Description lines: company, street, then an optional 5-digit ZIP line
    /// followed by the city. Suite/unit/floor lines between ZIP and city are
    /// skipped.
    fn parse_card(
        &self,
        header: &ElementRef<'_>,
        desc: &ElementRef<'_>,
        state: &str,
        market: &str,
        source_url: &str,
    ) -> Option<Datacenter> {
        let lines: Vec<String> = desc
            .text()
            .flat_map(|t| t.split('\n'))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        if lines.len() < 2 {
            return None;
        }

        let facility = header.text().collect::<String>().trim().to_string();
        let company = lines[0].clone();
        let street = lines[1].clone();

        let mut zip = None;
        let mut zip_idx = None;
        for (i, line) in lines.iter().enumerate().skip(2) {
            if self.zip_pattern.is_match(line) {
                zip = Some(line[..5].to_string());
                zip_idx = Some(i);
                break;
            }
        }

        let city = zip_idx.and_then(|idx| {
            lines[idx + 1..]
                .iter()
                .find(|line| !self.suite_pattern.is_match(line))
                .cloned()
        });

        Some(Datacenter {
            state: state.to_string(),
            market: market.to_string(),
            facility,
            company,
            street,
            zip,
            city,
            source_url: source_url.to_string(),
        })
    }

    /// Hrefs from the listing table, falling back to all links on the page.
    fn listing_hrefs(document: &Html) -> Result<Vec<String>> {
        let table_sel = Self::parse_selector(LISTING_TABLE_SELECTOR)?;
        let hrefs: Vec<String> = document
            .select(&table_sel)
            .filter_map(|a| a.value().attr("href"))
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();

        if !hrefs.is_empty() {
            return Ok(hrefs);
        }

        let any_sel = Self::parse_selector("a[href]")?;
        Ok(document
            .select(&any_sel)
            .filter_map(|a| a.value().attr("href"))
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect())
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}
