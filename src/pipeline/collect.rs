// src/pipeline/collect.rs

//! Per-state collection pipeline.
//!
//! Fetches every market of the requested states and writes the facility
//! records to a single CSV. Progress is checkpointed after each market so a
//! rate-limited run can resume without re-fetching finished markets.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::models::{Checkpoint, CollectStats, Config};
use crate::services::SiteScraper;
use crate::storage::LocalStorage;

/// Options for a collection run.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// State slugs to collect; empty means every state on the index page.
    pub states: Vec<String>,

    /// Output CSV path.
    pub output: PathBuf,

    /// Continue from an existing checkpoint instead of starting fresh.
    pub resume: bool,
}

/// Run the collection pipeline.
///
/// Rate limiting that survives the fetch-level retries persists the
/// checkpoint and propagates as `AppError::RateLimited` (process exit
/// status 2). Per-market failures of any other kind are logged and skipped.
pub async fn run_collect(
    config: &Config,
    storage: &LocalStorage,
    options: &CollectOptions,
) -> Result<CollectStats> {
    let scraper = SiteScraper::new(&config.scraper)?;
    let mut stats = CollectStats::default();

    log::info!("Fetching state list from {}", config.scraper.base_url);
    let mut states = scraper.fetch_states().await?;
    log::info!("Found {} states", states.len());

    if !options.states.is_empty() {
        let wanted: HashSet<String> = options
            .states
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        states.retain(|s| wanted.contains(&s.slug));

        if states.is_empty() {
            return Err(AppError::validation(format!(
                "None of the requested states were found: {:?}",
                options.states
            )));
        }
        log::info!("Filtered to {} requested states", states.len());
    }

    let mut checkpoint = if options.resume {
        match storage.load_checkpoint(&options.output).await? {
            Some(cp) => {
                log::info!(
                    "Resuming from checkpoint: {} markets done, {} records so far",
                    cp.completed_markets.len(),
                    cp.datacenters.len()
                );
                cp
            }
            None => {
                log::warn!("--resume given but no checkpoint found, starting fresh");
                Checkpoint::new()
            }
        }
    } else {
        Checkpoint::new()
    };

    let state_total = states.len();
    for (state_idx, state) in states.iter().enumerate() {
        log::info!("[{}/{}] Processing state: {}", state_idx + 1, state_total, state.slug);
        stats.state_count += 1;

        let markets = match scraper.fetch_markets(&state.slug).await {
            Ok(markets) => markets,
            Err(e) if e.is_rate_limited() => {
                storage.save_checkpoint(&options.output, &checkpoint).await?;
                return Err(e);
            }
            Err(e) => {
                log::warn!("Failed to fetch markets for {}: {}", state.slug, e);
                stats.state_failures += 1;
                continue;
            }
        };

        if markets.is_empty() {
            log::warn!("No markets found for {}", state.slug);
            continue;
        }
        log::info!("  Found {} markets in {}", markets.len(), state.slug);

        for (market_idx, market) in markets.iter().enumerate() {
            stats.market_count += 1;

            if checkpoint.is_done(&state.slug, &market.slug) {
                stats.markets_resumed += 1;
                log::debug!("  Skipping completed market {}/{}", state.slug, market.slug);
                continue;
            }

            log::info!(
                "    [{}/{}] Processing market: {}",
                market_idx + 1,
                markets.len(),
                market.slug
            );

            match scraper.fetch_datacenters(&state.slug, &market.slug).await {
                Ok(rows) => {
                    log::info!("      Found {} datacenters", rows.len());
                    checkpoint.complete_market(&state.slug, &market.slug, rows);
                    storage.save_checkpoint(&options.output, &checkpoint).await?;
                }
                Err(e) if e.is_rate_limited() => {
                    storage.save_checkpoint(&options.output, &checkpoint).await?;
                    return Err(e);
                }
                Err(e) => {
                    log::warn!(
                        "      Failed to get datacenters for {}/{}: {}",
                        state.slug,
                        market.slug,
                        e
                    );
                    stats.market_failures += 1;
                }
            }
        }
    }

    if checkpoint.datacenters.is_empty() {
        return Err(AppError::validation("No datacenters found. Nothing to save."));
    }

    stats.datacenter_count = checkpoint.datacenters.len();
    storage
        .write_datacenters_csv(&options.output, &checkpoint.datacenters)
        .await?;
    storage.clear_checkpoint(&options.output).await?;

    log::info!(
        "Saved {} datacenters to {}",
        stats.datacenter_count,
        options.output.display()
    );

    Ok(stats)
}
