// src/models/mod.rs

//! Domain models for the collection pipeline.

mod checkpoint;
mod config;
mod datacenter;

// Re-export all public types
pub use checkpoint::Checkpoint;
pub use config::{Config, DriverConfig, PathsConfig, ScraperConfig};
pub use datacenter::{Datacenter, MarketLink, StateLink};

/// Summary of a completed per-state collection run.
#[derive(Debug, Default, Clone)]
pub struct CollectStats {
    /// States actually processed
    pub state_count: usize,
    /// Markets fetched (including resumed skips)
    pub market_count: usize,
    /// Markets skipped because the checkpoint already had them
    pub markets_resumed: usize,
    /// States whose market listing could not be fetched
    pub state_failures: usize,
    /// Markets whose fetch or parse failed and were skipped
    pub market_failures: usize,
    /// Records written
    pub datacenter_count: usize,
}
