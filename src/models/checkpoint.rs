//! Resume checkpoint for an interrupted collection run.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Datacenter;

/// Progress of a collection run, persisted beside the output CSV.
///
/// Written after every completed market so a rate-limited run can be resumed
/// without re-fetching finished markets. Removed once the CSV is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// ISO 8601 timestamp of the last update
    pub updated_at: DateTime<Utc>,

    /// Markets already collected, as "state/market" keys
    pub completed_markets: HashSet<String>,

    /// Records collected so far
    pub datacenters: Vec<Datacenter>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self {
            updated_at: Utc::now(),
            completed_markets: HashSet::new(),
            datacenters: Vec::new(),
        }
    }

    /// Key identifying a market within a run.
    pub fn market_key(state: &str, market: &str) -> String {
        format!("{state}/{market}")
    }

    /// Whether a market has already been collected.
    pub fn is_done(&self, state: &str, market: &str) -> bool {
        self.completed_markets
            .contains(&Self::market_key(state, market))
    }

    /// Record a finished market and its rows.
    pub fn complete_market(&mut self, state: &str, market: &str, rows: Vec<Datacenter>) {
        self.completed_markets
            .insert(Self::market_key(state, market));
        self.datacenters.extend(rows);
        self.updated_at = Utc::now();
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new()
    }
}
