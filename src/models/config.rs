//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and scraping behavior settings
    #[serde(default)]
    pub scraper: ScraperConfig,

    /// State loop settings
    #[serde(default)]
    pub driver: DriverConfig,

    /// Output path settings
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.scraper.user_agent.trim().is_empty() {
            return Err(AppError::validation("scraper.user_agent is empty"));
        }
        if self.scraper.timeout_secs == 0 {
            return Err(AppError::validation("scraper.timeout_secs must be > 0"));
        }
        if self.scraper.max_retries == 0 {
            return Err(AppError::validation("scraper.max_retries must be > 0"));
        }
        if self.scraper.base_url.trim().is_empty() {
            return Err(AppError::validation("scraper.base_url is empty"));
        }
        if self.driver.states.is_empty() {
            return Err(AppError::validation("No states defined"));
        }
        for state in &self.driver.states {
            if !is_state_slug(state) {
                return Err(AppError::validation(format!(
                    "Invalid state slug '{state}': expected kebab-case (e.g. new-york)"
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig::default(),
            driver: DriverConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

/// A state identifier is a kebab-case lowercase name.
fn is_state_slug(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('-')
        && !s.ends_with('-')
        && s.chars().all(|c| c.is_ascii_lowercase() || c == '-')
}

/// HTTP client and scraping behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Root listing page for all states
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay after each successful request in seconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_secs: u64,

    /// Attempts per URL before giving up
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Base wait after a 429 in seconds, doubled each attempt
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_secs: defaults::request_delay(),
            max_retries: defaults::max_retries(),
            retry_delay_secs: defaults::retry_delay(),
        }
    }
}

/// State loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// States to process, in order
    #[serde(default = "defaults::states")]
    pub states: Vec<String>,

    /// Wait before retrying a rate-limited state, in seconds
    #[serde(default = "defaults::cooldown")]
    pub cooldown_secs: u64,

    /// Pause between states, in seconds
    #[serde(default = "defaults::inter_state_delay")]
    pub inter_state_delay_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            states: defaults::states(),
            cooldown_secs: defaults::cooldown(),
            inter_state_delay_secs: defaults::inter_state_delay(),
        }
    }
}

/// Output path settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory for per-state datacenter CSVs
    #[serde(default = "defaults::processed_data_dir")]
    pub processed_data_dir: String,

    /// Directory for derived tables
    #[serde(default = "defaults::data_build_dir")]
    pub data_build_dir: String,

    /// ZIP-to-county crosswalk with allocation ratios
    #[serde(default = "defaults::reference_table")]
    pub reference_table: String,
}

impl PathsConfig {
    /// Output path for a state, by the `datacenters_<state>.csv` convention.
    pub fn state_output(&self, state: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.processed_data_dir).join(format!("datacenters_{state}.csv"))
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            processed_data_dir: defaults::processed_data_dir(),
            data_build_dir: defaults::data_build_dir(),
            reference_table: defaults::reference_table(),
        }
    }
}

mod defaults {
    // Scraper defaults
    pub fn base_url() -> String {
        "https://www.datacentermap.com/usa".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
            .into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        3
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn retry_delay() -> u64 {
        5
    }

    // Driver defaults
    pub fn cooldown() -> u64 {
        600
    }
    pub fn inter_state_delay() -> u64 {
        300
    }
    pub fn states() -> Vec<String> {
        [
            "alabama",
            "alaska",
            "arizona",
            "arkansas",
            "california",
            "colorado",
            "connecticut",
            "delaware",
            "florida",
            "georgia",
            "hawaii",
            "idaho",
            "illinois",
            "indiana",
            "iowa",
            "kansas",
            "kentucky",
            "louisiana",
            "maine",
            "maryland",
            "massachusetts",
            "michigan",
            "minnesota",
            "mississippi",
            "missouri",
            "montana",
            "nebraska",
            "nevada",
            "new-hampshire",
            "new-jersey",
            "new-mexico",
            "new-york",
            "north-carolina",
            "north-dakota",
            "ohio",
            "oklahoma",
            "oregon",
            "pennsylvania",
            "rhode-island",
            "south-carolina",
            "south-dakota",
            "tennessee",
            "texas",
            "utah",
            "vermont",
            "virginia",
            "washington",
            "west-virginia",
            "wisconsin",
            "wyoming",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    // Path defaults
    pub fn processed_data_dir() -> String {
        "data/processed_data".into()
    }
    pub fn data_build_dir() -> String {
        "data/processed_data/data_build".into()
    }
    pub fn reference_table() -> String {
        "data/processed_data/data_build/reference_table.csv".into()
    }
}
