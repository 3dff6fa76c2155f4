// src/main.rs

//! dcmap CLI
//!
//! Collects US data-center siting data per state from datacentermap.com and
//! builds the derived ZIP- and county-grain count tables.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dcmap::{
    error::{AppError, EXIT_RATE_LIMITED, Result},
    models::Config,
    pipeline::{
        CollectOptions, CollectorPipeline, build_county_table, build_reference_table,
        build_zip_table, run_collect, run_driver,
    },
    storage::LocalStorage,
};

/// dcmap - data-center siting data collection pipeline
#[derive(Parser, Debug)]
#[command(name = "dcmap", version, about = "Data-center siting data collector")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the state loop: collect every configured state with rate-limit
    /// cooldown and retry
    Drive {
        /// Comma-separated state slugs overriding the configured list
        #[arg(long)]
        states: Option<String>,

        /// Resume each state from its checkpoint where one exists
        #[arg(long)]
        resume: bool,
    },

    /// Collect one or more states into a single CSV
    Scrape {
        /// Comma-separated state slugs (e.g. 'texas,virginia'); empty means all
        #[arg(long, default_value = "")]
        states: String,

        /// Output CSV file path
        #[arg(short, long, default_value = "data/processed_data/datacenter_list.csv")]
        output: PathBuf,

        /// Continue from an existing checkpoint
        #[arg(long)]
        resume: bool,

        /// Base URL to scrape from (overrides config)
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Build the ZIP-grain datacenter count table from per-state CSVs
    ZipTable {
        /// Directory containing datacenter*.csv (default: configured
        /// processed-data dir)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Output CSV path (default: <data_build_dir>/zip_table_num_dc.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build the ZIP-to-county reference crosswalk from the mapping tables
    ReferenceTable {
        /// ZIP-to-FIPS allocation CSV (zip_code, county_fips, ratios)
        #[arg(long)]
        zip_to_fips: PathBuf,

        /// FIPS-to-county geocodes CSV (county_fips, county_name)
        #[arg(long)]
        fips_to_county: PathBuf,

        /// Output CSV path (default: configured reference table)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build the county-grain allocated count table from the ZIP table
    CountyTable {
        /// ZIP count table (default: <data_build_dir>/zip_table_num_dc.csv)
        #[arg(long)]
        zip_table: Option<PathBuf>,

        /// ZIP-to-county crosswalk CSV (default: configured reference table)
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Output CSV path (default:
        /// <data_build_dir>/county_from_zip_table_num_dc.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn split_states(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(&cli.config);
    let storage = LocalStorage::new(".");

    match cli.command {
        Command::Drive { states, resume } => {
            config.validate()?;
            let list = match states {
                Some(arg) => {
                    let list = split_states(&arg);
                    if list.is_empty() {
                        return Err(AppError::validation("--states was given but empty"));
                    }
                    list
                }
                None => config.driver.states.clone(),
            };

            log::info!("Driving collection for {} states", list.len());
            let collector = CollectorPipeline::new(&config, &storage);
            let summary = run_driver(&config, &collector, &list, resume).await?;
            log::info!("Collected {} states", summary.completed.len());
        }

        Command::Scrape {
            states,
            output,
            resume,
            base_url,
        } => {
            let mut config = config;
            if let Some(url) = base_url {
                config.scraper.base_url = url;
            }
            config.validate()?;

            let options = CollectOptions {
                states: split_states(&states),
                output,
                resume,
            };
            let stats = run_collect(&config, &storage, &options).await?;
            log::info!(
                "Scrape complete: {} datacenters from {} markets \
                 ({} resumed, {} market failures, {} state failures)",
                stats.datacenter_count,
                stats.market_count,
                stats.markets_resumed,
                stats.market_failures,
                stats.state_failures
            );
        }

        Command::ZipTable { data_dir, output } => {
            let data_dir =
                data_dir.unwrap_or_else(|| PathBuf::from(&config.paths.processed_data_dir));
            let output = output.unwrap_or_else(|| {
                PathBuf::from(&config.paths.data_build_dir).join("zip_table_num_dc.csv")
            });
            let zips = build_zip_table(&storage, &data_dir, &output).await?;
            log::info!("Saved {} zip rows to {}", zips, output.display());
        }

        Command::ReferenceTable {
            zip_to_fips,
            fips_to_county,
            output,
        } => {
            let output = output.unwrap_or_else(|| PathBuf::from(&config.paths.reference_table));
            let rows =
                build_reference_table(&storage, &zip_to_fips, &fips_to_county, &output).await?;
            log::info!("Saved {} reference rows to {}", rows, output.display());
        }

        Command::CountyTable {
            zip_table,
            reference,
            output,
        } => {
            let zip_table = zip_table.unwrap_or_else(|| {
                PathBuf::from(&config.paths.data_build_dir).join("zip_table_num_dc.csv")
            });
            let reference =
                reference.unwrap_or_else(|| PathBuf::from(&config.paths.reference_table));
            let output = output.unwrap_or_else(|| {
                PathBuf::from(&config.paths.data_build_dir)
                    .join("county_from_zip_table_num_dc.csv")
            });
            let counties = build_county_table(&storage, &zip_table, &reference, &output).await?;
            log::info!("Saved {} county rows to {}", counties, output.display());
        }

        Command::Validate => {
            config.validate()?;
            log::info!(
                "Config OK: {} states, cooldown {}s, inter-state delay {}s",
                config.driver.states.len(),
                config.driver.cooldown_secs,
                config.driver.inter_state_delay_secs
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_rate_limited() => {
            log::error!("{e}");
            log::error!("Persistent rate limiting; re-run with --resume once the limit lifts.");
            ExitCode::from(EXIT_RATE_LIMITED)
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
