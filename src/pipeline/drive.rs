// src/pipeline/drive.rs

//! State-driven collection loop.
//!
//! Walks the configured state list in order, collecting each state to its
//! `datacenters_<state>.csv`. A rate-limited state gets one retry after a
//! cooldown; a second rate limit aborts the whole loop so the operator can
//! re-run with resume once the limit lifts.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Config;
use crate::pipeline::collect::{CollectOptions, run_collect};
use crate::storage::LocalStorage;

/// Per-state collection seam.
///
/// `collect` finishes Ok on success and returns `AppError::RateLimited` when
/// the state could not be collected because of rate limiting; any other
/// error is fatal to the loop.
#[async_trait]
pub trait StateCollector: Send + Sync {
    async fn collect(&self, state: &str, output: &Path, resume: bool) -> Result<()>;
}

/// The real collector: runs the in-process collection pipeline.
pub struct CollectorPipeline<'a> {
    config: &'a Config,
    storage: &'a LocalStorage,
}

impl<'a> CollectorPipeline<'a> {
    pub fn new(config: &'a Config, storage: &'a LocalStorage) -> Self {
        Self { config, storage }
    }
}

#[async_trait]
impl StateCollector for CollectorPipeline<'_> {
    async fn collect(&self, state: &str, output: &Path, resume: bool) -> Result<()> {
        let options = CollectOptions {
            states: vec![state.to_string()],
            output: output.to_path_buf(),
            resume,
        };
        run_collect(self.config, self.storage, &options).await?;
        Ok(())
    }
}

/// Summary of a driver run.
#[derive(Debug, Default)]
pub struct DriveSummary {
    /// States collected successfully, in order
    pub completed: Vec<String>,
}

/// Run the state loop over the given list.
///
/// Contract per state: collect once; on rate limit wait
/// `driver.cooldown_secs` and retry exactly once with resume; if the retry
/// is rate limited too, abort the loop and propagate the rate-limit error
/// (exit status 2). Any other error is fatal immediately. Successful states
/// are followed by `driver.inter_state_delay_secs` before the next one.
///
/// `resume` applies to the first attempt of every state, for re-runs after
/// an aborted loop; states without a checkpoint start fresh either way.
pub async fn run_driver(
    config: &Config,
    collector: &dyn StateCollector,
    states: &[String],
    resume: bool,
) -> Result<DriveSummary> {
    let mut summary = DriveSummary::default();
    let cooldown = Duration::from_secs(config.driver.cooldown_secs);
    let inter_state = Duration::from_secs(config.driver.inter_state_delay_secs);
    let total = states.len();

    for (idx, state) in states.iter().enumerate() {
        let output = config.paths.state_output(state);
        log::info!("[{}/{}] Collecting state: {}", idx + 1, total, state);

        match collector.collect(state, &output, resume).await {
            Ok(()) => {}
            Err(e) if e.is_rate_limited() => {
                log::warn!(
                    "Rate limited on {}. Cooling down {}s before one retry.",
                    state,
                    cooldown.as_secs()
                );
                tokio::time::sleep(cooldown).await;

                match collector.collect(state, &output, true).await {
                    Ok(()) => {}
                    Err(retry_err) if retry_err.is_rate_limited() => {
                        log::error!(
                            "Still rate limited on {} after cooldown. Aborting. \
                             Re-run 'dcmap drive' later; completed markets resume \
                             from the checkpoint.",
                            state
                        );
                        return Err(retry_err);
                    }
                    Err(retry_err) => return Err(retry_err),
                }
            }
            Err(e) => return Err(e),
        }

        log::info!("State {} complete -> {}", state, output.display());
        summary.completed.push(state.clone());

        if idx + 1 < total && !inter_state.is_zero() {
            log::info!("Pausing {}s before next state", inter_state.as_secs());
            tokio::time::sleep(inter_state).await;
        }
    }

    log::info!("Driver finished: {}/{} states collected", summary.completed.len(), total);
    Ok(summary)
}
