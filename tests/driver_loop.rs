//! End-to-end tests of the state loop against real storage: per-state output
//! files, checkpoint persistence on a rate-limit abort, and resuming on the
//! next run.

use std::path::Path;

use async_trait::async_trait;
use tempfile::TempDir;

use dcmap::error::{AppError, Result};
use dcmap::models::{Checkpoint, Config, Datacenter};
use dcmap::pipeline::{StateCollector, run_driver};
use dcmap::storage::LocalStorage;

fn sample_row(state: &str, market: &str) -> Datacenter {
    Datacenter {
        state: state.to_string(),
        market: market.to_string(),
        facility: format!("{market}-1"),
        company: "Example Co".into(),
        street: "1 Main St".into(),
        zip: Some("75201".into()),
        city: Some("Somewhere".into()),
        source_url: format!("https://www.datacentermap.com/usa/{state}/{market}/"),
    }
}

fn test_config(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.driver.cooldown_secs = 0;
    config.driver.inter_state_delay_secs = 0;
    config.paths.processed_data_dir = tmp.path().join("processed").display().to_string();
    config
}

/// Collector that persists rows the way the real pipeline does, but without
/// the network: each state yields two markets; states listed in
/// `rate_limited` complete the first market, then keep hitting the limit on
/// the second until the state is taken off the list.
struct FileWritingCollector {
    storage: LocalStorage,
    rate_limited: Vec<String>,
}

#[async_trait]
impl StateCollector for FileWritingCollector {
    async fn collect(&self, state: &str, output: &Path, resume: bool) -> Result<()> {
        let mut checkpoint = if resume {
            self.storage
                .load_checkpoint(output)
                .await?
                .unwrap_or_default()
        } else {
            Checkpoint::new()
        };

        for market in ["alpha", "beta"] {
            if checkpoint.is_done(state, market) {
                continue;
            }
            if market == "beta" && self.rate_limited.iter().any(|s| s == state) {
                self.storage.save_checkpoint(output, &checkpoint).await?;
                return Err(AppError::rate_limited(state, 3));
            }
            checkpoint.complete_market(state, market, vec![sample_row(state, market)]);
            self.storage.save_checkpoint(output, &checkpoint).await?;
        }

        self.storage
            .write_datacenters_csv(output, &checkpoint.datacenters)
            .await?;
        self.storage.clear_checkpoint(output).await?;
        Ok(())
    }
}

#[tokio::test]
async fn driver_writes_one_csv_per_state() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let storage = LocalStorage::new(tmp.path());
    let collector = FileWritingCollector {
        storage: storage.clone(),
        rate_limited: Vec::new(),
    };

    let states: Vec<String> = ["alabama", "alaska"].iter().map(|s| s.to_string()).collect();
    let summary = run_driver(&config, &collector, &states, false).await.unwrap();
    assert_eq!(summary.completed, states);

    for state in &states {
        let path = config.paths.state_output(state);
        let rows = storage.read_datacenters_csv(&path).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| &r.state == state));
        // No leftover checkpoint after a clean run.
        assert!(storage.load_checkpoint(&path).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn aborted_run_leaves_checkpoint_and_resumes() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let storage = LocalStorage::new(tmp.path());

    let states: Vec<String> = ["nevada", "texas", "utah"].iter().map(|s| s.to_string()).collect();

    // First run: texas stays rate limited through the retry, so the loop
    // aborts before utah.
    let collector = FileWritingCollector {
        storage: storage.clone(),
        rate_limited: vec!["texas".to_string()],
    };
    let err = run_driver(&config, &collector, &states, false).await.unwrap_err();
    assert!(err.is_rate_limited());

    let texas_output = config.paths.state_output("texas");
    let checkpoint = storage.load_checkpoint(&texas_output).await.unwrap().unwrap();
    assert!(checkpoint.is_done("texas", "alpha"));
    assert!(!checkpoint.is_done("texas", "beta"));

    // Nevada finished, utah was never reached.
    assert!(storage
        .read_datacenters_csv(config.paths.state_output("nevada"))
        .await
        .is_ok());
    assert!(storage
        .read_datacenters_csv(config.paths.state_output("utah"))
        .await
        .is_err());

    // Second run with resume: the rate limit has lifted; texas picks up at
    // beta without redoing alpha, and the checkpoint is cleared.
    let collector = FileWritingCollector {
        storage: storage.clone(),
        rate_limited: Vec::new(),
    };
    let summary = run_driver(&config, &collector, &states, true).await.unwrap();
    assert_eq!(summary.completed, states);

    let rows = storage.read_datacenters_csv(&texas_output).await.unwrap();
    let markets: Vec<&str> = rows.iter().map(|r| r.market.as_str()).collect();
    assert_eq!(markets, vec!["alpha", "beta"]);
    assert!(storage.load_checkpoint(&texas_output).await.unwrap().is_none());
}
