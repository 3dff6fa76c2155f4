//! Pipeline entry points for collection operations.
//!
//! - `run_driver`: state-driven collection loop with rate-limit handling
//! - `run_collect`: collect one or more states into a CSV
//! - `build_zip_table`: ZIP-grain facility counts from per-state CSVs
//! - `build_reference_table`: ZIP-to-county crosswalk from the mapping tables
//! - `build_county_table`: county-grain allocated counts via the crosswalk

pub mod collect;
pub mod county_table;
pub mod drive;
pub mod reference_table;
pub mod zip_table;

pub use collect::{CollectOptions, run_collect};
pub use county_table::build_county_table;
pub use drive::{CollectorPipeline, DriveSummary, StateCollector, run_driver};
pub use reference_table::build_reference_table;
pub use zip_table::build_zip_table;
