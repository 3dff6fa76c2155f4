// src/lib.rs

//! dcmap: US data-center siting data collection pipeline.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
