// src/storage/mod.rs

//! Filesystem persistence for collection outputs and checkpoints.

pub mod local;

pub use local::{DATACENTER_FILE_PREFIX, LocalStorage};
