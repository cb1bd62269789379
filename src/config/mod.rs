// src/config/mod.rs

//! Configuration loading and validation for fileflow.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants like a compilable file pattern (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ChannelSection, ConfigFile, FinalizeSection, JobSection, RetrySection, WatchSection};
pub use validate::validate_config;
