// src/errors.rs

//! Crate-wide error aliases.
//!
//! Most of the crate propagates `anyhow` errors; the structured failure kinds
//! live next to the code that produces them (`job::launcher::LaunchError`,
//! `job::registry::NoSuchJob`).

pub use anyhow::{Error, Result};
