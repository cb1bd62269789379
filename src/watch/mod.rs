// src/watch/mod.rs

//! File detection.
//!
//! This module is responsible for:
//! - Polling the input directory on a fixed interval (`poller`).
//! - Filtering candidates by a file-name glob.
//! - Gating re-detection through a last-modified dedup filter (`filter`).
//!
//! It does **not** know about jobs or executions; it only turns arriving
//! files into pipeline events.

pub mod filter;
pub mod poller;

pub use filter::{BoundedSeenStore, InMemorySeenStore, LastModifiedFilter, SeenStore};
pub use poller::{scan_once, spawn_poller, DetectedFile, PollerConfig};
