// src/report/mod.rs

//! Outcome reporting and finalization.

pub mod sink;

pub use sink::{LogObserver, ReportSink, StatusObserver};
