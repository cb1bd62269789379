// src/engine/mod.rs

//! Orchestration engine for fileflow.
//!
//! This module ties together:
//! - the main runtime event loop that reacts to:
//!   - detected files
//!   - finished job executions
//!   - due retries
//!   - shutdown signals
//! - the pure execution router (completed / failed / in progress)
//! - the retry policy and per-instance attempt tracking

pub mod retry;
pub mod router;
pub mod runtime;

pub use retry::{RetryPolicy, RetryTracker};
pub use router::{route, RoutePath};
pub use runtime::{PipelineEvent, Runtime, RuntimeOptions};
