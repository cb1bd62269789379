// src/job/mod.rs

//! Batch job model: requests, executions, the job registry and the launcher.
//!
//! - [`request`] holds the parameter map and the request builder that turns a
//!   detected file into a unit of work.
//! - [`execution`] holds the execution record and the pure effective-status
//!   derivation over its steps.
//! - [`registry`] resolves job names to executable jobs.
//! - [`launcher`] runs a request to completion, collapsing every dispatch
//!   failure into a FAILED execution instead of a propagated fault.
//! - [`entry`] is the concrete delimited-file job and its persistence seam.

pub mod entry;
pub mod execution;
pub mod launcher;
pub mod registry;
pub mod request;

pub use execution::{effective_status, BatchStatus, JobExecution, StepExecution};
pub use launcher::{JobLauncher, LaunchError};
pub use registry::{Job, JobRegistry, NoSuchJob};
pub use request::{JobParameters, JobRequest, ParamValue, RequestBuilder, PARAM_INPUT_FILE, PARAM_START_DATE};
