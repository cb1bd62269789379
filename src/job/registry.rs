// src/job/registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::job::execution::StepExecution;
use crate::job::request::JobParameters;

/// A named, parameterized unit of batch work.
///
/// `run` performs the job's steps in order and returns one [`StepExecution`]
/// per step that was started. Implementations stop at the first failed step;
/// internal errors become a FAILED step outcome, never a panic or a
/// propagated error.
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, parameters: &JobParameters) -> Vec<StepExecution>;
}

/// Lookup failure for a job name.
#[derive(Debug, Clone, Error)]
#[error("no such job registered: '{0}'")]
pub struct NoSuchJob(pub String);

/// In-memory, name-keyed registry of executable jobs.
///
/// Populated once at startup; single-process by design.
#[derive(Default)]
pub struct JobRegistry {
    jobs: HashMap<String, Arc<dyn Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job under its own name, replacing any previous entry.
    pub fn register(&mut self, job: Arc<dyn Job>) {
        self.jobs.insert(job.name().to_string(), job);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Job>, NoSuchJob> {
        self.jobs
            .get(name)
            .cloned()
            .ok_or_else(|| NoSuchJob(name.to_string()))
    }
}
