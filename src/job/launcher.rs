// src/job/launcher.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::job::execution::{BatchStatus, JobExecution};
use crate::job::registry::{Job, JobRegistry, NoSuchJob};
use crate::job::request::{JobRequest, ParamValue, PARAM_INPUT_FILE};

/// Reasons a request is refused before its job gets to run.
///
/// Every variant collapses into a FAILED [`JobExecution`] carrying the
/// message as its diagnostic; none of them unwinds the pipeline.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    NoSuchJob(#[from] NoSuchJob),

    #[error("job '{job}' is already running with identical parameters")]
    AlreadyRunning { job: String },

    #[error("job instance of '{job}' already completed and cannot be restarted")]
    AlreadyComplete { job: String },

    #[error("invalid parameters for job '{job}': {reason}")]
    InvalidParameters { job: String, reason: String },
}

/// State of one job instance (a job name plus one exact parameter set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstanceState {
    Running,
    Completed,
}

/// Runs job requests to completion, one blocking call per request.
///
/// The launcher tracks job instances in memory so that the same logical unit
/// of work is never executed twice concurrently and never re-run after it
/// completed. A failed instance is forgotten, which is exactly what allows
/// the retry loop to restart it with the original parameters.
///
/// `run_request` blocks for the whole execution; callers must keep it off the
/// poll loop (the dispatcher runs it on the blocking pool).
pub struct JobLauncher {
    instances: Mutex<HashMap<String, InstanceState>>,
    next_execution_id: AtomicU64,
}

impl Default for JobLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl JobLauncher {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            next_execution_id: AtomicU64::new(1),
        }
    }

    /// Execute a request and return its execution record.
    ///
    /// Dispatch-level refusals (unknown job, duplicate instance, completed
    /// instance, bad parameters) come back as FAILED executions with the
    /// refusal in `exit_description` and no steps.
    pub fn run_request(&self, registry: &JobRegistry, request: &JobRequest) -> JobExecution {
        let id = self.next_execution_id.fetch_add(1, Ordering::Relaxed);
        let started_at = Utc::now();

        let mut execution = JobExecution {
            id,
            job_name: request.job_name.clone(),
            parameters: request.parameters.clone(),
            status: BatchStatus::Starting,
            step_executions: Vec::new(),
            started_at,
            ended_at: None,
            exit_description: None,
        };

        let key = instance_key(request);

        let job = match self.try_acquire(registry, request, &key) {
            Ok(job) => job,
            Err(err) => {
                warn!(job = %request.job_name, execution_id = id, error = %err, "launch refused");
                execution.status = BatchStatus::Failed;
                execution.exit_description = Some(err.to_string());
                execution.ended_at = Some(Utc::now());
                return execution;
            }
        };

        info!(job = %request.job_name, execution_id = id, "job execution starting");
        execution.status = BatchStatus::Started;

        execution.step_executions = job.run(&request.parameters);

        let failed = execution
            .step_executions
            .iter()
            .any(|s| s.status == BatchStatus::Failed);
        execution.status = if failed {
            BatchStatus::Failed
        } else {
            BatchStatus::Completed
        };
        execution.ended_at = Some(Utc::now());

        self.release(&key, execution.status);

        info!(
            job = %execution.job_name,
            execution_id = execution.id,
            status = %execution.status,
            steps = execution.step_executions.len(),
            "job execution finished"
        );

        execution
    }

    /// Validate the request and claim its instance slot.
    fn try_acquire(
        &self,
        registry: &JobRegistry,
        request: &JobRequest,
        key: &str,
    ) -> Result<Arc<dyn Job>, LaunchError> {
        let job = registry.get(&request.job_name)?;

        match request.parameters.get(PARAM_INPUT_FILE) {
            Some(ParamValue::Text(path)) if !path.is_empty() => {}
            Some(_) => {
                return Err(LaunchError::InvalidParameters {
                    job: request.job_name.clone(),
                    reason: format!("'{PARAM_INPUT_FILE}' must be a text parameter"),
                });
            }
            None => {
                return Err(LaunchError::InvalidParameters {
                    job: request.job_name.clone(),
                    reason: format!("missing '{PARAM_INPUT_FILE}'"),
                });
            }
        }

        let mut instances = self.instances.lock().expect("instance table poisoned");
        match instances.get(key) {
            Some(InstanceState::Running) => Err(LaunchError::AlreadyRunning {
                job: request.job_name.clone(),
            }),
            Some(InstanceState::Completed) => Err(LaunchError::AlreadyComplete {
                job: request.job_name.clone(),
            }),
            None => {
                instances.insert(key.to_string(), InstanceState::Running);
                Ok(job)
            }
        }
    }

    /// Record the terminal state of an instance.
    ///
    /// Completed instances stay in the table so they cannot restart; failed
    /// ones are removed so a retry with the same parameters is admitted.
    fn release(&self, key: &str, status: BatchStatus) {
        let mut instances = self.instances.lock().expect("instance table poisoned");
        match status {
            BatchStatus::Completed => {
                instances.insert(key.to_string(), InstanceState::Completed);
            }
            _ => {
                instances.remove(key);
                debug!(instance = %key, "failed instance released for restart");
            }
        }
    }
}

/// Identity of a job instance: the job name plus every parameter, in the
/// map's stable order.
pub fn instance_key(request: &JobRequest) -> String {
    let mut key = request.job_name.clone();
    for (name, value) in &request.parameters {
        key.push_str("::");
        key.push_str(name);
        key.push('=');
        key.push_str(&value.to_string());
    }
    key
}
