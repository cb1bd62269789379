// src/job/execution.rs

use std::fmt;

use chrono::{DateTime, Utc};

use crate::job::request::JobParameters;

/// Status of a job execution or of a single step within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Starting,
    Started,
    Completed,
    Failed,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchStatus::Starting => "STARTING",
            BatchStatus::Started => "STARTED",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Outcome of one step of a job execution.
#[derive(Debug, Clone, PartialEq)]
pub struct StepExecution {
    pub step_name: String,
    pub status: BatchStatus,
    /// Diagnostic attached when the step failed.
    pub exit_description: Option<String>,
}

impl StepExecution {
    pub fn completed(step_name: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            status: BatchStatus::Completed,
            exit_description: None,
        }
    }

    pub fn failed(step_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            status: BatchStatus::Failed,
            exit_description: Some(description.into()),
        }
    }
}

/// Record of one attempt to run a job.
///
/// Created by the launcher, mutated only while the job runs, and read-only
/// for the router, the retry scheduler and the report sink once its status
/// reaches `Completed` or `Failed`.
#[derive(Debug, Clone)]
pub struct JobExecution {
    pub id: u64,
    pub job_name: String,
    pub parameters: JobParameters,
    /// Raw status as set by the launcher. Routing and reporting use
    /// [`effective_status`] instead.
    pub status: BatchStatus,
    pub step_executions: Vec<StepExecution>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Diagnostic for executions that failed before any step ran
    /// (e.g. invalid parameters, instance already running).
    pub exit_description: Option<String>,
}

/// Derive the status used for routing and reporting from the step outcomes.
///
/// - Any FAILED step makes the whole execution FAILED.
/// - Otherwise, a non-empty step list where every step COMPLETED means the
///   execution COMPLETED.
/// - Otherwise the raw status stands (the execution is still in progress, or
///   it failed before producing any steps).
///
/// This is a pure function over the execution so the raw `status` field and
/// the derived value can never drift apart.
pub fn effective_status(execution: &JobExecution) -> BatchStatus {
    let steps = &execution.step_executions;

    if steps.iter().any(|s| s.status == BatchStatus::Failed) {
        return BatchStatus::Failed;
    }

    if !steps.is_empty() && steps.iter().all(|s| s.status == BatchStatus::Completed) {
        return BatchStatus::Completed;
    }

    execution.status
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn execution_with(status: BatchStatus, steps: Vec<StepExecution>) -> JobExecution {
        JobExecution {
            id: 1,
            job_name: "processingJob".to_string(),
            parameters: BTreeMap::new(),
            status,
            step_executions: steps,
            started_at: Utc::now(),
            ended_at: None,
            exit_description: None,
        }
    }

    #[test]
    fn no_steps_keeps_raw_status() {
        let exec = execution_with(BatchStatus::Started, vec![]);
        assert_eq!(effective_status(&exec), BatchStatus::Started);

        let exec = execution_with(BatchStatus::Failed, vec![]);
        assert_eq!(effective_status(&exec), BatchStatus::Failed);
    }

    #[test]
    fn any_failed_step_wins() {
        let exec = execution_with(
            BatchStatus::Started,
            vec![
                StepExecution::completed("read"),
                StepExecution::failed("write", "disk full"),
                StepExecution::completed("cleanup"),
            ],
        );
        assert_eq!(effective_status(&exec), BatchStatus::Failed);
    }

    #[test]
    fn all_completed_steps_complete_the_execution() {
        // Raw status may still say Started; the steps decide.
        let exec = execution_with(
            BatchStatus::Started,
            vec![StepExecution::completed("processingStep")],
        );
        assert_eq!(effective_status(&exec), BatchStatus::Completed);
    }

    #[test]
    fn in_progress_step_keeps_raw_status() {
        let exec = execution_with(
            BatchStatus::Started,
            vec![
                StepExecution::completed("read"),
                StepExecution {
                    step_name: "write".to_string(),
                    status: BatchStatus::Started,
                    exit_description: None,
                },
            ],
        );
        assert_eq!(effective_status(&exec), BatchStatus::Started);
    }
}
