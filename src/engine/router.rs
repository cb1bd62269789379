// src/engine/router.rs

use crate::job::execution::{effective_status, BatchStatus, JobExecution};

/// Where an observed execution goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePath {
    /// Feed the retry scheduler.
    Failed,
    /// Finalize: archive the source file, report with the record count.
    Completed,
    /// Report status only.
    InProgress,
}

/// Classify an execution by its step-derived status.
///
/// Pure and side-effect free; evaluated once per observed execution. The
/// effectful halves (retry timers, file moves, messages) live in the runtime
/// and the report sink.
pub fn route(execution: &JobExecution) -> RoutePath {
    match effective_status(execution) {
        BatchStatus::Failed => RoutePath::Failed,
        BatchStatus::Completed => RoutePath::Completed,
        BatchStatus::Starting | BatchStatus::Started => RoutePath::InProgress,
    }
}
