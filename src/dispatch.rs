// src/dispatch.rs

//! Dispatcher worker.
//!
//! Consumes [`JobRequest`]s from the runtime and executes each one through
//! the launcher on the blocking pool, so a slow or stuck job never delays
//! file detection or event delivery. Finished executions flow back into the
//! runtime as [`PipelineEvent::ExecutionFinished`].

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::engine::runtime::PipelineEvent;
use crate::job::execution::{BatchStatus, JobExecution};
use crate::job::launcher::JobLauncher;
use crate::job::registry::JobRegistry;
use crate::job::request::JobRequest;

/// Spawn the background dispatcher loop.
///
/// The returned sender is what the runtime uses as `dispatch_tx`. Each
/// request runs in its own tokio task wrapping a `spawn_blocking` call, so
/// independent requests can execute in parallel. Requests racing in from a
/// fresh detection and from a retry timer are unordered relative to each
/// other; within one producer the channel preserves FIFO order.
pub fn spawn_dispatcher(
    registry: Arc<JobRegistry>,
    launcher: Arc<JobLauncher>,
    events_tx: mpsc::Sender<PipelineEvent>,
    capacity: usize,
) -> mpsc::Sender<JobRequest> {
    let (tx, mut rx) = mpsc::channel::<JobRequest>(capacity);

    tokio::spawn(async move {
        info!("dispatcher loop started");
        while let Some(request) = rx.recv().await {
            let registry = Arc::clone(&registry);
            let launcher = Arc::clone(&launcher);
            let events_tx = events_tx.clone();

            tokio::spawn(async move {
                let job_name = request.job_name.clone();
                let parameters = request.parameters.clone();

                let execution = tokio::task::spawn_blocking(move || {
                    launcher.run_request(&registry, &request)
                })
                .await
                .unwrap_or_else(|join_err| {
                    // The launcher collapses every expected failure itself;
                    // reaching this means the execution task panicked.
                    error!(job = %job_name, error = %join_err, "execution task aborted");
                    JobExecution {
                        id: 0,
                        job_name,
                        parameters,
                        status: BatchStatus::Failed,
                        step_executions: Vec::new(),
                        started_at: Utc::now(),
                        ended_at: Some(Utc::now()),
                        exit_description: Some(format!("execution task aborted: {join_err}")),
                    }
                });

                if let Err(err) = events_tx
                    .send(PipelineEvent::ExecutionFinished(execution))
                    .await
                {
                    error!(error = %err, "failed to deliver finished execution to runtime");
                }
            });
        }
        info!("dispatcher loop finished (channel closed)");
    });

    tx
}
