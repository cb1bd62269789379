// src/engine/runtime.rs

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::engine::retry::{RetryPolicy, RetryTracker};
use crate::engine::router::{route, RoutePath};
use crate::job::execution::JobExecution;
use crate::job::launcher::instance_key;
use crate::job::registry::JobRegistry;
use crate::job::request::{JobRequest, RequestBuilder};
use crate::report::sink::ReportSink;
use crate::watch::poller::DetectedFile;

/// Events sent into the runtime from the poller, the dispatcher, retry
/// timers, and external signals.
#[derive(Debug)]
pub enum PipelineEvent {
    /// The watcher accepted a file.
    FileDetected(DetectedFile),
    /// The dispatcher finished running a request.
    ExecutionFinished(JobExecution),
    /// A retry delay elapsed; re-submit this request.
    RetryDue(JobRequest),
    /// A single-scan producer has emitted everything it will emit.
    ///
    /// With `exit_when_idle` the runtime refuses to stop before this
    /// arrives, so a scan may keep producing while the loop is already
    /// consuming — the two must run concurrently or a scan bigger than the
    /// event channel wedges on the full channel.
    ScanFinished,
    ShutdownRequested,
}

/// Options that influence how the runtime behaves.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    /// If true, exit once [`PipelineEvent::ScanFinished`] has been observed,
    /// nothing is in flight and no retry is pending. In watch mode this
    /// should be `false`.
    pub exit_when_idle: bool,
}

/// The main orchestration runtime.
///
/// Responsibilities:
/// - Consume `PipelineEvent`s from the poller, dispatcher and retry timers.
/// - Turn accepted files into job requests and hand them to the dispatcher.
/// - Route finished executions: completed → finalize, failed → delayed
///   restart, anything else → status report.
/// - Keep in-flight/pending accounting so `--once` mode knows when to stop.
///
/// The runtime itself never blocks on a job: execution happens behind the
/// dispatcher channel, and retry delays live in spawned timer tasks.
pub struct Runtime {
    builder: RequestBuilder,
    registry: Arc<JobRegistry>,
    policy: RetryPolicy,
    tracker: RetryTracker,
    sink: ReportSink,
    options: RuntimeOptions,

    /// Unified event stream from all producers.
    events_rx: mpsc::Receiver<PipelineEvent>,
    /// Kept so retry timer tasks can feed re-submissions back in.
    events_tx: mpsc::Sender<PipelineEvent>,
    /// Channel to the dispatcher worker.
    dispatch_tx: mpsc::Sender<JobRequest>,

    in_flight: usize,
    pending_retries: usize,
    /// Set once `ScanFinished` arrives; gates the idle exit so the loop
    /// never stops while a scan is still producing.
    scan_finished: bool,
}

impl Runtime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        builder: RequestBuilder,
        registry: Arc<JobRegistry>,
        policy: RetryPolicy,
        sink: ReportSink,
        options: RuntimeOptions,
        events_rx: mpsc::Receiver<PipelineEvent>,
        events_tx: mpsc::Sender<PipelineEvent>,
        dispatch_tx: mpsc::Sender<JobRequest>,
    ) -> Self {
        Self {
            builder,
            registry,
            policy,
            tracker: RetryTracker::new(),
            sink,
            options,
            events_rx,
            events_tx,
            dispatch_tx,
            in_flight: 0,
            pending_retries: 0,
            scan_finished: false,
        }
    }

    /// Main event loop. Returns when shutdown is requested or, with
    /// `exit_when_idle`, once the pipeline has drained.
    pub async fn run(mut self) -> Result<()> {
        info!("fileflow runtime started");

        while let Some(event) = self.events_rx.recv().await {
            debug!(?event, "runtime received event");

            let keep_running = match event {
                PipelineEvent::FileDetected(file) => self.handle_file_detected(file).await?,
                PipelineEvent::ExecutionFinished(execution) => {
                    self.handle_execution_finished(execution).await?
                }
                PipelineEvent::RetryDue(request) => self.handle_retry_due(request).await?,
                PipelineEvent::ScanFinished => {
                    debug!("scan finished; draining remaining work");
                    self.scan_finished = true;
                    self.check_idle()
                }
                PipelineEvent::ShutdownRequested => {
                    info!("shutdown requested, stopping runtime");
                    false
                }
            };

            if !keep_running {
                break;
            }
        }

        info!("fileflow runtime exiting");
        Ok(())
    }

    /// Turn an accepted file into a request and dispatch it.
    ///
    /// A resolution failure (no such job) is reported and the file skipped;
    /// the loop keeps running.
    async fn handle_file_detected(&mut self, file: DetectedFile) -> Result<bool> {
        match self.builder.build(&self.registry, &file) {
            Ok(request) => {
                info!(job = %request.job_name, file = ?file.path, "dispatching job request");
                self.in_flight += 1;
                self.dispatch_tx.send(request).await?;
            }
            Err(err) => {
                error!(file = ?file.path, error = %err, "cannot build job request; skipping file");
            }
        }

        Ok(self.check_idle())
    }

    /// Route a finished execution down one of the three paths.
    async fn handle_execution_finished(&mut self, execution: JobExecution) -> Result<bool> {
        self.in_flight = self.in_flight.saturating_sub(1);

        match route(&execution) {
            RoutePath::Completed => self.handle_completed(&execution),
            RoutePath::Failed => self.handle_failed(&execution),
            RoutePath::InProgress => self.sink.report_status(&execution),
        }

        Ok(self.check_idle())
    }

    fn handle_completed(&mut self, execution: &JobExecution) {
        self.tracker.clear(&execution_instance_key(execution));

        if let Err(err) = self.sink.finalize(execution) {
            // The job itself succeeded; only the archive step misfired. The
            // source file stays in place and is reconsidered once its
            // modification time changes.
            error!(
                job = %execution.job_name,
                execution_id = execution.id,
                error = %err,
                "finalization failed; source file left in input directory"
            );
        }
    }

    /// Failed path: report, then schedule a delayed restart with the
    /// original parameters (the same logical unit of work).
    fn handle_failed(&mut self, execution: &JobExecution) {
        self.sink.report_status(execution);

        let request = restart_request(execution);
        let key = instance_key(&request);

        let Some(attempt) = self.tracker.next_attempt(&key, &self.policy) else {
            return;
        };

        info!(
            job = %request.job_name,
            attempt,
            delay = ?self.policy.delay,
            "scheduling job restart"
        );

        self.pending_retries += 1;

        let events_tx = self.events_tx.clone();
        let delay = self.policy.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = events_tx.send(PipelineEvent::RetryDue(request)).await {
                warn!(error = %err, "runtime gone before retry could be delivered");
            }
        });
    }

    /// A retry delay elapsed: hand the request back to the dispatcher.
    async fn handle_retry_due(&mut self, request: JobRequest) -> Result<bool> {
        self.pending_retries = self.pending_retries.saturating_sub(1);

        info!(job = %request.job_name, "restarting job");
        self.in_flight += 1;
        self.dispatch_tx.send(request).await?;

        Ok(self.check_idle())
    }

    /// Returns whether the loop should keep running.
    fn check_idle(&self) -> bool {
        if self.options.exit_when_idle
            && self.scan_finished
            && self.in_flight == 0
            && self.pending_retries == 0
        {
            info!("pipeline drained and exit_when_idle=true, stopping");
            return false;
        }
        true
    }
}

/// Rebuild a submittable request from a finished execution.
///
/// The parameters are reused verbatim so the restart targets the same job
/// instance; only the submission timestamp is fresh.
fn restart_request(execution: &JobExecution) -> JobRequest {
    JobRequest {
        job_name: execution.job_name.clone(),
        parameters: execution.parameters.clone(),
        submitted_at: Utc::now(),
    }
}

fn execution_instance_key(execution: &JobExecution) -> String {
    instance_key(&restart_request(execution))
}
