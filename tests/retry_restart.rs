use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use fileflow::dispatch::spawn_dispatcher;
use fileflow::engine::retry::RetryPolicy;
use fileflow::engine::runtime::{PipelineEvent, Runtime, RuntimeOptions};
use fileflow::job::execution::StepExecution;
use fileflow::job::launcher::JobLauncher;
use fileflow::job::registry::{Job, JobRegistry};
use fileflow::job::request::{JobParameters, RequestBuilder};
use fileflow::report::sink::{ReportSink, StatusObserver};
use fileflow::watch::filter::LastModifiedFilter;
use fileflow::watch::poller::{scan_once, PollerConfig};

struct Capture(Mutex<Vec<String>>);

impl StatusObserver for Capture {
    fn notify(&self, report: &str) {
        self.0.lock().unwrap().push(report.to_string());
    }
}

/// Job that fails its first `failures` runs, then succeeds. Records the
/// parameters of every run so tests can assert retries reuse them verbatim.
struct FlakyJob {
    failures: usize,
    runs: AtomicUsize,
    seen_parameters: Mutex<Vec<JobParameters>>,
}

impl FlakyJob {
    fn new(failures: usize) -> Self {
        Self {
            failures,
            runs: AtomicUsize::new(0),
            seen_parameters: Mutex::new(Vec::new()),
        }
    }
}

impl Job for FlakyJob {
    fn name(&self) -> &str {
        "processingJob"
    }

    fn run(&self, parameters: &JobParameters) -> Vec<StepExecution> {
        self.seen_parameters.lock().unwrap().push(parameters.clone());
        let run = self.runs.fetch_add(1, Ordering::SeqCst);

        if run < self.failures {
            vec![StepExecution::failed("processingStep", "transient failure")]
        } else {
            vec![StepExecution::completed("processingStep")]
        }
    }
}

/// Dummy persistence; the flaky job never writes records.
#[derive(Default)]
struct NullStore;

impl fileflow::job::entry::EntryStore for NullStore {
    fn save(&self, _entry: fileflow::job::entry::Entry) {}
    fn count(&self) -> usize {
        0
    }
}

struct Harness {
    input: std::path::PathBuf,
    processed: std::path::PathBuf,
    job: Arc<FlakyJob>,
    observer: Arc<Capture>,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new(failures: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        let processed = dir.path().join("processed");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("b.txt"), "header\n").unwrap();

        Self {
            input,
            processed,
            job: Arc::new(FlakyJob::new(failures)),
            observer: Arc::new(Capture(Mutex::new(Vec::new()))),
            _dir: dir,
        }
    }

    /// Run the pipeline over one scan until it drains.
    async fn run(&self, policy: RetryPolicy) {
        let mut registry = JobRegistry::new();
        registry.register(self.job.clone());
        let registry = Arc::new(registry);

        let (events_tx, events_rx) = mpsc::channel::<PipelineEvent>(64);
        let dispatch_tx = spawn_dispatcher(
            Arc::clone(&registry),
            Arc::new(JobLauncher::new()),
            events_tx.clone(),
            32,
        );

        let poller_config =
            PollerConfig::new(self.input.clone(), "*.txt", Duration::from_millis(50)).unwrap();
        let filter = Arc::new(LastModifiedFilter::unbounded());
        let accepted = scan_once(&poller_config, &filter, &events_tx).await.unwrap();
        assert_eq!(accepted, 1);
        events_tx
            .send(PipelineEvent::ScanFinished)
            .await
            .expect("runtime channel open");

        let runtime = Runtime::new(
            RequestBuilder::new("processingJob"),
            registry,
            policy,
            ReportSink::new(&self.processed, Arc::new(NullStore), self.observer.clone()),
            RuntimeOptions {
                exit_when_idle: true,
            },
            events_rx,
            events_tx,
            dispatch_tx,
        );

        tokio::time::timeout(Duration::from_secs(10), runtime.run())
            .await
            .expect("pipeline drains")
            .expect("runtime runs cleanly");
    }

    fn reports(&self) -> Vec<String> {
        self.observer.0.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn failed_execution_is_restarted_after_the_delay_and_succeeds() {
    let harness = Harness::new(1);
    let delay = Duration::from_millis(150);

    let started = Instant::now();
    harness
        .run(RetryPolicy {
            delay,
            max_attempts: None,
        })
        .await;

    // One failed run plus one successful restart.
    assert_eq!(harness.job.runs.load(Ordering::SeqCst), 2);
    assert!(
        started.elapsed() >= delay,
        "restart happened before the configured delay elapsed"
    );

    // The restart reused the original parameters verbatim.
    let seen = harness.job.seen_parameters.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
    drop(seen);

    // Failure reported first, completion reported last; the file was
    // finalized exactly once.
    let reports = harness.reports();
    assert!(reports[0].starts_with("processingJob has started at "));
    assert!(
        reports
            .last()
            .unwrap()
            .starts_with("processingJob has completed with a status of COMPLETED at ")
    );
    assert!(harness.processed.join("b.txt").exists());
    assert!(!harness.input.join("b.txt").exists());
}

#[tokio::test]
async fn bounded_retry_policy_gives_up_after_max_attempts() {
    let harness = Harness::new(usize::MAX); // never succeeds

    harness
        .run(RetryPolicy {
            delay: Duration::from_millis(10),
            max_attempts: Some(2),
        })
        .await;

    // Initial run plus two retries, then the runtime drains.
    assert_eq!(harness.job.runs.load(Ordering::SeqCst), 3);

    let reports = harness.reports();
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.contains("has started at")));

    // Nothing was finalized.
    assert!(harness.input.join("b.txt").exists());
    assert!(!harness.processed.join("b.txt").exists());
}
