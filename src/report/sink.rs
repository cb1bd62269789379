// src/report/sink.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::job::entry::EntryStore;
use crate::job::execution::{effective_status, JobExecution};
use crate::job::request::{ParamValue, PARAM_INPUT_FILE};

/// Sink for status report strings.
///
/// In production this is a logging endpoint; tests swap in a capturing
/// observer to assert on the emitted messages.
pub trait StatusObserver: Send + Sync {
    fn notify(&self, report: &str);
}

/// Default observer: status reports go to the log.
pub struct LogObserver;

impl StatusObserver for LogObserver {
    fn notify(&self, report: &str) {
        info!(target: "fileflow::status", "{report}");
    }
}

/// Terminal stage of the pipeline.
///
/// For completed executions it archives the source file into the processed
/// directory and emits the completion report (including the persisted-record
/// count); for everything else it emits a status-only report and touches no
/// files.
pub struct ReportSink {
    processed_dir: PathBuf,
    store: Arc<dyn EntryStore>,
    observer: Arc<dyn StatusObserver>,
}

impl ReportSink {
    pub fn new(
        processed_dir: impl Into<PathBuf>,
        store: Arc<dyn EntryStore>,
        observer: Arc<dyn StatusObserver>,
    ) -> Self {
        Self {
            processed_dir: processed_dir.into(),
            store,
            observer,
        }
    }

    /// Finalize a completed execution: move its source file out of the input
    /// directory (preventing reprocessing), then report completion.
    ///
    /// An existing file with the same name in the processed directory is
    /// overwritten.
    pub fn finalize(&self, execution: &JobExecution) -> Result<()> {
        let source = self.source_path(execution)?;
        let file_name = source
            .file_name()
            .ok_or_else(|| anyhow!("input parameter {:?} has no file name", source))?;

        fs::create_dir_all(&self.processed_dir).with_context(|| {
            format!("creating processed directory at {:?}", self.processed_dir)
        })?;

        let destination = self.processed_dir.join(file_name);
        move_file(&source, &destination)?;
        info!(from = ?source, to = ?destination, "source file archived");

        self.observer.notify(&self.completion_message(execution));
        Ok(())
    }

    /// Report a not-yet-completed (failed or in-progress) execution. No file
    /// movement happens here.
    pub fn report_status(&self, execution: &JobExecution) {
        self.observer.notify(&status_message(execution));
    }

    fn source_path(&self, execution: &JobExecution) -> Result<PathBuf> {
        match execution.parameters.get(PARAM_INPUT_FILE) {
            Some(ParamValue::Text(path)) => Ok(PathBuf::from(path)),
            _ => Err(anyhow!(
                "execution {} of '{}' carries no '{}' parameter",
                execution.id,
                execution.job_name,
                PARAM_INPUT_FILE
            )),
        }
    }

    fn completion_message(&self, execution: &JobExecution) -> String {
        format!(
            "{} has completed with a status of {} at {} with {} processed records.",
            execution.job_name,
            effective_status(execution),
            format_timestamp(Utc::now()),
            self.store.count()
        )
    }
}

/// Message for executions that have not (yet) completed.
fn status_message(execution: &JobExecution) -> String {
    format!(
        "{} has started at {}",
        execution.job_name,
        format_timestamp(Utc::now())
    )
}

fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format("%Y/%m/%d %H:%M:%S%.3f").to_string()
}

/// Rename, falling back to copy+remove for cross-device moves or platforms
/// where rename refuses to overwrite.
fn move_file(source: &Path, destination: &Path) -> Result<()> {
    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }

    debug!(from = ?source, to = ?destination, "rename failed; copying instead");
    fs::copy(source, destination)
        .with_context(|| format!("copying {:?} to {:?}", source, destination))?;
    fs::remove_file(source).with_context(|| format!("removing source file {:?}", source))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::entry::InMemoryEntryStore;
    use crate::job::execution::{BatchStatus, StepExecution};
    use crate::job::request::JobParameters;
    use std::io::Write;
    use std::sync::Mutex;

    /// Observer that keeps every report for assertions.
    pub struct CapturingObserver {
        pub reports: Mutex<Vec<String>>,
    }

    impl CapturingObserver {
        fn new() -> Self {
            Self {
                reports: Mutex::new(Vec::new()),
            }
        }
    }

    impl StatusObserver for CapturingObserver {
        fn notify(&self, report: &str) {
            self.reports.lock().unwrap().push(report.to_string());
        }
    }

    fn execution_for(path: &Path, steps: Vec<StepExecution>) -> JobExecution {
        let mut parameters = JobParameters::new();
        parameters.insert(
            PARAM_INPUT_FILE.to_string(),
            ParamValue::Text(path.to_string_lossy().into_owned()),
        );
        JobExecution {
            id: 1,
            job_name: "processingJob".to_string(),
            parameters,
            status: BatchStatus::Started,
            step_executions: steps,
            started_at: Utc::now(),
            ended_at: Some(Utc::now()),
            exit_description: None,
        }
    }

    #[test]
    fn finalize_moves_file_and_reports_count() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        let processed = dir.path().join("processed");
        fs::create_dir_all(&input).unwrap();

        let source = input.join("a.txt");
        let mut f = fs::File::create(&source).unwrap();
        writeln!(f, "header").unwrap();

        let store = Arc::new(InMemoryEntryStore::default());
        for _ in 0..3 {
            store.save(crate::job::entry::Entry {
                source: "a".into(),
                destination: "b".into(),
                amount: 1.0,
                date: chrono::NaiveDate::from_ymd_opt(2017, 1, 1).unwrap(),
            });
        }

        let observer = Arc::new(CapturingObserver::new());
        let sink = ReportSink::new(&processed, store, observer.clone());

        let execution = execution_for(&source, vec![StepExecution::completed("processingStep")]);
        sink.finalize(&execution).unwrap();

        assert!(!source.exists());
        assert!(processed.join("a.txt").exists());

        let reports = observer.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].starts_with("processingJob has completed with a status of COMPLETED at "));
        assert!(reports[0].ends_with("with 3 processed records."));
    }

    #[test]
    fn finalize_overwrites_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        let processed = dir.path().join("processed");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(&processed).unwrap();

        let source = input.join("a.txt");
        fs::write(&source, "fresh").unwrap();
        fs::write(processed.join("a.txt"), "stale").unwrap();

        let sink = ReportSink::new(
            &processed,
            Arc::new(InMemoryEntryStore::default()),
            Arc::new(CapturingObserver::new()),
        );

        let execution = execution_for(&source, vec![StepExecution::completed("processingStep")]);
        sink.finalize(&execution).unwrap();

        assert_eq!(fs::read_to_string(processed.join("a.txt")).unwrap(), "fresh");
    }

    #[test]
    fn finalize_fails_when_source_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ReportSink::new(
            dir.path().join("processed"),
            Arc::new(InMemoryEntryStore::default()),
            Arc::new(CapturingObserver::new()),
        );

        let execution = execution_for(
            &dir.path().join("input/vanished.txt"),
            vec![StepExecution::completed("processingStep")],
        );
        assert!(sink.finalize(&execution).is_err());
    }

    #[test]
    fn status_report_uses_started_wording() {
        let dir = tempfile::tempdir().unwrap();
        let observer = Arc::new(CapturingObserver::new());
        let sink = ReportSink::new(
            dir.path().join("processed"),
            Arc::new(InMemoryEntryStore::default()),
            observer.clone(),
        );

        let execution = execution_for(&dir.path().join("input/a.txt"), vec![]);
        sink.report_status(&execution);

        let reports = observer.reports.lock().unwrap();
        assert!(reports[0].starts_with("processingJob has started at "));
        assert!(!reports[0].contains("processed records"));
    }
}
