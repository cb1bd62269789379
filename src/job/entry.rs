// src/job/entry.rs

//! The concrete batch job: read a delimited text file, map each row to an
//! [`Entry`], and persist it through the [`EntryStore`] seam.
//!
//! The record mapping carries no architectural weight; what matters here is
//! the step contract: one step, chunked read/process/write, and any error
//! turning into a FAILED step outcome instead of a propagated fault.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use tracing::debug;

use crate::job::execution::StepExecution;
use crate::job::registry::Job;
use crate::job::request::{JobParameters, ParamValue, PARAM_INPUT_FILE};

/// Name of the single step every execution of this job runs.
pub const STEP_NAME: &str = "processingStep";

/// One parsed record: `source,destination,amount,date`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub source: String,
    pub destination: String,
    pub amount: f64,
    pub date: NaiveDate,
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Entry [ source={}, destination={}, amount={}, date={} ]",
            self.source, self.destination, self.amount, self.date
        )
    }
}

/// Persistence collaborator: store records, report how many are stored.
///
/// The pipeline only consumes this contract; the backing store is free to be
/// bounded, remote, or anything else.
pub trait EntryStore: Send + Sync {
    fn save(&self, entry: Entry);
    fn count(&self) -> usize;
}

/// Default in-memory store.
#[derive(Default)]
pub struct InMemoryEntryStore {
    entries: Mutex<Vec<Entry>>,
}

impl EntryStore for InMemoryEntryStore {
    fn save(&self, entry: Entry) {
        self.entries.lock().expect("entry store poisoned").push(entry);
    }

    fn count(&self) -> usize {
        self.entries.lock().expect("entry store poisoned").len()
    }
}

/// Batch job reading the file named by `input.file.path`.
///
/// The first line is a header and is skipped. Rows are parsed and written to
/// the store in chunks of `chunk_size`; the first bad row or I/O error fails
/// the step and stops the execution.
pub struct DelimitedFileJob {
    name: String,
    store: Arc<dyn EntryStore>,
    chunk_size: usize,
}

impl DelimitedFileJob {
    pub fn new(name: impl Into<String>, store: Arc<dyn EntryStore>, chunk_size: usize) -> Self {
        Self {
            name: name.into(),
            store,
            chunk_size: chunk_size.max(1),
        }
    }

    fn process_file(&self, parameters: &JobParameters) -> Result<usize> {
        let path = match parameters.get(PARAM_INPUT_FILE) {
            Some(ParamValue::Text(p)) => p,
            _ => return Err(anyhow!("missing '{PARAM_INPUT_FILE}' parameter")),
        };

        let file =
            File::open(path).with_context(|| format!("opening input file at {path:?}"))?;
        let reader = BufReader::new(file);

        let mut chunk: Vec<Entry> = Vec::with_capacity(self.chunk_size);
        let mut written = 0usize;

        // Line 1 is the header.
        for (idx, line_res) in reader.lines().enumerate().skip(1) {
            let line = line_res.with_context(|| format!("reading line {} of {path:?}", idx + 1))?;
            if line.trim().is_empty() {
                continue;
            }

            let entry = parse_entry(&line)
                .with_context(|| format!("parsing line {} of {path:?}", idx + 1))?;
            chunk.push(entry);

            if chunk.len() == self.chunk_size {
                written += self.write_chunk(&mut chunk);
            }
        }

        written += self.write_chunk(&mut chunk);
        Ok(written)
    }

    fn write_chunk(&self, chunk: &mut Vec<Entry>) -> usize {
        let n = chunk.len();
        for entry in chunk.drain(..) {
            debug!(job = %self.name, %entry, "processing record");
            self.store.save(entry);
        }
        n
    }
}

impl Job for DelimitedFileJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, parameters: &JobParameters) -> Vec<StepExecution> {
        match self.process_file(parameters) {
            Ok(records) => {
                debug!(job = %self.name, records, "step finished");
                vec![StepExecution::completed(STEP_NAME)]
            }
            Err(err) => vec![StepExecution::failed(STEP_NAME, format!("{err:#}"))],
        }
    }
}

/// Parse one `source,destination,amount,date` row.
fn parse_entry(line: &str) -> Result<Entry> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 4 {
        return Err(anyhow!("expected 4 fields, got {}", fields.len()));
    }

    let amount: f64 = fields[2]
        .parse()
        .with_context(|| format!("invalid amount '{}'", fields[2]))?;
    let date = NaiveDate::parse_from_str(fields[3], "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}'", fields[3]))?;

    Ok(Entry {
        source: fields[0].to_string(),
        destination: fields[1].to_string(),
        amount,
        date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::execution::BatchStatus;
    use std::io::Write;

    fn params_for(path: &std::path::Path) -> JobParameters {
        let mut parameters = JobParameters::new();
        parameters.insert(
            PARAM_INPUT_FILE.to_string(),
            ParamValue::Text(path.to_string_lossy().into_owned()),
        );
        parameters
    }

    #[test]
    fn parses_a_valid_row() {
        let entry = parse_entry("checking,savings,150.25,2017-03-01").unwrap();
        assert_eq!(entry.source, "checking");
        assert_eq!(entry.destination, "savings");
        assert_eq!(entry.amount, 150.25);
        assert_eq!(entry.date, NaiveDate::from_ymd_opt(2017, 3, 1).unwrap());
    }

    #[test]
    fn rejects_short_and_malformed_rows() {
        assert!(parse_entry("only,three,fields").is_err());
        assert!(parse_entry("a,b,not-a-number,2017-03-01").is_err());
        assert!(parse_entry("a,b,1.0,03/01/2017").is_err());
    }

    #[test]
    fn processes_file_and_skips_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.txt");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "source,destination,amount,date").unwrap();
        writeln!(f, "a,b,10.00,2017-01-01").unwrap();
        writeln!(f, "b,c,20.00,2017-01-02").unwrap();
        writeln!(f, "c,d,30.00,2017-01-03").unwrap();

        let store = Arc::new(InMemoryEntryStore::default());
        let job = DelimitedFileJob::new("processingJob", store.clone(), 2);

        let steps = job.run(&params_for(&path));
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step_name, STEP_NAME);
        assert_eq!(steps[0].status, BatchStatus::Completed);
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn bad_row_fails_the_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.txt");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "source,destination,amount,date").unwrap();
        writeln!(f, "a,b,oops,2017-01-01").unwrap();

        let store = Arc::new(InMemoryEntryStore::default());
        let job = DelimitedFileJob::new("processingJob", store.clone(), 5);

        let steps = job.run(&params_for(&path));
        assert_eq!(steps[0].status, BatchStatus::Failed);
        assert!(steps[0].exit_description.as_deref().unwrap().contains("line 2"));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn missing_file_fails_the_step() {
        let store = Arc::new(InMemoryEntryStore::default());
        let job = DelimitedFileJob::new("processingJob", store, 5);

        let mut parameters = JobParameters::new();
        parameters.insert(
            PARAM_INPUT_FILE.to_string(),
            ParamValue::Text("does/not/exist.txt".to_string()),
        );

        let steps = job.run(&parameters);
        assert_eq!(steps[0].status, BatchStatus::Failed);
    }
}
