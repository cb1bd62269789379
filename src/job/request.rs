// src/job/request.rs

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::job::registry::{JobRegistry, NoSuchJob};
use crate::watch::poller::DetectedFile;

/// Parameter key for the path of the file a job execution should read.
pub const PARAM_INPUT_FILE: &str = "input.file.path";

/// Parameter key for the instant the request was submitted.
pub const PARAM_START_DATE: &str = "start.date";

/// A single job parameter value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParamValue {
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Timestamp(t) => {
                f.write_str(&t.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }
}

/// Ordered job parameters. The ordering matters because the serialized form
/// doubles as the job-instance identity (see `JobLauncher`).
pub type JobParameters = BTreeMap<String, ParamValue>;

/// One immutable unit of work: a named job plus its parameters.
///
/// Built once per accepted file and consumed exactly once by the dispatcher;
/// a retry re-submits a request carrying the *same* parameters.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_name: String,
    pub parameters: JobParameters,
    pub submitted_at: DateTime<Utc>,
}

/// Builds a [`JobRequest`] from a detected file.
///
/// The job name is fixed at construction; routing different files to
/// different jobs is out of scope.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    job_name: String,
}

impl RequestBuilder {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Build a request for an accepted file.
    ///
    /// Fails with [`NoSuchJob`] if the configured job name is not registered.
    /// The caller reports that and skips the file; it must never tear down
    /// the poll loop.
    pub fn build(&self, registry: &JobRegistry, file: &DetectedFile) -> Result<JobRequest, NoSuchJob> {
        // Resolve now so a misconfigured job name surfaces per file instead of
        // as a dead execution later.
        registry.get(&self.job_name)?;

        let submitted_at = Utc::now();

        let mut parameters = JobParameters::new();
        parameters.insert(
            PARAM_INPUT_FILE.to_string(),
            ParamValue::Text(file.path.to_string_lossy().into_owned()),
        );
        parameters.insert(
            PARAM_START_DATE.to_string(),
            ParamValue::Timestamp(submitted_at),
        );

        debug!(job = %self.job_name, file = ?file.path, "built job request");

        Ok(JobRequest {
            job_name: self.job_name.clone(),
            parameters,
            submitted_at,
        })
    }
}
