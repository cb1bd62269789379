// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [watch]
/// input_dir = "input"
/// pattern = "*.txt"
/// poll_interval_ms = 1000
///
/// [retry]
/// delay_ms = 5000
/// max_attempts = 3
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Input directory polling from `[watch]`.
    #[serde(default)]
    pub watch: WatchSection,

    /// The single registered job from `[job]`.
    #[serde(default)]
    pub job: JobSection,

    /// Failed-execution restart behaviour from `[retry]`.
    #[serde(default)]
    pub retry: RetrySection,

    /// Successful-execution finalization from `[finalize]`.
    #[serde(default)]
    pub finalize: FinalizeSection,

    /// Stage channel capacities from `[channels]`.
    #[serde(default)]
    pub channels: ChannelSection,
}

/// `[watch]` section: where files arrive and how often we look.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Directory to poll for arriving files. Auto-created if missing.
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Glob applied to file names (not paths), e.g. `"*.txt"`.
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Poll cadence in milliseconds. Must be at least 1.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Optional bound on the dedup table (entries).
    ///
    /// If omitted, the table of seen file names grows without bound; if set,
    /// the oldest entry is evicted once the capacity is reached.
    #[serde(default)]
    pub dedup_capacity: Option<usize>,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("input")
}

fn default_pattern() -> String {
    "*.txt".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            pattern: default_pattern(),
            poll_interval_ms: default_poll_interval_ms(),
            dedup_capacity: None,
        }
    }
}

impl WatchSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// `[job]` section.
///
/// Every accepted file is submitted to this one job; routing different files
/// to different jobs is out of scope.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSection {
    /// Name of the job to run for each accepted file.
    #[serde(default = "default_job_name")]
    pub name: String,

    /// Records per write chunk inside the job.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_job_name() -> String {
    "processingJob".to_string()
}

fn default_chunk_size() -> usize {
    5
}

impl Default for JobSection {
    fn default() -> Self {
        Self {
            name: default_job_name(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// Delay before a failed execution is re-submitted, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,

    /// Maximum restarts per job instance.
    ///
    /// If omitted, a failing instance is retried forever (until the process
    /// stops or the instance eventually completes).
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_retry_delay_ms() -> u64 {
    5000
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            delay_ms: default_retry_delay_ms(),
            max_attempts: None,
        }
    }
}

impl RetrySection {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// `[finalize]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct FinalizeSection {
    /// Destination for source files of completed executions. Auto-created;
    /// an existing file with the same name is overwritten.
    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,
}

fn default_processed_dir() -> PathBuf {
    PathBuf::from("processed")
}

impl Default for FinalizeSection {
    fn default() -> Self {
        Self {
            processed_dir: default_processed_dir(),
        }
    }
}

/// `[channels]` section.
///
/// All stage hand-offs are bounded mpsc channels; a full channel blocks the
/// producer rather than dropping or growing.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSection {
    /// Capacity of the runtime event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Capacity of the request channel into the dispatcher.
    #[serde(default = "default_dispatch_capacity")]
    pub dispatch_capacity: usize,
}

fn default_event_capacity() -> usize {
    64
}

fn default_dispatch_capacity() -> usize {
    32
}

impl Default for ChannelSection {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            dispatch_capacity: default_dispatch_capacity(),
        }
    }
}
