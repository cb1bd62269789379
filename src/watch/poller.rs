// src/watch/poller.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::runtime::PipelineEvent;
use crate::watch::filter::LastModifiedFilter;

/// A file the watcher accepted: its path plus the modification time the
/// dedup filter recorded for it.
#[derive(Debug, Clone)]
pub struct DetectedFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Settings the poller needs, resolved from `[watch]` config.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub input_dir: PathBuf,
    pub pattern: GlobMatcher,
    pub poll_interval: Duration,
}

impl PollerConfig {
    pub fn new(input_dir: PathBuf, pattern: &str, poll_interval: Duration) -> Result<Self> {
        let pattern = Glob::new(pattern)
            .with_context(|| format!("compiling file pattern '{pattern}'"))?
            .compile_matcher();
        Ok(Self {
            input_dir,
            pattern,
            poll_interval,
        })
    }
}

/// Spawn the polling loop.
///
/// Every tick lists the input directory and forwards accepted files as
/// [`PipelineEvent::FileDetected`]. Scan failures are logged and the tick
/// skipped; the loop only ends when the runtime side of the channel is gone.
pub fn spawn_poller(
    config: PollerConfig,
    filter: Arc<LastModifiedFilter>,
    events_tx: mpsc::Sender<PipelineEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(dir = ?config.input_dir, interval = ?config.poll_interval, "file poller started");

        let mut ticker = tokio::time::interval(config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match scan_once(&config, &filter, &events_tx).await {
                Ok(accepted) => {
                    if accepted > 0 {
                        debug!(accepted, "scan accepted files");
                    }
                }
                Err(ScanError::ChannelClosed) => {
                    debug!("runtime channel closed; poller exiting");
                    return;
                }
                Err(ScanError::Io(err)) => {
                    error!(error = %err, "directory scan failed; will retry next tick");
                }
            }
        }
    })
}

/// Why a scan stopped early.
#[derive(Debug)]
pub enum ScanError {
    /// The runtime went away; there is nobody left to notify.
    ChannelClosed,
    Io(anyhow::Error),
}

/// Perform one scan of the input directory.
///
/// Creates the directory if it is missing (idempotent), lists it in whatever
/// order the filesystem returns, keeps regular files whose *names* match the
/// pattern, and runs survivors through the dedup filter. Returns how many
/// files were accepted and emitted.
pub async fn scan_once(
    config: &PollerConfig,
    filter: &LastModifiedFilter,
    events_tx: &mpsc::Sender<PipelineEvent>,
) -> Result<usize, ScanError> {
    fs::create_dir_all(&config.input_dir)
        .with_context(|| format!("creating input directory at {:?}", config.input_dir))
        .map_err(ScanError::Io)?;

    let entries = fs::read_dir(&config.input_dir)
        .with_context(|| format!("listing input directory at {:?}", config.input_dir))
        .map_err(ScanError::Io)?;

    let mut accepted = 0usize;

    for entry_res in entries {
        let entry = match entry_res {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };

        let name = entry.file_name();
        let name = name.to_string_lossy();

        if !config.pattern.is_match(Path::new(name.as_ref())) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(err) => {
                warn!(file = %name, error = %err, "skipping file without readable metadata");
                continue;
            }
        };

        let modified = match metadata.modified() {
            Ok(t) => t,
            Err(err) => {
                warn!(file = %name, error = %err, "skipping file without modification time");
                continue;
            }
        };

        if !filter.accept(&name, modified) {
            continue;
        }

        let detected = DetectedFile {
            path: entry.path(),
            modified,
        };
        info!(file = %name, "new file detected");

        if events_tx
            .send(PipelineEvent::FileDetected(detected))
            .await
            .is_err()
        {
            return Err(ScanError::ChannelClosed);
        }
        accepted += 1;
    }

    Ok(accepted)
}
