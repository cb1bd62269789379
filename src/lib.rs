// src/lib.rs

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod job;
pub mod logging;
pub mod report;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::retry::RetryPolicy;
use crate::errors::Result;
use crate::engine::runtime::{PipelineEvent, Runtime, RuntimeOptions};
use crate::job::entry::{DelimitedFileJob, InMemoryEntryStore};
use crate::job::launcher::JobLauncher;
use crate::job::registry::JobRegistry;
use crate::job::request::RequestBuilder;
use crate::report::sink::{LogObserver, ReportSink};
use crate::watch::filter::LastModifiedFilter;
use crate::watch::poller::{scan_once, spawn_poller, PollerConfig, ScanError};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - registry / launcher / store
/// - dispatcher worker
/// - the directory poller (or a single scan in `--once` mode)
/// - Ctrl-C handling
/// - the runtime event loop
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    // Persistence + the single registered job.
    let store = Arc::new(InMemoryEntryStore::default());
    let mut registry = JobRegistry::new();
    registry.register(Arc::new(DelimitedFileJob::new(
        cfg.job.name.clone(),
        store.clone(),
        cfg.job.chunk_size,
    )));
    let registry = Arc::new(registry);
    let launcher = Arc::new(JobLauncher::new());

    // Dedup gate in front of the poller.
    let filter = Arc::new(match cfg.watch.dedup_capacity {
        Some(capacity) => LastModifiedFilter::bounded(capacity),
        None => LastModifiedFilter::unbounded(),
    });

    // Runtime event channel.
    let (events_tx, events_rx) = mpsc::channel::<PipelineEvent>(cfg.channels.event_capacity);

    // Dispatcher worker.
    let dispatch_tx = dispatch::spawn_dispatcher(
        Arc::clone(&registry),
        launcher,
        events_tx.clone(),
        cfg.channels.dispatch_capacity,
    );

    let sink = ReportSink::new(
        cfg.finalize.processed_dir.clone(),
        store,
        Arc::new(LogObserver),
    );

    let poller_config = PollerConfig::new(
        cfg.watch.input_dir.clone(),
        &cfg.watch.pattern,
        cfg.watch.poll_interval(),
    )?;

    // Continuous polling, or a single scan in --once mode. The scan runs as
    // its own task so the runtime can drain the event channel while the scan
    // is still producing; a scan bigger than the channel capacity would
    // otherwise block before the loop ever starts.
    let _poller_handle = if args.once {
        let filter = Arc::clone(&filter);
        let events_tx = events_tx.clone();
        let config = poller_config.clone();
        tokio::spawn(async move {
            match scan_once(&config, &filter, &events_tx).await {
                Ok(0) => info!("no new files accepted; nothing to do"),
                Ok(accepted) => info!(accepted, "scan accepted files"),
                Err(ScanError::ChannelClosed) => return,
                Err(ScanError::Io(err)) => error!(error = %err, "initial scan failed"),
            }
            let _ = events_tx.send(PipelineEvent::ScanFinished).await;
        })
    } else {
        spawn_poller(poller_config, Arc::clone(&filter), events_tx.clone())
    };

    // Ctrl-C → graceful shutdown.
    {
        let tx = events_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(PipelineEvent::ShutdownRequested).await;
        });
    }

    let options = RuntimeOptions {
        exit_when_idle: args.once,
    };
    let policy = RetryPolicy {
        delay: cfg.retry.delay(),
        max_attempts: cfg.retry.max_attempts,
    };
    let builder = RequestBuilder::new(cfg.job.name.clone());

    let runtime = Runtime::new(
        builder, registry, policy, sink, options, events_rx, events_tx, dispatch_tx,
    );
    runtime.run().await
}

/// Simple dry-run output: print the resolved pipeline settings.
fn print_dry_run(cfg: &ConfigFile) {
    println!("fileflow dry-run");
    println!("  watch.input_dir = {:?}", cfg.watch.input_dir);
    println!("  watch.pattern = {}", cfg.watch.pattern);
    println!("  watch.poll_interval_ms = {}", cfg.watch.poll_interval_ms);
    match cfg.watch.dedup_capacity {
        Some(capacity) => println!("  watch.dedup_capacity = {capacity}"),
        None => println!("  watch.dedup_capacity = unbounded"),
    }
    println!();
    println!("  job.name = {}", cfg.job.name);
    println!("  job.chunk_size = {}", cfg.job.chunk_size);
    println!();
    println!("  retry.delay_ms = {}", cfg.retry.delay_ms);
    match cfg.retry.max_attempts {
        Some(max) => println!("  retry.max_attempts = {max}"),
        None => println!("  retry.max_attempts = forever"),
    }
    println!();
    println!("  finalize.processed_dir = {:?}", cfg.finalize.processed_dir);
    println!("  channels.event_capacity = {}", cfg.channels.event_capacity);
    println!("  channels.dispatch_capacity = {}", cfg.channels.dispatch_capacity);
}
