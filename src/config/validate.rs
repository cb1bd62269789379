// src/config/validate.rs

use anyhow::{anyhow, Context, Result};
use globset::Glob;

use crate::config::model::ConfigFile;

/// Run basic semantic validation against a loaded configuration.
///
/// This checks:
/// - `[watch].pattern` compiles as a glob
/// - `[watch].poll_interval_ms >= 1`
/// - `[watch].dedup_capacity >= 1` when set
/// - input and processed directories are distinct
/// - channel capacities are `>= 1`
/// - `[job].name` is non-empty and `[job].chunk_size >= 1`
///
/// It does **not** touch the filesystem; directories are created lazily by
/// the poller and the report sink.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    validate_watch(cfg)?;
    validate_job(cfg)?;
    validate_channels(cfg)?;
    Ok(())
}

fn validate_watch(cfg: &ConfigFile) -> Result<()> {
    Glob::new(&cfg.watch.pattern)
        .with_context(|| format!("invalid [watch].pattern '{}'", cfg.watch.pattern))?;

    if cfg.watch.poll_interval_ms == 0 {
        return Err(anyhow!("[watch].poll_interval_ms must be >= 1 (got 0)"));
    }

    if let Some(0) = cfg.watch.dedup_capacity {
        return Err(anyhow!("[watch].dedup_capacity must be >= 1 when set (got 0)"));
    }

    if cfg.watch.input_dir == cfg.finalize.processed_dir {
        return Err(anyhow!(
            "[watch].input_dir and [finalize].processed_dir must differ (both {:?}); \
             finalized files would be re-detected",
            cfg.watch.input_dir
        ));
    }

    Ok(())
}

fn validate_job(cfg: &ConfigFile) -> Result<()> {
    if cfg.job.name.trim().is_empty() {
        return Err(anyhow!("[job].name must not be empty"));
    }

    if cfg.job.chunk_size == 0 {
        return Err(anyhow!("[job].chunk_size must be >= 1 (got 0)"));
    }

    Ok(())
}

fn validate_channels(cfg: &ConfigFile) -> Result<()> {
    if cfg.channels.event_capacity == 0 {
        return Err(anyhow!("[channels].event_capacity must be >= 1 (got 0)"));
    }
    if cfg.channels.dispatch_capacity == 0 {
        return Err(anyhow!("[channels].dispatch_capacity must be >= 1 (got 0)"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ConfigFile {
        toml::from_str("").expect("defaults deserialize")
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let mut cfg = base_config();
        cfg.watch.poll_interval_ms = 0;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_bad_glob() {
        let mut cfg = base_config();
        cfg.watch.pattern = "*.{txt".to_string();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_shared_input_and_processed_dir() {
        let mut cfg = base_config();
        cfg.finalize.processed_dir = cfg.watch.input_dir.clone();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let mut cfg = base_config();
        cfg.job.chunk_size = 0;
        assert!(validate_config(&cfg).is_err());
    }
}
