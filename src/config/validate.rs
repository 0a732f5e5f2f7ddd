// src/config/validate.rs

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SigwatchError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SigwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_coalesce(cfg)?;
    validate_queue_and_workers(cfg)?;
    validate_status(cfg)?;
    validate_source(cfg)?;
    Ok(())
}

fn validate_coalesce(cfg: &RawConfigFile) -> Result<()> {
    let c = &cfg.coalesce;

    if c.poll_ms == 0 {
        return Err(config_error("[coalesce].poll_ms must be >= 1 (got 0)"));
    }
    if c.tick_ms == 0 {
        return Err(config_error("[coalesce].tick_ms must be >= 1 (got 0)"));
    }
    if c.poll_ms > c.dwell_ms {
        return Err(SigwatchError::ConfigError(format!(
            "[coalesce].poll_ms ({}) must not exceed dwell_ms ({})",
            c.poll_ms, c.dwell_ms
        )));
    }
    if c.tick_ms > c.poll_ms {
        return Err(SigwatchError::ConfigError(format!(
            "[coalesce].tick_ms ({}) must not exceed poll_ms ({})",
            c.tick_ms, c.poll_ms
        )));
    }
    if c.inbox_capacity == 0 {
        return Err(config_error("[coalesce].inbox_capacity must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_queue_and_workers(cfg: &RawConfigFile) -> Result<()> {
    if cfg.queue.capacity == 0 {
        return Err(config_error("[queue].capacity must be >= 1 (got 0)"));
    }
    if cfg.workers.count == 0 {
        return Err(config_error("[workers].count must be >= 1 (got 0)"));
    }
    if cfg.workers.scan_timeout_ms == 0 {
        return Err(config_error("[workers].scan_timeout_ms must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_status(cfg: &RawConfigFile) -> Result<()> {
    let s = &cfg.status;
    if !s.enabled {
        return Ok(());
    }
    if s.interval_ms == 0 {
        return Err(config_error("[status].interval_ms must be >= 1 (got 0)"));
    }
    if s.columns < 8 {
        return Err(SigwatchError::ConfigError(format!(
            "[status].columns must be >= 8 (got {})",
            s.columns
        )));
    }
    Ok(())
}

fn validate_source(cfg: &RawConfigFile) -> Result<()> {
    if cfg.source.roots.is_empty() {
        return Err(config_error("[source].roots must list at least one directory"));
    }
    if cfg.source.channel_capacity == 0 {
        return Err(config_error("[source].channel_capacity must be >= 1 (got 0)"));
    }
    for pattern in cfg.source.exclude.iter() {
        Glob::new(pattern).map_err(|e| {
            SigwatchError::ConfigError(format!(
                "[source].exclude has invalid glob '{pattern}': {e}"
            ))
        })?;
    }
    Ok(())
}

fn config_error(msg: &str) -> SigwatchError {
    SigwatchError::ConfigError(msg.to_string())
}
