// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "BOH_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// The TUI owns the terminal, so events go to a file.
    File(PathBuf),
    Stderr,
}

/// `BOH_LOG` wins over the configured level.
pub fn filter_directives(configured: &str) -> String {
    match std::env::var(LOG_ENV) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => configured.to_owned(),
    }
}

pub fn init(level: &str, target: &LogTarget) -> Result<()> {
    let directives = filter_directives(level);
    let filter = EnvFilter::try_new(&directives)
        .map_err(|error| anyhow!("invalid log filter {directives:?}: {error}"))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match target {
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogTarget::File(path) => {
            let file = open_log_file(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
    };
    installed.map_err(|error| anyhow!("install log subscriber: {error}"))
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| {
            format!(
                "open log file {} -- set [log].file to a writable path",
                path.display()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::{LOG_ENV, filter_directives, open_log_file};
    use anyhow::Result;

    #[test]
    fn env_overrides_configured_level() {
        // SAFETY: only this test touches BOH_LOG.
        unsafe {
            std::env::set_var(LOG_ENV, "boh_tui=trace");
        }
        assert_eq!(filter_directives("info"), "boh_tui=trace");
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::set_var(LOG_ENV, "  ");
        }
        assert_eq!(filter_directives("warn"), "warn");
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var(LOG_ENV);
        }
    }

    #[test]
    fn log_file_parent_is_created() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("boh.log");
        open_log_file(&path)?;
        assert!(path.exists());
        Ok(())
    }
}
