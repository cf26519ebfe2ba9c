//! File logging. The TUI owns the terminal, so nothing may go to stdout/stderr
//! once it is up.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::Options;

/// Install the global subscriber. Keep the guard alive until exit or buffered
/// lines are lost.
pub fn init(opts: &Options) -> Result<WorkerGuard> {
    let path = log_path(opts.log_file.as_deref());
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("log file path has no file name: {}", path.display()))?;

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(build_filter(opts.debug))
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {e}"))?;

    Ok(guard)
}

/// `NAKO_LOG` wins; otherwise `--debug` picks the level.
fn build_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_env("NAKO_LOG").unwrap_or_else(|_| default_filter(debug))
}

fn default_filter(debug: bool) -> EnvFilter {
    EnvFilter::new(if debug { "nako=debug" } else { "nako=info" })
}

fn log_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => dirs::data_local_dir()
            .map(|d| d.join("nako"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nako.log"),
    }
}
