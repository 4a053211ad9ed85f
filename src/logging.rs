use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::LogFormat;

/// Install the global subscriber. With `log_file`, output is appended to that
/// file; if it cannot be opened, logging goes to stderr instead.
pub fn init_logging_with_format(format: LogFormat, log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let Some(path) = log_file else {
        init_stderr(format, filter);
        return;
    };
    match open_log_file(path) {
        Ok(file) => {
            let writer = Mutex::new(file);
            match format {
                LogFormat::Json => {
                    tracing_subscriber::fmt()
                        .with_env_filter(filter)
                        .with_writer(writer)
                        .with_ansi(false)
                        .json()
                        .init();
                }
                LogFormat::Text => {
                    tracing_subscriber::fmt()
                        .with_env_filter(filter)
                        .with_writer(writer)
                        .with_ansi(false)
                        .init();
                }
            }
        }
        Err(err) => {
            init_stderr(format, filter);
            error!("cannot open log file {}: {err}; logging to stderr", path.display());
        }
    }
}

fn init_stderr(format: LogFormat, filter: EnvFilter) {
    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
