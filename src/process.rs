//! Subprocess execution with a wall-clock limit and cancellation.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::PROCESS_POLL_INTERVAL_MS;
use crate::pipeline::cancel::CancelToken;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{program} did not finish within {secs}s and was killed")]
    TimedOut { program: PathBuf, secs: u64 },
    #[error("{program} was cancelled")]
    Cancelled { program: PathBuf },
    #[error("io error waiting for child: {0}")]
    Io(#[from] io::Error),
}

/// Captured result of a finished child process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Render a command line for logs and diagnostics.
pub fn display_command(program: &Path, args: &[String]) -> String {
    let mut parts = vec![quote(&program.to_string_lossy())];
    parts.extend(args.iter().map(|arg| quote(arg)));
    parts.join(" ")
}

fn quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || c == '"' || c == '|') {
        arg.to_string()
    } else {
        format!("\"{}\"", arg.replace('"', "\\\""))
    }
}

/// Run `program` to completion, killing it on timeout or cancellation.
///
/// Stdout and stderr are drained on helper threads so a chatty child cannot
/// block on a full pipe while we poll it.
pub fn run(
    program: &Path,
    args: &[String],
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<ProcessOutput, ProcessError> {
    debug!("spawn {}", display_command(program, args));
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.to_path_buf(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let started = Instant::now();
    let poll = Duration::from_millis(PROCESS_POLL_INTERVAL_MS);
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if cancel.is_cancelled() {
            kill(&mut child);
            return Err(ProcessError::Cancelled {
                program: program.to_path_buf(),
            });
        }
        if started.elapsed() >= timeout {
            kill(&mut child);
            return Err(ProcessError::TimedOut {
                program: program.to_path_buf(),
                secs: timeout.as_secs(),
            });
        }
        thread::sleep(poll);
    };

    Ok(ProcessOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn kill(child: &mut Child) {
    if let Err(err) = child.kill() {
        warn!("kill child pid={} failed: {err}", child.id());
    }
    let _ = child.wait();
}
