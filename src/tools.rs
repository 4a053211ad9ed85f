//! External tool discovery and stream probing.
//!
//! The pipeline never reaches for process-wide globals to find `ffmpeg` or
//! `ffprobe`; it asks an injected [`ToolLocator`].

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::ToolsConfig;
use crate::pipeline::cancel::CancelToken;
use crate::process::{self, ProcessError};

/// External executables the pipeline depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Audio transcoder (`ffmpeg`)
    Transcoder,
    /// Stream prober (`ffprobe`)
    Prober,
}

impl Tool {
    pub const fn base_name(self) -> &'static str {
        match self {
            Tool::Transcoder => "ffmpeg",
            Tool::Prober => "ffprobe",
        }
    }

    pub fn executable_name(self) -> String {
        if cfg!(windows) {
            format!("{}.exe", self.base_name())
        } else {
            self.base_name().to_string()
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_name())
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{tool} not found (searched: {searched})")]
    NotFound { tool: Tool, searched: String },
    #[error("{tool} failed: {source}")]
    Process {
        tool: Tool,
        #[source]
        source: ProcessError,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: Tool,
        status: String,
        stderr: String,
    },
    #[error("{tool} produced unexpected output: {output:?}")]
    BadOutput { tool: Tool, output: String },
}

/// Resolves tools to executable paths.
pub trait ToolLocator: Send + Sync {
    fn resolve(&self, tool: Tool) -> Result<PathBuf, ToolError>;
}

/// Explicit paths first, then a bundled directory, then `PATH`.
#[derive(Debug, Clone, Default)]
pub struct SystemToolLocator {
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
    bundled_dir: Option<PathBuf>,
}

impl SystemToolLocator {
    pub fn from_config(cfg: &ToolsConfig) -> Self {
        Self {
            ffmpeg: cfg.ffmpeg_path.clone(),
            ffprobe: cfg.ffprobe_path.clone(),
            bundled_dir: cfg.bundled_dir.clone(),
        }
    }

    fn explicit(&self, tool: Tool) -> Option<&Path> {
        match tool {
            Tool::Transcoder => self.ffmpeg.as_deref(),
            Tool::Prober => self.ffprobe.as_deref(),
        }
    }
}

impl ToolLocator for SystemToolLocator {
    fn resolve(&self, tool: Tool) -> Result<PathBuf, ToolError> {
        if let Some(path) = self.explicit(tool) {
            if path.is_file() {
                info!("using {tool} at {}", path.display());
                return Ok(path.to_path_buf());
            }
            return Err(ToolError::NotFound {
                tool,
                searched: path.display().to_string(),
            });
        }

        let name = tool.executable_name();
        let mut searched = Vec::new();
        if let Some(dir) = &self.bundled_dir {
            let candidate = dir.join(&name);
            if candidate.is_file() {
                info!("using bundled {tool} at {}", candidate.display());
                return Ok(candidate);
            }
            debug!("{tool} not in bundled dir {}", dir.display());
            searched.push(dir.display().to_string());
        }

        if let Some(path_var) = env::var_os("PATH") {
            for dir in env::split_paths(&path_var) {
                let candidate = dir.join(&name);
                if candidate.is_file() {
                    info!("using {tool} from PATH at {}", candidate.display());
                    return Ok(candidate);
                }
            }
            searched.push("PATH".to_string());
        }

        Err(ToolError::NotFound {
            tool,
            searched: searched.join(", "),
        })
    }
}

/// Fixed paths supplied by an embedding application.
#[derive(Debug, Clone)]
pub struct FixedToolLocator {
    pub transcoder: PathBuf,
    pub prober: PathBuf,
}

impl ToolLocator for FixedToolLocator {
    fn resolve(&self, tool: Tool) -> Result<PathBuf, ToolError> {
        let path = match tool {
            Tool::Transcoder => &self.transcoder,
            Tool::Prober => &self.prober,
        };
        if path.is_file() {
            Ok(path.clone())
        } else {
            Err(ToolError::NotFound {
                tool,
                searched: path.display().to_string(),
            })
        }
    }
}

/// Asks the prober for facts about the first audio stream of a file.
#[derive(Debug, Clone)]
pub struct StreamProber {
    program: PathBuf,
    timeout: Duration,
}

impl StreamProber {
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }

    pub fn channel_count(&self, path: &Path, cancel: &CancelToken) -> Result<u32, ToolError> {
        self.stream_entry(path, "channels", cancel)
    }

    pub fn bits_per_sample(&self, path: &Path, cancel: &CancelToken) -> Result<u32, ToolError> {
        self.stream_entry(path, "bits_per_sample", cancel)
    }

    pub fn probe_args(path: &Path, entry: &str) -> Vec<String> {
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "a:0".to_string(),
            "-show_entries".to_string(),
            format!("stream={entry}"),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.to_string_lossy().into_owned(),
        ]
    }

    fn stream_entry(&self, path: &Path, entry: &str, cancel: &CancelToken) -> Result<u32, ToolError> {
        let args = Self::probe_args(path, entry);
        let output = process::run(&self.program, &args, self.timeout, cancel).map_err(|source| {
            ToolError::Process {
                tool: Tool::Prober,
                source,
            }
        })?;
        if !output.success() {
            return Err(ToolError::Failed {
                tool: Tool::Prober,
                status: output.status.to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        let value = parse_probe_value(&output.stdout).ok_or_else(|| ToolError::BadOutput {
            tool: Tool::Prober,
            output: output.stdout.clone(),
        })?;
        debug!("probe {entry}={value} path={}", path.display());
        Ok(value)
    }
}

/// First non-empty line of prober output as an unsigned integer.
fn parse_probe_value(stdout: &str) -> Option<u32> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse().ok())
}
