//! Per-channel extraction jobs and their outcomes.

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::metadata::ParseIssue;
use crate::pipeline::verify::PreservationVerdict;

/// Output PCM sample format, chosen by bit depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(into = "u32")]
pub enum BitDepth {
    /// Unsigned 8-bit PCM
    U8,
    /// Signed 16-bit little-endian PCM
    S16,
    /// Signed 24-bit little-endian PCM
    #[default]
    S24,
    /// Signed 32-bit little-endian PCM
    S32,
}

impl BitDepth {
    pub const fn bits(self) -> u32 {
        match self {
            BitDepth::U8 => 8,
            BitDepth::S16 => 16,
            BitDepth::S24 => 24,
            BitDepth::S32 => 32,
        }
    }

    /// Transcoder codec name for this depth.
    pub const fn codec(self) -> &'static str {
        match self {
            BitDepth::U8 => "pcm_u8",
            BitDepth::S16 => "pcm_s16le",
            BitDepth::S24 => "pcm_s24le",
            BitDepth::S32 => "pcm_s32le",
        }
    }
}

impl TryFrom<u32> for BitDepth {
    type Error = String;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(BitDepth::U8),
            16 => Ok(BitDepth::S16),
            24 => Ok(BitDepth::S24),
            32 => Ok(BitDepth::S32),
            other => Err(format!("unsupported bit depth: {other} (expected 8, 16, 24 or 32)")),
        }
    }
}

impl From<BitDepth> for u32 {
    fn from(depth: BitDepth) -> Self {
        depth.bits()
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// How output files are named.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NamingScheme {
    /// `<base>_chan<N>.wav`, N 1-based
    #[default]
    Default,
    /// `<base>_<label>.wav` using the label at the channel index; indexes
    /// without a (non-empty) label fall back to the default suffix
    Custom(Vec<String>),
}

impl NamingScheme {
    /// Build from user-supplied labels; `None` selects the default scheme.
    pub fn from_labels(labels: Option<Vec<String>>) -> Self {
        match labels {
            Some(labels) => {
                NamingScheme::Custom(labels.into_iter().map(|l| l.trim().to_string()).collect())
            }
            None => NamingScheme::Default,
        }
    }

    pub fn file_name(&self, base: &str, channel_index: u32) -> String {
        if let NamingScheme::Custom(labels) = self {
            if let Some(label) = labels.get(channel_index as usize) {
                let label = label.trim();
                if !label.is_empty() {
                    return format!("{base}_{}.wav", file_safe(label));
                }
            }
        }
        format!("{base}_chan{}.wav", channel_index + 1)
    }

    pub fn output_path(&self, output_dir: &Path, source: &Path, channel_index: u32) -> PathBuf {
        let base = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        output_dir.join(self.file_name(&base, channel_index))
    }
}

/// Labels end up inside a file name; path separators and control
/// characters become `_` so a label cannot leave the output directory.
fn file_safe(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// User-facing settings shared by every job in a run.
#[derive(Debug, Clone, Default)]
pub struct ExtractionSettings {
    pub sample_rate: Option<NonZeroU32>,
    pub bit_depth: Option<BitDepth>,
    pub naming: NamingScheme,
}

/// One channel of one source file.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionJob {
    pub input: PathBuf,
    /// Zero-based channel index
    pub channel_index: u32,
    pub output: PathBuf,
    pub sample_rate: Option<NonZeroU32>,
    pub bit_depth: Option<BitDepth>,
    /// Channel count reported by the prober, when known
    pub source_channels: Option<u32>,
}

impl ExtractionJob {
    pub fn new(input: impl Into<PathBuf>, channel_index: u32, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            channel_index,
            output: output.into(),
            sample_rate: None,
            bit_depth: None,
            source_channels: None,
        }
    }

    pub fn with_settings(mut self, settings: &ExtractionSettings) -> Self {
        self.sample_rate = settings.sample_rate;
        self.bit_depth = settings.bit_depth;
        self
    }

    pub fn with_source_channels(mut self, channels: Option<u32>) -> Self {
        self.source_channels = channels;
        self
    }

    /// Channel number as shown to users (1-based).
    pub const fn channel_number(&self) -> u32 {
        self.channel_index + 1
    }
}

/// Everything known about a finished job.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job: ExtractionJob,
    pub bit_depth: BitDepth,
    pub command: String,
    pub source_metadata: BTreeMap<String, String>,
    pub output_metadata: BTreeMap<String, String>,
    pub source_issues: Vec<ParseIssue>,
    pub output_issues: Vec<ParseIssue>,
    pub verdict: PreservationVerdict,
}

/// Result of a single channel extraction.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The transcoder succeeded. Metadata may still be imperfectly preserved;
    /// see the report's verdict.
    Success(Box<JobReport>),
    /// The transcoder exited non-zero, timed out, or could not be started.
    TranscoderFailed(String),
    /// The job could not be attempted.
    PreconditionFailed(String),
    Cancelled,
}
