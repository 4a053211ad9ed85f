use std::num::NonZeroU32;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{self, Config, ConfigError, LoadedConfig};
use crate::pipeline::{BitDepth, ExtractionSettings, NamingScheme};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliOptions {
    /// Optional path to config file (YAML)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags that take precedence over the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Path to the ffmpeg executable
    #[arg(long, global = true)]
    pub ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe executable
    #[arg(long, global = true)]
    pub ffprobe: Option<PathBuf>,

    /// Transcoder timeout per channel, in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Keep the debug metadata directory after the run
    #[arg(long, global = true)]
    pub keep_debug: bool,

    /// Use the source bit depth when --bit-depth is not given
    #[arg(long, global = true)]
    pub inherit_bit_depth: bool,

    /// Also write OriginatorReference to the output bext chunk
    #[arg(long, global = true)]
    pub forward_originator_reference: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(path) = &self.ffmpeg {
            cfg.tools.ffmpeg_path = Some(path.clone());
        }
        if let Some(path) = &self.ffprobe {
            cfg.tools.ffprobe_path = Some(path.clone());
        }
        if let Some(secs) = self.timeout_secs {
            cfg.transcoder_timeout_secs = secs;
        }
        if self.keep_debug {
            cfg.keep_debug_artifacts = true;
        }
        if self.inherit_bit_depth {
            cfg.inherit_source_bit_depth = true;
        }
        if self.forward_originator_reference {
            cfg.forward_originator_reference = true;
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Split every audio file in a directory into mono files
    SplitDir(SplitDirArgs),
    /// Split one audio file, optionally only some channels
    SplitFile(SplitFileArgs),
    /// Print the BEXT/iXML metadata of a file
    Inspect(InspectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SplitDirArgs {
    /// Directory containing the source recordings
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory for the mono files
    #[arg(short, long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub extract: ExtractArgs,
}

#[derive(Args, Debug, Clone)]
pub struct SplitFileArgs {
    /// Source recording
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory for the mono files
    #[arg(short, long)]
    pub output: PathBuf,

    /// Channels to extract, 1-based (comma-separated); all when omitted
    #[arg(long, value_delimiter = ',', value_parser = clap::value_parser!(u32).range(1..))]
    pub channels: Option<Vec<u32>>,

    #[command(flatten)]
    pub extract: ExtractArgs,
}

impl SplitFileArgs {
    /// Selected channels as zero-based indexes.
    pub fn channel_indexes(&self) -> Option<Vec<u32>> {
        self.channels
            .as_ref()
            .map(|channels| channels.iter().map(|c| c - 1).collect())
    }
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Output sample rate in Hz (source rate when omitted)
    #[arg(long)]
    pub sample_rate: Option<NonZeroU32>,

    /// Output bit depth: 8, 16, 24 or 32
    #[arg(long, value_parser = parse_bit_depth)]
    pub bit_depth: Option<BitDepth>,

    /// Per-channel labels for output names (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub names: Option<Vec<String>>,
}

impl ExtractArgs {
    pub fn settings(&self) -> ExtractionSettings {
        ExtractionSettings {
            sample_rate: self.sample_rate,
            bit_depth: self.bit_depth,
            naming: NamingScheme::from_labels(self.names.clone()),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// File to read
    #[arg(short, long)]
    pub input: PathBuf,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

fn parse_bit_depth(value: &str) -> Result<BitDepth, String> {
    let bits: u32 = value
        .trim()
        .parse()
        .map_err(|_| format!("not a number: {value}"))?;
    BitDepth::try_from(bits)
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}

impl CliOptions {
    /// Load the config file, apply flag overrides, then validate the result.
    pub fn load_config(&self) -> Result<LoadedConfig, ConfigError> {
        let mut loaded = config::load_config(self.config_path.as_deref())?;
        self.overrides.apply(&mut loaded.config);
        loaded.config.validate()?;
        Ok(loaded)
    }
}
