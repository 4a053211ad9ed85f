//! # Config Module
//!
//! YAML configuration. The embedded `config/default.yml` supplies every key;
//! a user file only needs the keys it changes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::constants::{
    DEFAULT_BIT_DEPTH, DEFAULT_DEBUG_DIR_NAME, DEFAULT_METADATA_HEADER_PADDING,
    DEFAULT_PROBE_TIMEOUT_SECS, DEFAULT_TRANSCODER_TIMEOUT_SECS,
};
use crate::metadata::reader::MetadataConfig;

const DEFAULT_CONFIG_YAML: &str = include_str!("../config/default.yml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where to find the transcoder and prober.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// Directory searched before `PATH`, e.g. tools shipped next to the binary
    pub bundled_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub run_id: String,
    pub tools: ToolsConfig,
    pub transcoder_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub default_bit_depth: u32,
    pub inherit_source_bit_depth: bool,
    pub metadata_header_padding: u32,
    pub forward_originator_reference: bool,
    pub extensions: Vec<String>,
    pub debug_dir_name: String,
    pub keep_debug_artifacts: bool,
    pub metadata: MetadataConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run_id: String::new(),
            tools: ToolsConfig::default(),
            transcoder_timeout_secs: DEFAULT_TRANSCODER_TIMEOUT_SECS,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            default_bit_depth: DEFAULT_BIT_DEPTH,
            inherit_source_bit_depth: false,
            metadata_header_padding: DEFAULT_METADATA_HEADER_PADDING,
            forward_originator_reference: false,
            extensions: vec!["wav".to_string(), "bwf".to_string(), "rf64".to_string()],
            debug_dir_name: DEFAULT_DEBUG_DIR_NAME.to_string(),
            keep_debug_artifacts: false,
            metadata: MetadataConfig::default(),
        }
    }
}

impl Config {
    pub fn transcoder_timeout(&self) -> Duration {
        Duration::from_secs(self.transcoder_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Case-insensitive extension match against `extensions`.
    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.default_bit_depth, 8 | 16 | 24 | 32) {
            return Err(ConfigError::Invalid(format!(
                "default_bit_depth must be 8, 16, 24 or 32 (got {})",
                self.default_bit_depth
            )));
        }
        if self.transcoder_timeout_secs == 0 || self.probe_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".to_string()));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::Invalid("extensions must not be empty".to_string()));
        }
        if self.debug_dir_name.trim().is_empty()
            || self.debug_dir_name.contains(['/', '\\'])
        {
            return Err(ConfigError::Invalid(
                "debug_dir_name must be a single path component".to_string(),
            ));
        }
        Ok(())
    }
}

/// A parsed config plus the SHA-256 of the YAML it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub config_hash: String,
}

pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let contents = match path {
        Some(path) => fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?,
        None => DEFAULT_CONFIG_YAML.to_string(),
    };
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<LoadedConfig, ConfigError> {
    let mut config: Config = serde_yaml::from_str(contents)?;
    if config.run_id.trim().is_empty() {
        config.run_id = default_run_id();
    }
    config.validate()?;
    let config_hash = hex::encode(Sha256::digest(contents.as_bytes()));
    Ok(LoadedConfig {
        config,
        config_hash,
    })
}

pub fn default_run_id() -> String {
    Utc::now().format("%Y%m%dT%H%M%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn embedded_defaults_load() {
        let loaded = load_config(None).expect("config");
        let cfg = loaded.config;
        assert_eq!(cfg.default_bit_depth, 24);
        assert_eq!(cfg.debug_dir_name, "debug_metadata");
        assert!(!cfg.forward_originator_reference);
        assert!(!cfg.run_id.is_empty());
        assert_eq!(loaded.config_hash.len(), 64);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("wavsplit.yml");
        std::fs::write(&path, "run_id: batch_01\nkeep_debug_artifacts: true\n").expect("write");
        let cfg = load_config(Some(&path)).expect("config").config;
        assert_eq!(cfg.run_id, "batch_01");
        assert!(cfg.keep_debug_artifacts);
        assert_eq!(cfg.transcoder_timeout_secs, 600);
        assert_eq!(cfg.metadata.max_chunk_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn rejects_bad_bit_depth() {
        let err = parse_config("default_bit_depth: 20\n").expect_err("invalid");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().expect("tempdir");
        let err = load_config(Some(&dir.path().join("nope.yml"))).expect_err("missing");
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let cfg = Config::default();
        assert!(cfg.matches_extension(Path::new("a/B.WAV")));
        assert!(cfg.matches_extension(Path::new("take.bwf")));
        assert!(!cfg.matches_extension(Path::new("notes.txt")));
        assert!(!cfg.matches_extension(Path::new("noext")));
    }
}
