//! File-level metadata reading.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::constants::DEFAULT_MAX_CHUNK_BYTES;
use crate::metadata::{FieldMap, MetadataReadout, ParseIssue};
use crate::riff::{self, ScanLimits};

/// Reader settings, taken from the `metadata` section of the config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Largest `bext`/`iXML` payload read into memory, in bytes
    pub max_chunk_bytes: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
        }
    }
}

/// Scan any seekable stream positioned at the start of a RIFF/WAVE container.
pub fn read_metadata<R: Read + Seek>(reader: &mut R, config: &MetadataConfig) -> MetadataReadout {
    riff::scan(
        reader,
        ScanLimits {
            max_chunk_bytes: config.max_chunk_bytes,
        },
    )
}

/// Metadata of one file, read eagerly when the reader is constructed.
///
/// Opening never fails: an unreadable file yields an empty field map and an
/// [`ParseIssue::Io`] entry.
#[derive(Debug, Clone)]
pub struct MetadataReader {
    path: PathBuf,
    readout: MetadataReadout,
}

impl MetadataReader {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::open_with(path, &MetadataConfig::default())
    }

    pub fn open_with(path: impl AsRef<Path>, config: &MetadataConfig) -> Self {
        let path = path.as_ref().to_path_buf();
        let readout = match File::open(&path) {
            Ok(file) => {
                let mut reader = BufReader::new(file);
                read_metadata(&mut reader, config)
            }
            Err(err) => {
                error!("metadata open failed path={} err={err}", path.display());
                MetadataReadout {
                    fields: FieldMap::new(),
                    issues: vec![ParseIssue::Io {
                        message: err.to_string(),
                    }],
                }
            }
        };
        for issue in &readout.issues {
            debug!("metadata issue path={} {issue}", path.display());
        }
        debug!(
            "metadata read path={} fields={}",
            path.display(),
            readout.fields.len()
        );
        Self { path, readout }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fields(&self) -> &FieldMap {
        &self.readout.fields
    }

    pub fn issues(&self) -> &[ParseIssue] {
        &self.readout.issues
    }

    pub fn into_readout(self) -> MetadataReadout {
        self.readout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_empty_map() {
        let dir = tempdir().expect("tempdir");
        let reader = MetadataReader::open(dir.path().join("absent.wav"));
        assert!(reader.fields().is_empty());
        assert!(matches!(reader.issues(), [ParseIssue::Io { .. }]));
    }

    #[test]
    fn non_riff_file_yields_empty_map() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("notes.wav");
        std::fs::write(&path, b"plain text, not audio").expect("write");
        let reader = MetadataReader::open(&path);
        assert!(reader.fields().is_empty());
        assert_eq!(reader.issues(), &[ParseIssue::NotRiffWave]);
    }
}
