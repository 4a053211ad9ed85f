//! # Metadata Module
//!
//! Broadcast-wave (`bext`) and iXML metadata extracted from RIFF/WAVE files.
//!
//! Field names come from a closed vocabulary ([`MetadataField`]); a
//! [`FieldMap`] can never hold computed stream properties such as duration or
//! channel count. A field is either absent, present and empty, or present
//! with a value, and the three states are distinguishable through
//! [`FieldMap::get`].

pub mod bext;
pub mod ixml;
pub mod reader;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use reader::{read_metadata, MetadataReader};

/// Which chunk a field is decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    Bext,
    Ixml,
}

/// The fixed metadata vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetadataField {
    Description,
    Originator,
    OriginatorReference,
    OriginationDate,
    OriginationTime,
    TimeReference,
    Version,
    #[serde(rename = "UMID")]
    Umid,
    LoudnessValue,
    LoudnessRange,
    MaxTruePeakLevel,
    MaxMomentaryLoudness,
    MaxShortTermLoudness,
    CodingHistory,
    Note,
    Project,
    Tape,
    Scene,
    Take,
    #[serde(rename = "FileUID")]
    FileUid,
    UserBits,
    CircleTake,
    Category,
    Subcategory,
}

impl MetadataField {
    pub const ALL: [MetadataField; 24] = [
        MetadataField::Description,
        MetadataField::Originator,
        MetadataField::OriginatorReference,
        MetadataField::OriginationDate,
        MetadataField::OriginationTime,
        MetadataField::TimeReference,
        MetadataField::Version,
        MetadataField::Umid,
        MetadataField::LoudnessValue,
        MetadataField::LoudnessRange,
        MetadataField::MaxTruePeakLevel,
        MetadataField::MaxMomentaryLoudness,
        MetadataField::MaxShortTermLoudness,
        MetadataField::CodingHistory,
        MetadataField::Note,
        MetadataField::Project,
        MetadataField::Tape,
        MetadataField::Scene,
        MetadataField::Take,
        MetadataField::FileUid,
        MetadataField::UserBits,
        MetadataField::CircleTake,
        MetadataField::Category,
        MetadataField::Subcategory,
    ];

    /// Canonical field name as it appears in reports.
    pub const fn name(self) -> &'static str {
        match self {
            MetadataField::Description => "Description",
            MetadataField::Originator => "Originator",
            MetadataField::OriginatorReference => "OriginatorReference",
            MetadataField::OriginationDate => "OriginationDate",
            MetadataField::OriginationTime => "OriginationTime",
            MetadataField::TimeReference => "TimeReference",
            MetadataField::Version => "Version",
            MetadataField::Umid => "UMID",
            MetadataField::LoudnessValue => "LoudnessValue",
            MetadataField::LoudnessRange => "LoudnessRange",
            MetadataField::MaxTruePeakLevel => "MaxTruePeakLevel",
            MetadataField::MaxMomentaryLoudness => "MaxMomentaryLoudness",
            MetadataField::MaxShortTermLoudness => "MaxShortTermLoudness",
            MetadataField::CodingHistory => "CodingHistory",
            MetadataField::Note => "Note",
            MetadataField::Project => "Project",
            MetadataField::Tape => "Tape",
            MetadataField::Scene => "Scene",
            MetadataField::Take => "Take",
            MetadataField::FileUid => "FileUID",
            MetadataField::UserBits => "UserBits",
            MetadataField::CircleTake => "CircleTake",
            MetadataField::Category => "Category",
            MetadataField::Subcategory => "Subcategory",
        }
    }

    pub const fn source(self) -> FieldSource {
        match self {
            MetadataField::Description
            | MetadataField::Originator
            | MetadataField::OriginatorReference
            | MetadataField::OriginationDate
            | MetadataField::OriginationTime
            | MetadataField::TimeReference
            | MetadataField::Version
            | MetadataField::Umid
            | MetadataField::LoudnessValue
            | MetadataField::LoudnessRange
            | MetadataField::MaxTruePeakLevel
            | MetadataField::MaxMomentaryLoudness
            | MetadataField::MaxShortTermLoudness
            | MetadataField::CodingHistory => FieldSource::Bext,
            _ => FieldSource::Ixml,
        }
    }

    /// Look a field up by its canonical name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.name() == name)
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metadata extracted from one file, keyed by the fixed vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap {
    values: BTreeMap<MetadataField, String>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: MetadataField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: MetadataField) -> bool {
        self.values.contains_key(&field)
    }

    pub fn insert(&mut self, field: MetadataField, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetadataField, &str)> {
        self.values.iter().map(|(field, value)| (*field, value.as_str()))
    }

    /// Fields decoded from the given chunk type.
    pub fn by_source(&self, source: FieldSource) -> impl Iterator<Item = (MetadataField, &str)> {
        self.iter().filter(move |(field, _)| field.source() == source)
    }

    /// String-keyed view used for diagnostics and preservation checks.
    pub fn to_snapshot(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|(field, value)| (field.name().to_string(), value.to_string()))
            .collect()
    }
}

/// A non-fatal problem encountered while scanning a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseIssue {
    /// The file could not be opened or read at all.
    Io { message: String },
    /// The first 12 bytes are not a `RIFF....WAVE` header.
    NotRiffWave,
    /// A chunk header ended before its 4-byte size field was complete.
    TruncatedHeader { offset: u64 },
    /// A chunk payload ran past the end of the stream.
    TruncatedChunk { id: String, offset: u64, declared: u64, available: u64 },
    /// A metadata chunk exceeded the configured in-memory limit and was skipped.
    OversizedChunk { id: String, declared: u64, limit: u64 },
    /// The `bext` fixed layout ended before the named field.
    BextTruncated { field: MetadataField },
    /// The iXML payload was not well-formed XML.
    InvalidIxml { message: String },
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseIssue::Io { message } => write!(f, "io error: {message}"),
            ParseIssue::NotRiffWave => f.write_str("not a RIFF/WAVE stream"),
            ParseIssue::TruncatedHeader { offset } => {
                write!(f, "chunk header at offset {offset} is truncated")
            }
            ParseIssue::TruncatedChunk {
                id,
                offset,
                declared,
                available,
            } => write!(
                f,
                "chunk '{id}' at offset {offset} declares {declared} bytes, {available} available"
            ),
            ParseIssue::OversizedChunk { id, declared, limit } => {
                write!(f, "chunk '{id}' declares {declared} bytes, limit is {limit}")
            }
            ParseIssue::BextTruncated { field } => {
                write!(f, "bext chunk ended before field {field}")
            }
            ParseIssue::InvalidIxml { message } => write!(f, "invalid iXML: {message}"),
        }
    }
}

/// Result of scanning one stream: the fields found plus any non-fatal issues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataReadout {
    pub fields: FieldMap,
    pub issues: Vec<ParseIssue>,
}

impl MetadataReadout {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}
