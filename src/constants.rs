//! # Constants Module
//!
//! Centralized constants used throughout the wavsplit crate.
//! Fixed binary layouts live here so the parsers and their tests agree.

/// RIFF chunk header length: 4-byte id + 4-byte little-endian size
pub const CHUNK_HEADER_LEN: usize = 8;

/// BEXT Description field width
pub const BEXT_DESCRIPTION_LEN: usize = 256;
/// BEXT Originator field width
pub const BEXT_ORIGINATOR_LEN: usize = 32;
/// BEXT OriginatorReference field width
pub const BEXT_ORIGINATOR_REFERENCE_LEN: usize = 32;
/// BEXT OriginationDate field width (`YYYY-MM-DD`)
pub const BEXT_ORIGINATION_DATE_LEN: usize = 10;
/// BEXT OriginationTime field width (`HH:MM:SS`)
pub const BEXT_ORIGINATION_TIME_LEN: usize = 8;
/// BEXT UMID field width
pub const BEXT_UMID_LEN: usize = 64;
/// BEXT reserved region skipped after the loudness block
pub const BEXT_RESERVED_LEN: usize = 180;
/// Fixed part of the BEXT chunk; CodingHistory follows it
pub const BEXT_FIXED_LEN: usize = 602;

/// Default bit depth when neither an override nor source inheritance applies
pub const DEFAULT_BIT_DEPTH: u32 = 24;

/// Default wall-clock limit for a single transcoder run, in seconds
pub const DEFAULT_TRANSCODER_TIMEOUT_SECS: u64 = 600;

/// Default wall-clock limit for a single probe run, in seconds
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;

/// Default metadata header padding requested from the transcoder, in bytes
pub const DEFAULT_METADATA_HEADER_PADDING: u32 = 4096;

/// Upper bound on a metadata chunk payload read into memory (16 MiB)
pub const DEFAULT_MAX_CHUNK_BYTES: u64 = 16 * 1024 * 1024;

/// Interval between subprocess status polls, in milliseconds
pub const PROCESS_POLL_INTERVAL_MS: u64 = 25;

/// Event channel capacity between a worker thread and its consumer
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default debug artifact directory under the output directory
pub const DEFAULT_DEBUG_DIR_NAME: &str = "debug_metadata";

/// Keys describing stream properties that channel extraction changes by
/// necessity. Compared case-insensitively and never part of a preservation
/// verdict.
pub const TECHNICAL_KEYS: &[&str] = &[
    "duration",
    "format",
    "format_name",
    "channels",
    "channel_count",
    "nchannels",
    "channel_layout",
    "sample_width",
    "sampwidth",
    "bits_per_sample",
    "bit_depth",
    "sample_fmt",
    "frame_rate",
    "framerate",
    "sample_rate",
    "frame_count",
    "nframes",
    "frames",
];
