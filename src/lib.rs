//! # wavsplit
//!
//! Split multichannel broadcast-wave recordings into mono files while carrying
//! their BEXT and iXML metadata forward.
//!
//! The crate reads `bext`/`iXML` chunks natively and drives an external
//! transcoder (`ffmpeg`) and prober (`ffprobe`) for the audio itself, then
//! re-reads each output to verify which metadata survived.

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod riff;
pub mod tools;
