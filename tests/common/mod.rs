//! Shared helpers: synthetic broadcast-wave files and fake transcoder tools.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use wavsplit::config::{self, LoadedConfig};

static SERIAL: Mutex<()> = Mutex::new(());

/// Serialize tests that write and then execute scripts, so no sibling test
/// forks while a script file is still open for writing.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 9);
    out.extend_from_slice(id);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}

pub fn wave(chunks: &[Vec<u8>]) -> Vec<u8> {
    let body_len: usize = chunks.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(body_len + 12);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((body_len + 4) as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    for chunk in chunks {
        out.extend_from_slice(chunk);
    }
    out
}

/// 48 kHz 24-bit PCM `fmt ` chunk.
pub fn fmt_chunk(channels: u16) -> Vec<u8> {
    let sample_rate: u32 = 48_000;
    let bits: u16 = 24;
    let block_align = channels * bits / 8;
    let mut payload = Vec::with_capacity(16);
    payload.extend_from_slice(&1u16.to_le_bytes());
    payload.extend_from_slice(&channels.to_le_bytes());
    payload.extend_from_slice(&sample_rate.to_le_bytes());
    payload.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    payload.extend_from_slice(&block_align.to_le_bytes());
    payload.extend_from_slice(&bits.to_le_bytes());
    chunk(b"fmt ", &payload)
}

pub fn data_chunk(channels: u16, frames: usize) -> Vec<u8> {
    let payload: Vec<u8> = (0..frames * channels as usize * 3)
        .map(|i| (i % 251) as u8)
        .collect();
    chunk(b"data", &payload)
}

#[derive(Debug, Clone)]
pub struct BextFields {
    pub description: String,
    pub originator: String,
    pub originator_reference: String,
    pub origination_date: String,
    pub origination_time: String,
    pub time_reference: u64,
    pub version: u16,
    pub coding_history: String,
}

impl Default for BextFields {
    fn default() -> Self {
        Self {
            description: "Test Mix".to_string(),
            originator: "Recorder".to_string(),
            originator_reference: "REF-0001".to_string(),
            origination_date: "2024-05-01".to_string(),
            origination_time: "12:34:56".to_string(),
            time_reference: 48_000,
            version: 2,
            coding_history: "A=PCM,F=48000,W=24,M=stereo\r\n".to_string(),
        }
    }
}

fn fixed(text: &str, width: usize) -> Vec<u8> {
    let mut out = text.as_bytes().to_vec();
    out.resize(width, 0);
    out
}

pub fn bext_payload(fields: &BextFields) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend(fixed(&fields.description, 256));
    payload.extend(fixed(&fields.originator, 32));
    payload.extend(fixed(&fields.originator_reference, 32));
    payload.extend(fixed(&fields.origination_date, 10));
    payload.extend(fixed(&fields.origination_time, 8));
    payload.extend_from_slice(&fields.time_reference.to_le_bytes());
    payload.extend_from_slice(&fields.version.to_le_bytes());
    payload.extend((0u8..64).collect::<Vec<u8>>());
    for loudness in [0xFF9Cu16, 12, 0xFFFE, 0xFFF0, 0xFFF4] {
        payload.extend_from_slice(&loudness.to_le_bytes());
    }
    payload.extend(std::iter::repeat(0u8).take(180));
    payload.extend_from_slice(fields.coding_history.as_bytes());
    payload
}

pub fn ixml_payload(scene: &str, take: &str, category: Option<&str>) -> Vec<u8> {
    let attrs = category
        .map(|value| {
            format!(
                "<USER><ATTR_LIST><ATTR><NAME>MusicalCategory</NAME><VALUE>{value}</VALUE></ATTR></ATTR_LIST></USER>"
            )
        })
        .unwrap_or_default();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><BWFXML><PROJECT>Feature</PROJECT><SCENE>{scene}</SCENE><TAKE>{take}</TAKE><NOTE>  boom close  </NOTE>{attrs}</BWFXML>"
    )
    .into_bytes()
}

/// A complete recording with fmt, bext, iXML and data chunks.
pub fn recording(channels: u16) -> Vec<u8> {
    wave(&[
        fmt_chunk(channels),
        chunk(b"bext", &bext_payload(&BextFields::default())),
        chunk(b"iXML", &ixml_payload("12", "3", Some("Ambience/Traffic"))),
        data_chunk(channels, 16),
    ])
}

/// A recording with no metadata chunks.
pub fn plain_recording(channels: u16) -> Vec<u8> {
    wave(&[fmt_chunk(channels), data_chunk(channels, 16)])
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).expect("write file");
    path
}

pub fn loaded_config(run_id: &str) -> LoadedConfig {
    let mut loaded = config::load_config(None).expect("config");
    loaded.config.run_id = run_id.to_string();
    loaded
}

/// Behaviour of the fake tools.
#[derive(Debug, Clone, Default)]
pub struct FakeOptions {
    /// Channel count reported by the prober
    pub channels: u32,
    /// Zero-based channel index for which the transcoder exits non-zero
    pub fail_channel: Option<u32>,
    /// Copy this file to the output instead of the input
    pub replacement: Option<PathBuf>,
}

#[cfg(unix)]
pub struct FakeTools {
    pub transcoder: PathBuf,
    pub prober: PathBuf,
    /// One line of arguments per transcoder call
    pub log: PathBuf,
}

#[cfg(unix)]
impl FakeTools {
    pub fn locator(&self) -> wavsplit::tools::FixedToolLocator {
        wavsplit::tools::FixedToolLocator {
            transcoder: self.transcoder.clone(),
            prober: self.prober.clone(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Write `ffmpeg`/`ffprobe` stand-ins into `dir`. The transcoder copies its
/// `-i` input (or the replacement file) to its last argument.
#[cfg(unix)]
pub fn fake_tools(dir: &Path, opts: &FakeOptions) -> FakeTools {
    use std::os::unix::fs::PermissionsExt;

    let log = dir.join("ffmpeg_calls.log");
    let fail = opts
        .fail_channel
        .map(|idx| {
            format!("case \"$*\" in *\"c0=c{idx} \"*) echo \"simulated failure\" >&2; exit 1;; esac\n")
        })
        .unwrap_or_default();
    let source = opts
        .replacement
        .as_ref()
        .map(|path| format!("'{}'", path.display()))
        .unwrap_or_else(|| "\"$in\"".to_string());
    let transcoder_script = format!(
        "#!/bin/sh\n\
         echo \"$*\" >> '{log}'\n\
         in=\"\"\n\
         prev=\"\"\n\
         last=\"\"\n\
         for arg in \"$@\"; do\n\
         if [ \"$prev\" = \"-i\" ]; then in=\"$arg\"; fi\n\
         prev=\"$arg\"\n\
         last=\"$arg\"\n\
         done\n\
         {fail}\
         cp {source} \"$last\"\n",
        log = log.display(),
    );
    let prober_script = format!(
        "#!/bin/sh\n\
         case \"$*\" in *stream=channels*) echo {channels};; *) echo 24;; esac\n",
        channels = opts.channels,
    );

    let transcoder = dir.join("ffmpeg");
    let prober = dir.join("ffprobe");
    for (path, script) in [(&transcoder, transcoder_script), (&prober, prober_script)] {
        fs::write(path, script).expect("write script");
        let mut perms = fs::metadata(path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).expect("chmod");
    }
    FakeTools {
        transcoder,
        prober,
        log,
    }
}
