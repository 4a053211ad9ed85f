//! RIFF/WAVE chunk scanning.
//!
//! Walks the chunk list of a `RIFF....WAVE` stream, hands `bext` and `iXML`
//! payloads to their parsers and skips everything else. Scanning is
//! best-effort: a truncated or corrupt trailing chunk ends the walk but keeps
//! every field decoded before it.

use std::io::{self, Read, Seek, SeekFrom};

use tracing::debug;

use crate::constants::CHUNK_HEADER_LEN;
use crate::metadata::{bext, ixml, FieldMap, MetadataReadout, ParseIssue};

/// RIFF header magic bytes
pub const RIFF_MAGIC: &[u8; 4] = b"RIFF";

/// WAV form type
pub const WAVE_FORM: &[u8; 4] = b"WAVE";

/// Broadcast-wave extension chunk id
pub const BEXT_CHUNK: &[u8; 4] = b"bext";

/// iXML chunk id
pub const IXML_CHUNK: &[u8; 4] = b"iXML";

/// Parse the 12-byte RIFF header and return (form_type, declared_size).
///
/// The header is 12 bytes:
/// - Bytes 0-3: "RIFF"
/// - Bytes 4-7: Chunk size (little-endian u32) - size of everything after this field
/// - Bytes 8-11: Form type (e.g., "WAVE")
///
/// Total file size = chunk_size + 8. The scanner never trusts it; the real
/// end of the stream is authoritative.
pub fn parse_riff_header(header: &[u8]) -> Option<([u8; 4], u64)> {
    if header.len() < 12 || &header[0..4] != RIFF_MAGIC {
        return None;
    }

    let chunk_size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as u64;
    let total_size = chunk_size.saturating_add(8);

    let mut form_type = [0u8; 4];
    form_type.copy_from_slice(&header[8..12]);

    Some((form_type, total_size))
}

/// Chunk id plus declared payload size, valid only during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: [u8; 4],
    pub size: u32,
    /// Stream offset of the chunk id
    pub offset: u64,
}

impl ChunkHeader {
    pub fn id_str(&self) -> String {
        String::from_utf8_lossy(&self.id).into_owned()
    }

    /// RIFF pads odd-sized payloads to an even boundary.
    pub const fn padded_size(&self) -> u64 {
        self.size as u64 + (self.size as u64 & 1)
    }
}

/// Limits applied while scanning.
#[derive(Debug, Clone, Copy)]
pub struct ScanLimits {
    /// Largest metadata payload read into memory
    pub max_chunk_bytes: u64,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_chunk_bytes: crate::constants::DEFAULT_MAX_CHUNK_BYTES,
        }
    }
}

/// Scan a RIFF/WAVE stream from its current position and collect metadata.
pub fn scan<R: Read + Seek>(reader: &mut R, limits: ScanLimits) -> MetadataReadout {
    let mut readout = MetadataReadout::default();
    if let Err(err) = scan_inner(reader, limits, &mut readout.fields, &mut readout.issues) {
        debug!("riff scan stopped on io error: {err}");
        readout.issues.push(ParseIssue::Io {
            message: err.to_string(),
        });
    }
    readout
}

fn scan_inner<R: Read + Seek>(
    reader: &mut R,
    limits: ScanLimits,
    fields: &mut FieldMap,
    issues: &mut Vec<ParseIssue>,
) -> io::Result<()> {
    let mut header = [0u8; 12];
    let n = read_up_to(reader, &mut header)?;
    if parse_riff_header(&header[..n]).map(|(form, _)| &form != WAVE_FORM).unwrap_or(true) {
        debug!("riff scan: missing RIFF/WAVE header");
        issues.push(ParseIssue::NotRiffWave);
        return Ok(());
    }

    loop {
        let offset = reader.stream_position()?;
        let Some(chunk) = read_chunk_header(reader, offset, issues)? else {
            return Ok(());
        };
        debug!(
            "riff chunk id={} size={} offset={}",
            chunk.id_str(),
            chunk.size,
            chunk.offset
        );

        if &chunk.id == BEXT_CHUNK || &chunk.id == IXML_CHUNK {
            let declared = chunk.size as u64;
            if declared > limits.max_chunk_bytes {
                issues.push(ParseIssue::OversizedChunk {
                    id: chunk.id_str(),
                    declared,
                    limit: limits.max_chunk_bytes,
                });
                reader.seek(SeekFrom::Current(chunk.padded_size() as i64))?;
                continue;
            }

            let payload = read_payload(reader, declared)?;
            let complete = payload.len() as u64 == declared;
            if &chunk.id == BEXT_CHUNK {
                bext::parse_bext(&payload, fields, issues);
            } else {
                ixml::parse_ixml(&payload, fields, issues);
            }

            if !complete {
                issues.push(ParseIssue::TruncatedChunk {
                    id: chunk.id_str(),
                    offset: chunk.offset,
                    declared,
                    available: payload.len() as u64,
                });
                return Ok(());
            }
            if chunk.padded_size() != declared {
                reader.seek(SeekFrom::Current(1))?;
            }
        } else {
            reader.seek(SeekFrom::Current(chunk.padded_size() as i64))?;
        }
    }
}

/// Read the next chunk header. `None` means the scan should stop.
fn read_chunk_header<R: Read>(
    reader: &mut R,
    offset: u64,
    issues: &mut Vec<ParseIssue>,
) -> io::Result<Option<ChunkHeader>> {
    let mut raw = [0u8; CHUNK_HEADER_LEN];
    let n = read_up_to(reader, &mut raw[..4])?;
    if n < 4 {
        return Ok(None);
    }
    let n = read_up_to(reader, &mut raw[4..])?;
    if n < 4 {
        issues.push(ParseIssue::TruncatedHeader { offset });
        return Ok(None);
    }

    let mut id = [0u8; 4];
    id.copy_from_slice(&raw[0..4]);
    let size = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
    Ok(Some(ChunkHeader { id, size, offset }))
}

/// Read at most `len` bytes; fewer are returned when the stream ends.
fn read_payload<R: Read>(reader: &mut R, len: u64) -> io::Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(len as usize);
    reader.by_ref().take(len).read_to_end(&mut payload)?;
    Ok(payload)
}

/// Fill `buf` until it is full or the stream ends; returns the bytes read.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut read = 0usize;
    while read < buf.len() {
        match reader.read(&mut buf[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(read)
}
