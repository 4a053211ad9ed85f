//! Broadcast-wave extension (`bext`) chunk decoding.
//!
//! Layout (EBU Tech 3285), all integers little-endian:
//! - Description: 256 bytes text
//! - Originator: 32 bytes text
//! - OriginatorReference: 32 bytes text
//! - OriginationDate: 10 bytes text (`YYYY-MM-DD`, not validated)
//! - OriginationTime: 8 bytes text (`HH:MM:SS`, not validated)
//! - TimeReference: u64
//! - Version: u16
//! - UMID: 64 bytes binary
//! - LoudnessValue, LoudnessRange, MaxTruePeakLevel, MaxMomentaryLoudness,
//!   MaxShortTermLoudness: u16 each
//! - Reserved: 180 bytes
//! - CodingHistory: remainder, text

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;

use crate::constants::{
    BEXT_DESCRIPTION_LEN, BEXT_ORIGINATION_DATE_LEN, BEXT_ORIGINATION_TIME_LEN,
    BEXT_ORIGINATOR_LEN, BEXT_ORIGINATOR_REFERENCE_LEN, BEXT_RESERVED_LEN, BEXT_UMID_LEN,
};
use crate::metadata::{FieldMap, MetadataField, ParseIssue};

const LOUDNESS_FIELDS: [MetadataField; 5] = [
    MetadataField::LoudnessValue,
    MetadataField::LoudnessRange,
    MetadataField::MaxTruePeakLevel,
    MetadataField::MaxMomentaryLoudness,
    MetadataField::MaxShortTermLoudness,
];

/// Decode a `bext` payload into `fields`.
///
/// Text fields tolerate a short payload (they decode whatever bytes remain).
/// An integer field that cannot be read in full stops decoding: fields before
/// it stay in the map, fields after it are absent, and a
/// [`ParseIssue::BextTruncated`] is recorded.
pub fn parse_bext(payload: &[u8], fields: &mut FieldMap, issues: &mut Vec<ParseIssue>) {
    let mut cursor = Cursor::new(payload);
    if let Err(field) = decode(&mut cursor, fields) {
        debug!("bext truncated before {field} (payload {} bytes)", payload.len());
        issues.push(ParseIssue::BextTruncated { field });
    }
}

fn decode(cursor: &mut Cursor<&[u8]>, fields: &mut FieldMap) -> Result<(), MetadataField> {
    let text_fields = [
        (MetadataField::Description, BEXT_DESCRIPTION_LEN),
        (MetadataField::Originator, BEXT_ORIGINATOR_LEN),
        (MetadataField::OriginatorReference, BEXT_ORIGINATOR_REFERENCE_LEN),
        (MetadataField::OriginationDate, BEXT_ORIGINATION_DATE_LEN),
        (MetadataField::OriginationTime, BEXT_ORIGINATION_TIME_LEN),
    ];
    for (field, len) in text_fields {
        fields.insert(field, read_string(take(cursor, len)));
    }

    let time_reference = cursor
        .read_u64::<LittleEndian>()
        .map_err(|_| MetadataField::TimeReference)?;
    fields.insert(MetadataField::TimeReference, time_reference.to_string());

    let version = cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| MetadataField::Version)?;
    fields.insert(MetadataField::Version, version.to_string());

    fields.insert(MetadataField::Umid, hex::encode(take(cursor, BEXT_UMID_LEN)));

    for field in LOUDNESS_FIELDS {
        let value = cursor.read_u16::<LittleEndian>().map_err(|_| field)?;
        fields.insert(field, value.to_string());
    }

    take(cursor, BEXT_RESERVED_LEN);
    let rest = take(cursor, usize::MAX);
    fields.insert(MetadataField::CodingHistory, read_string(rest));
    Ok(())
}

/// Advance by up to `len` bytes and return them.
fn take<'a>(cursor: &mut Cursor<&'a [u8]>, len: usize) -> &'a [u8] {
    let data: &'a [u8] = *cursor.get_ref();
    let start = (cursor.position() as usize).min(data.len());
    let end = start.saturating_add(len).min(data.len());
    cursor.set_position(end as u64);
    &data[start..end]
}

/// Null-terminated text: keep the bytes before the first NUL, decode as
/// UTF-8 and trim. Undecodable input yields an empty string.
pub fn read_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end])
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BEXT_FIXED_LEN;

    fn fixed(field: &str, width: usize) -> Vec<u8> {
        let mut out = field.as_bytes().to_vec();
        out.resize(width, 0);
        out
    }

    fn sample_bext(coding_history: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(fixed("Test Mix", 256));
        out.extend(fixed("Recorder X", 32));
        out.extend(fixed("REF-0001", 32));
        out.extend(fixed("2024-05-01", 10));
        out.extend(fixed("12:30:00", 8));
        out.extend_from_slice(&48_000u64.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend((0u8..64).collect::<Vec<u8>>());
        for value in [0xFFE9u16, 70, 0xFFF6, 0xFFEC, 0xFFEA] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend(vec![0u8; 180]);
        assert_eq!(out.len(), BEXT_FIXED_LEN);
        out.extend_from_slice(coding_history.as_bytes());
        out
    }

    #[test]
    fn decodes_fixed_layout() {
        let payload = sample_bext("A=PCM,F=48000,W=24,M=mono\r\n\0\0");
        let mut fields = FieldMap::new();
        let mut issues = Vec::new();
        parse_bext(&payload, &mut fields, &mut issues);

        assert!(issues.is_empty());
        assert_eq!(fields.get(MetadataField::Description), Some("Test Mix"));
        assert_eq!(fields.get(MetadataField::Originator), Some("Recorder X"));
        assert_eq!(fields.get(MetadataField::OriginatorReference), Some("REF-0001"));
        assert_eq!(fields.get(MetadataField::OriginationDate), Some("2024-05-01"));
        assert_eq!(fields.get(MetadataField::OriginationTime), Some("12:30:00"));
        assert_eq!(fields.get(MetadataField::TimeReference), Some("48000"));
        assert_eq!(fields.get(MetadataField::Version), Some("2"));
        let umid = fields.get(MetadataField::Umid).expect("umid");
        assert_eq!(umid.len(), 128);
        assert!(umid.starts_with("000102030405"));
        assert_eq!(fields.get(MetadataField::LoudnessValue), Some("65513"));
        assert_eq!(fields.get(MetadataField::LoudnessRange), Some("70"));
        assert_eq!(fields.get(MetadataField::MaxShortTermLoudness), Some("65514"));
        assert_eq!(
            fields.get(MetadataField::CodingHistory),
            Some("A=PCM,F=48000,W=24,M=mono")
        );
        assert_eq!(fields.len(), 14);
    }

    #[test]
    fn empty_text_fields_are_present() {
        let mut payload = vec![0u8; BEXT_FIXED_LEN];
        payload[346..348].copy_from_slice(&1u16.to_le_bytes());
        let mut fields = FieldMap::new();
        let mut issues = Vec::new();
        parse_bext(&payload, &mut fields, &mut issues);

        assert_eq!(fields.get(MetadataField::Description), Some(""));
        assert_eq!(fields.get(MetadataField::CodingHistory), Some(""));
        assert_eq!(fields.get(MetadataField::Version), Some("1"));
        assert_eq!(fields.len(), 14);
    }

    #[test]
    fn short_payload_stops_at_first_integer() {
        let payload = sample_bext("");
        let mut fields = FieldMap::new();
        let mut issues = Vec::new();
        parse_bext(&payload[..340], &mut fields, &mut issues);

        assert_eq!(fields.get(MetadataField::OriginationTime), Some("12:30:00"));
        assert!(!fields.contains(MetadataField::TimeReference));
        assert!(!fields.contains(MetadataField::CodingHistory));
        assert_eq!(
            issues,
            vec![ParseIssue::BextTruncated {
                field: MetadataField::TimeReference
            }]
        );
    }

    #[test]
    fn read_string_rules() {
        assert_eq!(read_string(b"  padded \0garbage"), "padded");
        assert_eq!(read_string(b"no terminator"), "no terminator");
        assert_eq!(read_string(&[0xFF, 0xFE, 0x00]), "");
        assert_eq!(read_string(b""), "");
    }
}
