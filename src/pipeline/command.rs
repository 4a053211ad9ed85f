//! Transcoder argument construction.
//!
//! The transcoder is asked to keep container metadata, write a `bext`
//! chunk, isolate one channel into mono, and re-attach the source fields as
//! both global and audio-stream tags.

use crate::metadata::{FieldMap, MetadataField};
use crate::pipeline::job::{BitDepth, ExtractionJob};

/// Fields written back through the transcoder's `bext` writer.
const BEXT_TAGS: [(MetadataField, &str); 4] = [
    (MetadataField::Description, "description"),
    (MetadataField::Originator, "originator"),
    (MetadataField::OriginationDate, "origination_date"),
    (MetadataField::OriginationTime, "origination_time"),
];

/// Only forwarded when `forward_originator_reference` is enabled.
const ORIGINATOR_REFERENCE_TAG: (MetadataField, &str) =
    (MetadataField::OriginatorReference, "originator_reference");

/// iXML fields forwarded as plain tags.
const IXML_TAGS: [(MetadataField, &str); 7] = [
    (MetadataField::Note, "ixml_note"),
    (MetadataField::Scene, "scene"),
    (MetadataField::Take, "take"),
    (MetadataField::Tape, "tape"),
    (MetadataField::Project, "project"),
    (MetadataField::Category, "category"),
    (MetadataField::Subcategory, "subcategory"),
];

#[derive(Debug, Clone, Copy)]
pub struct TranscodeOptions {
    pub metadata_header_padding: u32,
    pub forward_originator_reference: bool,
}

/// `(tag, value)` pairs for every non-empty source field with an output tag.
pub fn output_tags(fields: &FieldMap, forward_originator_reference: bool) -> Vec<(&'static str, String)> {
    let mut mapping: Vec<(MetadataField, &'static str)> = BEXT_TAGS.to_vec();
    if forward_originator_reference {
        mapping.push(ORIGINATOR_REFERENCE_TAG);
    }
    mapping.extend(IXML_TAGS);

    mapping
        .into_iter()
        .filter_map(|(field, tag)| {
            fields
                .get(field)
                .filter(|value| !value.is_empty())
                .map(|value| (tag, value.to_string()))
        })
        .collect()
}

/// Full transcoder argument list (program excluded).
pub fn build_args(
    job: &ExtractionJob,
    bit_depth: BitDepth,
    fields: &FieldMap,
    opts: &TranscodeOptions,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-i".into(),
        job.input.to_string_lossy().into_owned(),
        "-map_metadata".into(),
        "0".into(),
        "-write_bext".into(),
        "1".into(),
        "-map".into(),
        "0:a:0".into(),
        "-af".into(),
        format!("pan=mono|c0=c{}", job.channel_index),
    ];
    if let Some(rate) = job.sample_rate {
        args.push("-ar".into());
        args.push(rate.to_string());
    }
    args.extend([
        "-c:a".into(),
        bit_depth.codec().into(),
        "-fflags".into(),
        "+bitexact".into(),
        "-rf64".into(),
        "auto".into(),
        "-metadata_header_padding".into(),
        opts.metadata_header_padding.to_string(),
    ]);
    for (tag, value) in output_tags(fields, opts.forward_originator_reference) {
        args.push("-metadata".into());
        args.push(format!("{tag}={value}"));
        args.push("-metadata:s:a:0".into());
        args.push(format!("{tag}={value}"));
    }
    args.push(job.output.to_string_lossy().into_owned());
    args
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;

    fn opts() -> TranscodeOptions {
        TranscodeOptions {
            metadata_header_padding: 4096,
            forward_originator_reference: false,
        }
    }

    fn fields() -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert(MetadataField::Description, "Test Mix");
        fields.insert(MetadataField::OriginatorReference, "REF-1");
        fields.insert(MetadataField::Originator, "");
        fields.insert(MetadataField::TimeReference, "48000");
        fields.insert(MetadataField::Scene, "12");
        fields.insert(MetadataField::Note, "windy");
        fields
    }

    #[test]
    fn maps_known_fields_only() {
        let tags = output_tags(&fields(), false);
        assert_eq!(
            tags,
            vec![
                ("description", "Test Mix".to_string()),
                ("ixml_note", "windy".to_string()),
                ("scene", "12".to_string()),
            ]
        );
    }

    #[test]
    fn originator_reference_is_opt_in() {
        let tags = output_tags(&fields(), true);
        assert!(tags.contains(&("originator_reference", "REF-1".to_string())));
    }

    #[test]
    fn builds_channel_isolation_command() {
        let mut job = ExtractionJob::new("in.wav", 3, "out_chan4.wav");
        job.sample_rate = NonZeroU32::new(48_000);
        let args = build_args(&job, BitDepth::S16, &fields(), &opts());

        let joined = args.join(" ");
        assert!(joined.starts_with("-y -hide_banner -i in.wav -map_metadata 0 -write_bext 1"));
        assert!(joined.contains("-map 0:a:0 -af pan=mono|c0=c3 -ar 48000 -c:a pcm_s16le"));
        assert!(joined.contains("-fflags +bitexact -rf64 auto -metadata_header_padding 4096"));
        assert!(joined.contains("-metadata description=Test Mix -metadata:s:a:0 description=Test Mix"));
        assert!(!joined.contains("originator_reference"));
        assert!(!joined.contains("time_reference"));
        assert_eq!(args.last().map(String::as_str), Some("out_chan4.wav"));
    }

    #[test]
    fn omits_sample_rate_without_override() {
        let job = ExtractionJob::new("in.wav", 0, "out.wav");
        let args = build_args(&job, BitDepth::S24, &FieldMap::new(), &opts());
        assert!(!args.iter().any(|a| a == "-ar"));
        assert!(args.iter().any(|a| a == "pcm_s24le"));
    }
}
