//! Metadata preservation verdict.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::constants::TECHNICAL_KEYS;

/// A field whose value differs between source and output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub source: String,
    pub output: String,
}

/// Which source fields survived the round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreservationVerdict {
    /// Source fields that were compared
    pub checked: Vec<String>,
    /// Present in the source, absent from the output
    pub missing: Vec<String>,
    /// Present in both with different values
    pub changed: Vec<FieldChange>,
}

impl PreservationVerdict {
    pub fn preserved(&self) -> bool {
        self.missing.is_empty() && self.changed.is_empty()
    }
}

impl fmt::Display for PreservationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.preserved() {
            return write!(f, "all {} field(s) preserved", self.checked.len());
        }
        let changed: Vec<String> = self
            .changed
            .iter()
            .map(|c| format!("{} ({:?} -> {:?})", c.field, c.source, c.output))
            .collect();
        write!(
            f,
            "missing [{}], changed [{}]",
            self.missing.join(", "),
            changed.join(", ")
        )
    }
}

/// Stream properties that extraction changes by design.
pub fn is_technical_key(key: &str) -> bool {
    TECHNICAL_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

/// Compare every non-empty, non-technical source field against the output.
pub fn verify(
    source: &BTreeMap<String, String>,
    output: &BTreeMap<String, String>,
) -> PreservationVerdict {
    let mut verdict = PreservationVerdict::default();
    for (key, value) in source {
        if value.is_empty() || is_technical_key(key) {
            continue;
        }
        verdict.checked.push(key.clone());
        match output.get(key) {
            None => verdict.missing.push(key.clone()),
            Some(out) if out != value => verdict.changed.push(FieldChange {
                field: key.clone(),
                source: value.clone(),
                output: out.clone(),
            }),
            Some(_) => {}
        }
    }
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn ignores_channel_count_change() {
        let source = map(&[("Description", "Test Mix"), ("channels", "8")]);
        let output = map(&[("Description", "Test Mix"), ("channels", "1")]);
        let verdict = verify(&source, &output);
        assert!(verdict.preserved());
        assert_eq!(verdict.checked, vec!["Description"]);
    }

    #[test]
    fn changed_description_fails() {
        let source = map(&[("Description", "Test Mix"), ("channels", "8")]);
        let output = map(&[("Description", "Other"), ("channels", "1")]);
        let verdict = verify(&source, &output);
        assert!(!verdict.preserved());
        assert_eq!(
            verdict.changed,
            vec![FieldChange {
                field: "Description".to_string(),
                source: "Test Mix".to_string(),
                output: "Other".to_string(),
            }]
        );
    }

    #[test]
    fn reports_missing_and_skips_empty() {
        let source = map(&[("Scene", "12"), ("Take", "3"), ("Originator", "")]);
        let output = map(&[("Scene", "12")]);
        let verdict = verify(&source, &output);
        assert_eq!(verdict.missing, vec!["Take"]);
        assert!(verdict.changed.is_empty());
        assert_eq!(verdict.to_string(), "missing [Take], changed []");
    }

    #[test]
    fn technical_keys_case_insensitive() {
        assert!(is_technical_key("Duration"));
        assert!(is_technical_key("SAMPLE_RATE"));
        assert!(!is_technical_key("Description"));
    }
}
