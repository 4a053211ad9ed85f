//! iXML chunk decoding.
//!
//! The payload is parsed into a small element tree with `xml-rs`, then a
//! fixed set of tags is looked up anywhere in the document. iXML fields are
//! sparse: a tag that is missing or has no text produces no field.

use tracing::{debug, warn};
use xml::reader::{EventReader, XmlEvent};

use crate::metadata::{FieldMap, MetadataField, ParseIssue};

/// iXML tag name to field, looked up as the first matching descendant.
const TAG_FIELDS: [(&str, MetadataField); 8] = [
    ("NOTE", MetadataField::Note),
    ("PROJECT", MetadataField::Project),
    ("TAPE", MetadataField::Tape),
    ("SCENE", MetadataField::Scene),
    ("TAKE", MetadataField::Take),
    ("FILE_UID", MetadataField::FileUid),
    ("UBITS", MetadataField::UserBits),
    ("CIRCLED", MetadataField::CircleTake),
];

/// `ATTR_LIST/ATTR` entry name that carries `Category/Subcategory`.
const MUSICAL_CATEGORY: &str = "MusicalCategory";

#[derive(Debug, Default)]
struct XmlNode {
    name: String,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    /// First descendant (document order, excluding `self`) named `name`.
    fn find_descendant(&self, name: &str) -> Option<&XmlNode> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(name) {
                return Some(found);
            }
        }
        None
    }

    fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Every `child_name` element directly under a `parent_name` element
    /// anywhere below `self`, in document order.
    fn find_all_under<'a>(&'a self, parent_name: &str, child_name: &str, out: &mut Vec<&'a XmlNode>) {
        for child in &self.children {
            if child.name == parent_name {
                out.extend(child.children.iter().filter(|c| c.name == child_name));
            }
            child.find_all_under(parent_name, child_name, out);
        }
    }
}

/// Decode an iXML payload into `fields`.
///
/// Invalid UTF-8 is replaced rather than rejected. A document that fails to
/// parse leaves `fields` untouched and records [`ParseIssue::InvalidIxml`].
pub fn parse_ixml(payload: &[u8], fields: &mut FieldMap, issues: &mut Vec<ParseIssue>) {
    let text = String::from_utf8_lossy(payload);
    let text = text.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());

    let root = match parse_tree(text) {
        Ok(root) => root,
        Err(message) => {
            warn!("ixml parse failed: {message}");
            issues.push(ParseIssue::InvalidIxml { message });
            return;
        }
    };

    for (tag, field) in TAG_FIELDS {
        if let Some(node) = root.find_descendant(tag) {
            let value = node.text.trim();
            if !value.is_empty() {
                fields.insert(field, value);
            }
        }
    }

    let mut attrs = Vec::new();
    root.find_all_under("ATTR_LIST", "ATTR", &mut attrs);
    for attr in attrs {
        let name = attr.child("NAME").map(|n| n.text.as_str());
        if name != Some(MUSICAL_CATEGORY) {
            continue;
        }
        let Some(value) = attr.child("VALUE") else {
            continue;
        };
        apply_category(&value.text, fields);
    }
}

fn apply_category(value: &str, fields: &mut FieldMap) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    let mut parts = value.split('/').map(str::trim);
    for field in [MetadataField::Category, MetadataField::Subcategory] {
        match parts.next() {
            Some(part) if !part.is_empty() => fields.insert(field, part),
            _ => {}
        }
    }
    debug!("ixml musical category value={value:?}");
}

/// Build a synthetic root whose children are the document's top-level elements.
fn parse_tree(text: &str) -> Result<XmlNode, String> {
    let parser = EventReader::from_str(text);
    let mut stack: Vec<XmlNode> = vec![XmlNode::default()];

    for event in parser {
        match event.map_err(|e| e.to_string())? {
            XmlEvent::StartElement { name, .. } => {
                stack.push(XmlNode {
                    name: name.local_name,
                    ..XmlNode::default()
                });
            }
            XmlEvent::EndElement { .. } => {
                let node = stack.pop().ok_or_else(|| "unbalanced end element".to_string())?;
                let parent = stack
                    .last_mut()
                    .ok_or_else(|| "unbalanced end element".to_string())?;
                parent.children.push(node);
            }
            XmlEvent::Characters(chunk) | XmlEvent::CData(chunk) | XmlEvent::Whitespace(chunk) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&chunk);
                }
            }
            _ => {}
        }
    }

    match stack.pop() {
        Some(root) if stack.is_empty() => Ok(root),
        _ => Err("unterminated document".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> (FieldMap, Vec<ParseIssue>) {
        let mut fields = FieldMap::new();
        let mut issues = Vec::new();
        parse_ixml(xml.as_bytes(), &mut fields, &mut issues);
        (fields, issues)
    }

    #[test]
    fn sparse_fields_only() {
        let (fields, issues) =
            parse("<?xml version=\"1.0\"?><BWFXML><SCENE>12</SCENE><TAKE>3</TAKE></BWFXML>");
        assert!(issues.is_empty());
        assert_eq!(fields.get(MetadataField::Scene), Some("12"));
        assert_eq!(fields.get(MetadataField::Take), Some("3"));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn finds_nested_tags_and_trims() {
        let xml = "<BWFXML><SPEED><NOTE>  rolling </NOTE></SPEED>\
                   <PROJECT>Feature</PROJECT><TAPE>T01</TAPE>\
                   <FILE_UID>ABC123</FILE_UID><UBITS>00000000</UBITS>\
                   <CIRCLED>TRUE</CIRCLED><TAKE></TAKE></BWFXML>";
        let (fields, _) = parse(xml);
        assert_eq!(fields.get(MetadataField::Note), Some("rolling"));
        assert_eq!(fields.get(MetadataField::Project), Some("Feature"));
        assert_eq!(fields.get(MetadataField::Tape), Some("T01"));
        assert_eq!(fields.get(MetadataField::FileUid), Some("ABC123"));
        assert_eq!(fields.get(MetadataField::UserBits), Some("00000000"));
        assert_eq!(fields.get(MetadataField::CircleTake), Some("TRUE"));
        assert!(!fields.contains(MetadataField::Take));
    }

    #[test]
    fn first_match_wins() {
        let (fields, _) =
            parse("<BWFXML><HISTORY><SCENE>old</SCENE></HISTORY><SCENE>new</SCENE></BWFXML>");
        assert_eq!(fields.get(MetadataField::Scene), Some("old"));
    }

    #[test]
    fn category_with_subcategory() {
        let xml = "<BWFXML><USER><ATTR_LIST><ATTR><NAME>Library</NAME><VALUE>X</VALUE></ATTR>\
                   <ATTR><NAME>MusicalCategory</NAME><VALUE>Ambience/Traffic</VALUE></ATTR>\
                   </ATTR_LIST></USER></BWFXML>";
        let (fields, _) = parse(xml);
        assert_eq!(fields.get(MetadataField::Category), Some("Ambience"));
        assert_eq!(fields.get(MetadataField::Subcategory), Some("Traffic"));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn category_without_subcategory() {
        let xml = "<BWFXML><ATTR_LIST><ATTR><NAME>MusicalCategory</NAME>\
                   <VALUE> Ambience </VALUE></ATTR></ATTR_LIST></BWFXML>";
        let (fields, _) = parse(xml);
        assert_eq!(fields.get(MetadataField::Category), Some("Ambience"));
        assert!(!fields.contains(MetadataField::Subcategory));
    }

    #[test]
    fn empty_category_value_is_skipped() {
        for value in ["<VALUE/>", "<VALUE></VALUE>", "<VALUE>  </VALUE>"] {
            let xml = format!(
                "<BWFXML><ATTR_LIST><ATTR><NAME>MusicalCategory</NAME>{value}</ATTR></ATTR_LIST></BWFXML>"
            );
            let (fields, issues) = parse(&xml);
            assert!(issues.is_empty());
            assert!(fields.is_empty(), "{value}: {fields:?}");
        }

        let (fields, _) = parse(
            "<BWFXML><ATTR_LIST><ATTR><NAME>MusicalCategory</NAME><VALUE>/Traffic</VALUE></ATTR></ATTR_LIST></BWFXML>",
        );
        assert!(!fields.contains(MetadataField::Category));
        assert_eq!(fields.get(MetadataField::Subcategory), Some("Traffic"));
    }

    #[test]
    fn malformed_xml_adds_nothing() {
        let (fields, issues) = parse("<BWFXML><SCENE>12</SCENE>");
        assert!(fields.is_empty());
        assert!(matches!(issues.as_slice(), [ParseIssue::InvalidIxml { .. }]));
    }

    #[test]
    fn tolerates_trailing_nul_padding_and_bad_bytes() {
        let mut payload = b"<BWFXML><TAPE>R\xFF1</TAPE></BWFXML>".to_vec();
        payload.extend_from_slice(&[0, 0, 0]);
        let mut fields = FieldMap::new();
        let mut issues = Vec::new();
        parse_ixml(&payload, &mut fields, &mut issues);
        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(fields.get(MetadataField::Tape), Some("R\u{FFFD}1"));
    }
}
