//! EPCIS document parser
//!
//! Turns raw upload bytes into a `ParsedDocument`. Parsing never fails:
//! every malformance becomes a structure-stage finding with a line number
//! when one is known, and whatever events could be extracted are returned.

pub mod json;
pub mod xml;

use crate::models::{ContentType, EpcisEvent, NewFinding, Stage};

/// Shape of the document as far as the structure stage cares
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentShape {
    /// Parsed at all (XML well-formed / JSON syntactically valid)
    pub well_formed: bool,
    /// XML root element local name, or the JSON `type` value
    pub root_name: Option<String>,
    /// EPCIS namespace (XML) or JSON-LD context present
    pub has_epcis_namespace: bool,
    pub has_body: bool,
    pub has_event_list: bool,
    pub schema_version: Option<String>,
    /// Unrecognized elements directly inside the body
    pub unknown_elements: Vec<UnknownItem>,
    /// Entries of the event list that are not a known event type
    pub unknown_event_types: Vec<UnknownItem>,
}

/// Something the parser skipped, with where it was
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownItem {
    pub name: String,
    pub line: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub content_type: ContentType,
    pub shape: DocumentShape,
    /// SBDH `DocumentIdentification/InstanceIdentifier`
    pub instance_identifier: Option<String>,
    pub events: Vec<EpcisEvent>,
    /// Parse failures (structure stage, error severity)
    pub findings: Vec<NewFinding>,
}

impl ParsedDocument {
    pub(crate) fn empty(content_type: ContentType) -> Self {
        Self {
            content_type,
            shape: DocumentShape::default(),
            instance_identifier: None,
            events: Vec::new(),
            findings: Vec::new(),
        }
    }

    pub(crate) fn parse_error(&mut self, message: impl Into<String>, line: Option<u32>) {
        self.findings
            .push(NewFinding::error(Stage::Structure, message).at_line(line));
    }
}

/// Parse raw bytes as the declared content type
pub fn parse_document(bytes: &[u8], content_type: ContentType) -> ParsedDocument {
    let mut doc = ParsedDocument::empty(content_type);

    let text = match decode_utf8(bytes) {
        Ok(text) => text,
        Err((offset, line)) => {
            doc.parse_error(
                format!("Document is not valid UTF-8 (invalid byte at offset {})", offset),
                Some(line),
            );
            return doc;
        }
    };

    if text.trim().is_empty() {
        doc.parse_error("Document is empty", None);
        return doc;
    }

    match content_type {
        ContentType::Xml => xml::parse_into(text, &mut doc),
        ContentType::Json => json::parse_into(text, &mut doc),
    }

    tracing::debug!(
        format = content_type.as_str(),
        events = doc.events.len(),
        parse_errors = doc.findings.len(),
        "Parsed document"
    );

    doc
}

/// Strip a UTF-8 BOM and validate, reporting (byte offset, line) on failure
fn decode_utf8(bytes: &[u8]) -> Result<&str, (usize, u32)> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(bytes).map_err(|e| {
        let offset = e.valid_up_to();
        let line = bytes[..offset].iter().filter(|&&b| b == b'\n').count() as u32 + 1;
        (offset, line)
    })
}

/// Find an instance identifier key anywhere in a header, case-insensitively
pub(crate) fn is_instance_identifier_key(name: &str) -> bool {
    name.eq_ignore_ascii_case("InstanceIdentifier")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_utf8_reports_line() {
        let bytes = b"<EPCISDocument>\n<EPCISBody>\n\xFF\xFE</EPCISBody>";
        let doc = parse_document(bytes, ContentType::Xml);
        assert_eq!(doc.findings.len(), 1);
        assert_eq!(doc.findings[0].line_number, Some(3));
        assert!(doc.findings[0].message.contains("UTF-8"));
        assert!(doc.events.is_empty());
    }

    #[test]
    fn test_empty_document() {
        let doc = parse_document(b"  \n ", ContentType::Json);
        assert_eq!(doc.findings.len(), 1);
        assert!(!doc.shape.well_formed);
    }

    #[test]
    fn test_bom_is_ignored() {
        let bytes = b"\xEF\xBB\xBF{\"type\": \"EPCISDocument\"}";
        let doc = parse_document(bytes, ContentType::Json);
        assert!(doc.findings.is_empty());
        assert!(doc.shape.well_formed);
    }
}
