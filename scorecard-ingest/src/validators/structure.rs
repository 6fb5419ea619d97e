//! Structure stage: document shape

use super::{FindingSink, ValidationPolicy};
use crate::models::{ContentType, NewFinding, Stage};
use crate::parser::ParsedDocument;

const ROOT_NAME: &str = "EPCISDocument";
const SCHEMA_VERSIONS: &[&str] = &["1.0", "1.1", "1.2", "2.0"];

pub fn check(doc: &ParsedDocument, _policy: &ValidationPolicy, sink: &mut FindingSink) {
    let shape = &doc.shape;

    // The parser already reported why
    if !shape.well_formed {
        return;
    }

    let root_line = match doc.content_type {
        ContentType::Xml => None,
        ContentType::Json => Some(1),
    };

    match (doc.content_type, shape.root_name.as_deref()) {
        (_, Some(ROOT_NAME)) => {}
        (ContentType::Json, None) => sink.push(
            NewFinding::warning(
                Stage::Structure,
                format!("Document 'type' is missing; expected {}", ROOT_NAME),
            )
            .at_line(root_line),
        ),
        (_, other) => sink.push(NewFinding::error(
            Stage::Structure,
            format!(
                "Root element must be {}, found {}",
                ROOT_NAME,
                other.unwrap_or("nothing")
            ),
        )),
    }

    if !shape.has_epcis_namespace {
        let message = match doc.content_type {
            ContentType::Xml => "Root element does not declare the EPCIS namespace",
            ContentType::Json => "Document @context does not reference the EPCIS context",
        };
        sink.push(NewFinding::error(Stage::Structure, message));
    }

    if !shape.has_body {
        sink.push(NewFinding::error(Stage::Structure, "Missing required container EPCISBody"));
    } else if !shape.has_event_list {
        sink.push(NewFinding::error(Stage::Structure, "Missing required container EventList"));
    }

    if let Some(version) = shape.schema_version.as_deref() {
        if !SCHEMA_VERSIONS.contains(&version) {
            sink.push(NewFinding::warning(
                Stage::Structure,
                format!("Unrecognized schemaVersion '{}'", version),
            ));
        }
    }

    for item in &shape.unknown_elements {
        sink.push(
            NewFinding::warning(
                Stage::Structure,
                format!("Unrecognized element '{}' in EPCISBody ignored", item.name),
            )
            .at_line(item.line),
        );
    }

    for item in &shape.unknown_event_types {
        sink.push(
            NewFinding::warning(
                Stage::Structure,
                format!("Unrecognized event type '{}' ignored", item.name),
            )
            .at_line(item.line),
        );
    }

    if shape.has_event_list && doc.events.is_empty() {
        sink.push(NewFinding::error(
            Stage::Structure,
            "Document contains no parseable events",
        ));
    }
}
