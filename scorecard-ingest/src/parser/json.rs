//! EPCIS 2.0 JSON / JSON-LD
//!
//! Accepts the standard `epcisBody.eventList` layout and the older flat
//! layout with `eventList` at the root. serde_json values carry no
//! positions, so only syntax errors get a line number.

use serde_json::{Map, Value};

use super::{is_instance_identifier_key, ParsedDocument, UnknownItem};
use crate::models::{EpcRef, EpcisEvent, EventKind, Ilmd, TypedValue};

pub(crate) fn parse_into(text: &str, doc: &mut ParsedDocument) {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            let line = (e.line() > 0).then_some(e.line() as u32);
            doc.parse_error(format!("Malformed JSON: {}", e), line);
            return;
        }
    };

    let Value::Object(root) = value else {
        doc.parse_error("JSON document must be an object", Some(1));
        return;
    };
    doc.shape.well_formed = true;

    doc.shape.root_name = root.get("type").and_then(Value::as_str).map(str::to_string);
    doc.shape.has_epcis_namespace = root.get("@context").is_some_and(context_mentions_epcis);
    doc.shape.schema_version = root.get("schemaVersion").and_then(scalar);

    if let Some(header) = root.get("epcisHeader") {
        doc.instance_identifier = find_instance_identifier(header);
    }

    let event_list = if let Some(body) = root.get("epcisBody") {
        doc.shape.has_body = true;
        if let Value::Object(body) = body {
            for key in body.keys().filter(|k| k.as_str() != "eventList") {
                doc.shape.unknown_elements.push(UnknownItem {
                    name: key.clone(),
                    line: None,
                });
            }
        }
        body.get("eventList")
    } else if let Some(list) = root.get("eventList") {
        // Flat layout: the root object doubles as the body
        doc.shape.has_body = true;
        Some(list)
    } else {
        None
    };

    let Some(event_list) = event_list else {
        return;
    };
    doc.shape.has_event_list = true;

    let Value::Array(items) = event_list else {
        doc.parse_error("eventList must be an array", None);
        return;
    };

    for item in items {
        let Value::Object(obj) = item else {
            doc.shape.unknown_event_types.push(UnknownItem {
                name: type_label(item),
                line: None,
            });
            continue;
        };

        let type_name = obj
            .get("type")
            .or_else(|| obj.get("eventType"))
            .and_then(Value::as_str)
            .unwrap_or("");

        match EventKind::from_name(type_name) {
            Some(kind) => {
                let mut event = EpcisEvent::new(doc.events.len(), kind, None);
                read_event_fields(obj, &mut event);
                doc.events.push(event);
            }
            None => doc.shape.unknown_event_types.push(UnknownItem {
                name: if type_name.is_empty() {
                    "<missing type>".to_string()
                } else {
                    type_name.to_string()
                },
                line: None,
            }),
        }
    }
}

fn read_event_fields(obj: &Map<String, Value>, event: &mut EpcisEvent) {
    for (key, value) in obj {
        match key.as_str() {
            "eventTime" => event.event_time = scalar(value),
            "eventTimeZoneOffset" => event.event_time_zone_offset = scalar(value),
            "action" => event.action = scalar(value),
            "epcList" | "childEPCs" | "inputEPCList" => event.epcs.extend(epc_refs(value)),
            "outputEPCList" => event.output_epcs.extend(epc_refs(value)),
            "parentID" => event.parent_id = scalar(value),
            "bizStep" => event.biz_step = scalar(value),
            "disposition" => event.disposition = scalar(value),
            "readPoint" => event.read_point = id_of(value),
            "bizLocation" => event.biz_location = id_of(value),
            "bizTransactionList" => event
                .biz_transactions
                .extend(typed_values(value, "bizTransaction")),
            "sourceList" => event.sources.extend(typed_values(value, "source")),
            "destinationList" => event.destinations.extend(typed_values(value, "destination")),
            "ilmd" => event.ilmd = Some(read_ilmd(value)),
            "errorDeclaration" => event.out_of_order = true,
            "outOfOrder" => {
                event.out_of_order |= match value {
                    Value::Bool(flag) => *flag,
                    other => scalar(other).is_some_and(|v| v.eq_ignore_ascii_case("true")),
                }
            }
            _ => {}
        }
    }
}

/// Text form of a scalar; non-string scalars are kept so the field stage
/// can reject them instead of them silently vanishing
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        other => Some(other.to_string()),
    }
}

fn epc_refs(value: &Value) -> Vec<EpcRef> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| EpcRef::new(scalar(item).unwrap_or_default(), None))
            .collect(),
        _ => Vec::new(),
    }
}

fn typed_values(value: &Value, value_key: &str) -> Vec<TypedValue> {
    let Value::Array(items) = value else {
        return Vec::new();
    };

    items
        .iter()
        .map(|item| TypedValue {
            kind: item.get("type").and_then(scalar),
            value: item.get(value_key).and_then(scalar).unwrap_or_default(),
        })
        .collect()
}

/// ILMD keys may carry a prefix (`cbvmda:lotNumber`)
fn read_ilmd(value: &Value) -> Ilmd {
    let mut ilmd = Ilmd::default();
    if let Value::Object(map) = value {
        for (key, v) in map {
            match key.rsplit(':').next().unwrap_or(key) {
                "lotNumber" => ilmd.lot_number = scalar(v),
                "itemExpirationDate" => ilmd.item_expiration_date = scalar(v),
                _ => {}
            }
        }
    }
    ilmd
}

/// `{"id": "..."}` or a bare string
fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map.get("id").and_then(scalar),
        other => scalar(other),
    }
}

fn context_mentions_epcis(context: &Value) -> bool {
    match context {
        Value::String(s) => s.contains("epcis"),
        Value::Array(items) => items.iter().any(context_mentions_epcis),
        Value::Object(map) => map.values().any(context_mentions_epcis),
        _ => false,
    }
}

fn find_instance_identifier(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map.iter().find_map(|(key, v)| {
            if is_instance_identifier_key(key) {
                scalar(v)
            } else {
                find_instance_identifier(v)
            }
        }),
        Value::Array(items) => items.iter().find_map(find_instance_identifier),
        _ => None,
    }
}

fn type_label(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use crate::models::ContentType;
    use crate::parser::parse_document;

    #[test]
    fn test_parses_json_ld_layout() {
        let text = r#"{
  "@context": ["https://ref.gs1.org/standards/epcis/2.0.0/epcis-context.jsonld"],
  "type": "EPCISDocument",
  "schemaVersion": "2.0",
  "epcisHeader": {
    "standardBusinessDocumentHeader": {
      "documentIdentification": { "instanceIdentifier": "JSON-7" }
    }
  },
  "epcisBody": {
    "eventList": [
      {
        "type": "AggregationEvent",
        "eventTime": "2025-02-01T10:00:00Z",
        "eventTimeZoneOffset": "+01:00",
        "parentID": "urn:epc:id:sscc:0614141.1234567890",
        "childEPCs": ["urn:epc:id:sgtin:0614141.107346.2017"],
        "action": "ADD",
        "readPoint": { "id": "urn:epc:id:sgln:0614141.07346.1234" },
        "ilmd": { "cbvmda:lotNumber": "LOT1" },
        "outOfOrder": true
      },
      { "type": "SensorEvent" },
      42
    ]
  }
}"#;
        let doc = parse_document(text.as_bytes(), ContentType::Json);

        assert!(doc.findings.is_empty());
        assert!(doc.shape.has_epcis_namespace);
        assert_eq!(doc.shape.root_name.as_deref(), Some("EPCISDocument"));
        assert_eq!(doc.instance_identifier.as_deref(), Some("JSON-7"));
        assert_eq!(doc.events.len(), 1);

        let event = &doc.events[0];
        assert_eq!(event.parent_id.as_deref(), Some("urn:epc:id:sscc:0614141.1234567890"));
        assert_eq!(event.epcs.len(), 1);
        assert_eq!(event.read_point.as_deref(), Some("urn:epc:id:sgln:0614141.07346.1234"));
        assert_eq!(event.ilmd.as_ref().and_then(|i| i.lot_number.as_deref()), Some("LOT1"));
        assert!(event.out_of_order);

        let unknown: Vec<&str> = doc
            .shape
            .unknown_event_types
            .iter()
            .map(|u| u.name.as_str())
            .collect();
        assert_eq!(unknown, vec!["SensorEvent", "number"]);
    }

    #[test]
    fn test_flat_layout_with_legacy_event_type() {
        let text = r#"{"@context": "https://gs1.github.io/EPCIS/epcis-context.jsonld",
            "eventList": [{"eventType": "ObjectEvent", "eventTime": 20250201}]}"#;
        let doc = parse_document(text.as_bytes(), ContentType::Json);

        assert!(doc.shape.has_body);
        assert!(doc.shape.has_event_list);
        assert!(doc.shape.root_name.is_none());
        assert_eq!(doc.events.len(), 1);
        // Numbers are kept verbatim so the field stage can reject them
        assert_eq!(doc.events[0].event_time.as_deref(), Some("20250201"));
    }

    #[test]
    fn test_malformed_json_reports_line() {
        let text = "{\n  \"type\": \"EPCISDocument\",\n  \"epcisBody\": {\n}";
        let doc = parse_document(text.as_bytes(), ContentType::Json);

        assert!(!doc.shape.well_formed);
        assert_eq!(doc.findings.len(), 1);
        assert_eq!(doc.findings[0].line_number, Some(4));
    }

    #[test]
    fn test_non_object_root() {
        let doc = parse_document(b"[1, 2]", ContentType::Json);
        assert!(!doc.shape.well_formed);
        assert_eq!(doc.findings.len(), 1);
    }
}
