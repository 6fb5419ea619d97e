//! EPCIS 1.2 / 2.0 XML
//!
//! Elements are matched by local name so any namespace prefix works. EPCIS
//! 1.2 puts newer event types, source/destination lists and ILMD inside
//! `<extension>`; those wrappers are walked transparently.

use roxmltree::{Document, Node, ParsingOptions};

use super::{is_instance_identifier_key, ParsedDocument, UnknownItem};
use crate::models::{EpcRef, EpcisEvent, EventKind, Ilmd, TypedValue};

pub(crate) fn parse_into(text: &str, doc: &mut ParsedDocument) {
    // DTDs are refused (entity expansion)
    let options = ParsingOptions {
        allow_dtd: false,
        ..ParsingOptions::default()
    };

    let xml = match Document::parse_with_options(text, options) {
        Ok(xml) => xml,
        Err(e) => {
            doc.parse_error(format!("Malformed XML: {}", e), Some(e.pos().row));
            return;
        }
    };
    doc.shape.well_formed = true;

    let root = xml.root_element();
    doc.shape.root_name = Some(root.tag_name().name().to_string());
    doc.shape.has_epcis_namespace = root.tag_name().namespace().is_some_and(is_epcis_namespace)
        || root.namespaces().any(|ns| is_epcis_namespace(ns.uri()));
    doc.shape.schema_version = root
        .attribute("schemaVersion")
        .map(|v| v.trim().to_string());

    if let Some(header) = child_element(root, "EPCISHeader") {
        doc.instance_identifier = header
            .descendants()
            .filter(Node::is_element)
            .find(|n| is_instance_identifier_key(n.tag_name().name()))
            .and_then(text_of);
    }

    let Some(body) = child_element(root, "EPCISBody") else {
        return;
    };
    doc.shape.has_body = true;

    for child in body.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "EventList" => {
                doc.shape.has_event_list = true;
                collect_events(&xml, child, doc);
            }
            "extension" => {}
            other => doc.shape.unknown_elements.push(UnknownItem {
                name: other.to_string(),
                line: Some(line_of(&xml, child)),
            }),
        }
    }
}

fn is_epcis_namespace(uri: &str) -> bool {
    uri.starts_with("urn:epcglobal:epcis") || uri.contains("gs1.org/epcis") || uri.contains("/standards/epcis")
}

fn collect_events(xml: &Document, list: Node, doc: &mut ParsedDocument) {
    for node in list.children().filter(Node::is_element) {
        let name = node.tag_name().name();
        if name == "extension" {
            collect_events(xml, node, doc);
            continue;
        }

        match EventKind::from_name(name) {
            Some(kind) => {
                let mut event = EpcisEvent::new(doc.events.len(), kind, Some(line_of(xml, node)));
                read_event_fields(xml, node, &mut event);
                doc.events.push(event);
            }
            None => doc.shape.unknown_event_types.push(UnknownItem {
                name: name.to_string(),
                line: Some(line_of(xml, node)),
            }),
        }
    }
}

fn read_event_fields(xml: &Document, node: Node, event: &mut EpcisEvent) {
    for field in node.children().filter(Node::is_element) {
        match field.tag_name().name() {
            "eventTime" => event.event_time = text_of(field),
            "eventTimeZoneOffset" => event.event_time_zone_offset = text_of(field),
            "action" => event.action = text_of(field),
            "epcList" | "childEPCs" | "inputEPCList" => event.epcs.extend(epc_refs(xml, field)),
            "outputEPCList" => event.output_epcs.extend(epc_refs(xml, field)),
            "parentID" => event.parent_id = text_of(field),
            "bizStep" => event.biz_step = text_of(field),
            "disposition" => event.disposition = text_of(field),
            "readPoint" => event.read_point = id_of(field),
            "bizLocation" => event.biz_location = id_of(field),
            "bizTransactionList" => event
                .biz_transactions
                .extend(typed_values(field, "bizTransaction")),
            "sourceList" => event.sources.extend(typed_values(field, "source")),
            "destinationList" => event.destinations.extend(typed_values(field, "destination")),
            "ilmd" => event.ilmd = Some(read_ilmd(field)),
            "errorDeclaration" => event.out_of_order = true,
            "outOfOrder" => {
                event.out_of_order |= text_of(field).is_some_and(|v| v.eq_ignore_ascii_case("true"))
            }
            "extension" | "baseExtension" => read_event_fields(xml, field, event),
            _ => {}
        }
    }
}

fn epc_refs(xml: &Document, list: Node) -> Vec<EpcRef> {
    list.children()
        .filter(|n| n.is_element() && n.tag_name().name() == "epc")
        .map(|n| EpcRef::new(text_of(n).unwrap_or_default(), Some(line_of(xml, n))))
        .collect()
}

fn typed_values(list: Node, item_name: &str) -> Vec<TypedValue> {
    list.children()
        .filter(|n| n.is_element() && n.tag_name().name() == item_name)
        .map(|n| TypedValue {
            kind: n.attribute("type").map(|t| t.trim().to_string()),
            value: text_of(n).unwrap_or_default(),
        })
        .collect()
}

fn read_ilmd(node: Node) -> Ilmd {
    let mut ilmd = Ilmd::default();
    for n in node.descendants().filter(Node::is_element) {
        match n.tag_name().name() {
            "lotNumber" => ilmd.lot_number = text_of(n),
            "itemExpirationDate" => ilmd.item_expiration_date = text_of(n),
            _ => {}
        }
    }
    ilmd
}

/// `<readPoint><id>...</id></readPoint>`, tolerating bare text
fn id_of(node: Node) -> Option<String> {
    child_element(node, "id").and_then(text_of).or_else(|| text_of(node))
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn text_of(node: Node) -> Option<String> {
    node.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn line_of(xml: &Document, node: Node) -> u32 {
    xml.text_pos_at(node.range().start).row
}
