//! Aggregation stage: parent/child containment
//!
//! Walks ADD / DELETE containment events in document order keeping the
//! active parent of every child. Packs still open at the end of the document
//! are warnings: the matching unpack may legitimately arrive in a later
//! document.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::{sort_by_event, FindingSink, ValidationPolicy};
use crate::models::{Action, EpcisEvent, NewFinding, Stage};
use crate::parser::ParsedDocument;

struct OpenPack {
    event_index: usize,
    line: Option<u32>,
    packed_at: Option<DateTime<Utc>>,
    children: usize,
}

pub fn check(doc: &ParsedDocument, policy: &ValidationPolicy, sink: &mut FindingSink) {
    // child EPC → active parent
    let mut active_parent: HashMap<&str, &str> = HashMap::new();
    let mut open_packs: HashMap<&str, OpenPack> = HashMap::new();
    let mut findings = Vec::new();

    for event in doc.events.iter().filter(|e| e.kind.is_containment()) {
        let Some(parent) = event.parent_id.as_deref() else {
            continue;
        };

        match event.parsed_action() {
            Some(Action::Add) => {
                let pack = open_packs.entry(parent).or_insert_with(|| OpenPack {
                    event_index: event.index,
                    line: event.line,
                    packed_at: event.parsed_event_time(),
                    children: 0,
                });

                for child in &event.epcs {
                    let child_epc = child.value.as_str();
                    match active_parent.get(child_epc) {
                        Some(&current) if current != parent => findings.push(
                            error(
                                event,
                                format!(
                                    "child {} is already packed in {}; cannot also be packed in {}",
                                    child_epc, current, parent
                                ),
                            )
                            .at_line(child.line.or(event.line)),
                        ),
                        Some(_) => {}
                        None => {
                            active_parent.insert(child_epc, parent);
                            pack.children += 1;
                        }
                    }
                }
            }
            Some(Action::Delete) => {
                if event.epcs.is_empty() {
                    active_parent.retain(|_, p| *p != parent);
                    open_packs.remove(parent);
                    continue;
                }

                for child in &event.epcs {
                    let child_epc = child.value.as_str();
                    match active_parent.get(child_epc) {
                        Some(&current) if current != parent => findings.push(
                            error(
                                event,
                                format!(
                                    "unpack of {} names parent {} but it is packed in {}",
                                    child_epc, parent, current
                                ),
                            )
                            .at_line(child.line.or(event.line)),
                        ),
                        Some(_) => {
                            active_parent.remove(child_epc);
                            if let Some(pack) = open_packs.get_mut(parent) {
                                pack.children = pack.children.saturating_sub(1);
                            }
                        }
                        // Packed in an earlier document
                        None => {}
                    }
                }

                if open_packs.get(parent).is_some_and(|pack| pack.children == 0) {
                    open_packs.remove(parent);
                }
            }
            _ => {}
        }
    }

    let latest_time = doc.events.iter().filter_map(EpcisEvent::parsed_event_time).max();

    let mut still_open: Vec<(&str, OpenPack)> = open_packs.into_iter().collect();
    still_open.sort_by_key(|(_, pack)| pack.event_index);

    for (parent, pack) in still_open {
        if in_flight(&pack, latest_time, policy) {
            continue;
        }
        findings.push(
            NewFinding::warning(
                Stage::Aggregation,
                format!(
                    "aggregation for parent {} (event #{}) is still open at end of document",
                    parent,
                    pack.event_index + 1
                ),
            )
            .for_event(pack.event_index)
            .at_line(pack.line),
        );
    }

    sort_by_event(&mut findings);
    sink.extend(findings);
}

/// Younger than the configured window, measured against the newest event
fn in_flight(pack: &OpenPack, latest: Option<DateTime<Utc>>, policy: &ValidationPolicy) -> bool {
    match (policy.aggregation_open_window, pack.packed_at, latest) {
        (Some(window), Some(packed_at), Some(latest)) => latest - packed_at < window,
        _ => false,
    }
}

fn error(event: &EpcisEvent, message: String) -> NewFinding {
    NewFinding::error(
        Stage::Aggregation,
        format!("{} #{}: {}", event.kind, event.index + 1, message),
    )
    .for_event(event.index)
}
