//! Sequence stage: cross-event ordering per EPC
//!
//! Events without a parseable time are skipped here; the field stage has
//! already reported them.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use super::{sort_by_event, FindingSink, ValidationPolicy};
use crate::models::{EpcisEvent, NewFinding, Stage};
use crate::parser::ParsedDocument;

#[derive(Default)]
struct EpcHistory {
    latest_time: Option<DateTime<Utc>>,
    /// Event index of a shipment not yet followed by a receive
    open_shipment: Option<usize>,
}

pub fn check(doc: &ParsedDocument, _policy: &ValidationPolicy, sink: &mut FindingSink) {
    let mut history: HashMap<&str, EpcHistory> = HashMap::new();
    let mut observed: HashSet<(&str, DateTime<Utc>)> = HashSet::new();
    let mut findings = Vec::new();

    for event in &doc.events {
        let Some(time) = event.parsed_event_time() else {
            continue;
        };

        let epcs = distinct_epcs(event);
        let shipping = event.is_biz_step("shipping");
        let receiving = event.is_biz_step("receiving");
        let mut regressed_epc: Option<(&str, DateTime<Utc>)> = None;

        for &epc in &epcs {
            let entry = history.entry(epc).or_default();

            if let Some(previous) = entry.latest_time {
                if time < previous && !event.out_of_order && regressed_epc.is_none() {
                    regressed_epc = Some((epc, previous));
                }
            }
            entry.latest_time = Some(entry.latest_time.map_or(time, |prev| prev.max(time)));

            if !observed.insert((epc, time)) {
                findings.push(error(
                    event,
                    format!("EPC {} observed twice at {}", epc, time.to_rfc3339()),
                ));
            }

            if shipping {
                if let Some(first) = entry.open_shipment {
                    findings.push(error(
                        event,
                        format!(
                            "EPC {} shipped again without an intervening receive (previous shipment in event #{})",
                            epc,
                            first + 1
                        ),
                    ));
                }
                entry.open_shipment = Some(event.index);
            } else if receiving {
                entry.open_shipment = None;
            }
        }

        // One ordering error per offending event, however many EPCs regress
        if let Some((epc, previous)) = regressed_epc {
            findings.push(error(
                event,
                format!(
                    "event time {} is earlier than {} already recorded for EPC {}",
                    time.to_rfc3339(),
                    previous.to_rfc3339(),
                    epc
                ),
            ));
        }
    }

    sort_by_event(&mut findings);
    sink.extend(findings);
}

/// EPCs of the event in first-seen order, each once
fn distinct_epcs(event: &EpcisEvent) -> Vec<&str> {
    let mut seen = HashSet::new();
    event
        .all_epcs()
        .map(|epc| epc.value.as_str())
        .filter(|epc| !epc.is_empty() && seen.insert(*epc))
        .collect()
}

fn error(event: &EpcisEvent, message: String) -> NewFinding {
    NewFinding::error(
        Stage::Sequence,
        format!("{} #{}: {}", event.kind, event.index + 1, message),
    )
    .for_event(event.index)
    .at_line(event.line)
}
