//! Field stage: per-event presence and format checks
//!
//! Findings are emitted event by event; within one event they are ordered
//! by field name so output is reproducible regardless of check order.

use super::identifiers::{is_sgln, is_valid_epc};
use super::vocabulary::{
    allowed_dispositions, is_iso_date, is_known_biz_step, is_known_disposition, is_valid_timezone_offset,
};
use super::{DispositionRule, FindingSink, ValidationPolicy};
use crate::models::{Action, CbvVocabulary, EpcisEvent, EventKind, NewFinding, Stage, TypedValue};
use crate::parser::ParsedDocument;

/// Business transaction types expected on shipping events
const SHIPPING_TRANSACTION_TYPES: &[&str] = &["po", "desadv"];
/// Source / destination types expected on shipping events
const SHIPPING_PARTY_TYPES: &[&str] = &["owning_party", "location"];

pub fn check(doc: &ParsedDocument, policy: &ValidationPolicy, sink: &mut FindingSink) {
    for event in &doc.events {
        let mut found = EventFindings::new(event);
        check_event(event, policy, &mut found);
        sink.extend(found.into_sorted());
    }
}

/// Findings for one event, localized to it
struct EventFindings<'a> {
    event: &'a EpcisEvent,
    findings: Vec<NewFinding>,
}

impl<'a> EventFindings<'a> {
    fn new(event: &'a EpcisEvent) -> Self {
        Self {
            event,
            findings: Vec::new(),
        }
    }

    fn error(&mut self, field: &str, message: String, line: Option<u32>) {
        self.findings.push(
            NewFinding::error(Stage::Field, self.prefixed(message))
                .on_field(field)
                .for_event(self.event.index)
                .at_line(line.or(self.event.line)),
        );
    }

    fn warning(&mut self, field: &str, message: String) {
        self.findings.push(
            NewFinding::warning(Stage::Field, self.prefixed(message))
                .on_field(field)
                .for_event(self.event.index)
                .at_line(self.event.line),
        );
    }

    fn prefixed(&self, message: String) -> String {
        format!("{} #{}: {}", self.event.kind, self.event.index + 1, message)
    }

    fn into_sorted(mut self) -> Vec<NewFinding> {
        self.findings.sort_by(|a, b| a.field.cmp(&b.field));
        self.findings
    }
}

fn check_event(event: &EpcisEvent, policy: &ValidationPolicy, out: &mut EventFindings) {
    check_event_time(event, out);
    check_action(event, out);
    check_epcs(event, out);
    check_parent(event, out);
    check_vocabulary(event, out);
    check_step_disposition(event, policy.disposition_rule, out);
    check_locations(event, out);
    check_ilmd(event, out);
    if event.is_biz_step("shipping") {
        check_shipping(event, out);
    }
}

fn check_event_time(event: &EpcisEvent, out: &mut EventFindings) {
    match event.event_time.as_deref() {
        None => out.error("eventTime", "missing required field eventTime".to_string(), None),
        Some(raw) if event.parsed_event_time().is_none() => out.error(
            "eventTime",
            format!("eventTime '{}' is not a valid RFC 3339 timestamp", raw),
            None,
        ),
        Some(_) => {}
    }

    match event.event_time_zone_offset.as_deref() {
        None => out.error(
            "eventTimeZoneOffset",
            "missing required field eventTimeZoneOffset".to_string(),
            None,
        ),
        Some(raw) if !is_valid_timezone_offset(raw) => out.error(
            "eventTimeZoneOffset",
            format!("eventTimeZoneOffset '{}' must be ±HH:MM with hours up to 14 and quarter-hour minutes", raw),
            None,
        ),
        Some(_) => {}
    }
}

fn check_action(event: &EpcisEvent, out: &mut EventFindings) {
    if !event.kind.requires_action() {
        return;
    }
    match event.action.as_deref() {
        None => out.error("action", "missing required field action".to_string(), None),
        Some(raw) if raw.parse::<Action>().is_err() => out.error(
            "action",
            format!("action '{}' must be ADD, OBSERVE or DELETE", raw),
            None,
        ),
        Some(_) => {}
    }
}

fn check_epcs(event: &EpcisEvent, out: &mut EventFindings) {
    let field = event.kind.epc_field();

    // DELETE with a parent and no children means "unpack everything"
    let unpack_all = event.kind == EventKind::AggregationEvent
        && event.parsed_action() == Some(Action::Delete)
        && event.parent_id.is_some();

    if event.epcs.is_empty() && !unpack_all {
        out.error(field, format!("{} must not be empty", field), None);
    }

    for epc in &event.epcs {
        if !is_valid_epc(&epc.value) {
            out.error(field, format!("invalid EPC '{}' in {}", epc.value, field), epc.line);
        }
    }

    if event.kind == EventKind::TransformationEvent {
        if event.output_epcs.is_empty() {
            out.error("outputEPCList", "outputEPCList must not be empty".to_string(), None);
        }
        for epc in &event.output_epcs {
            if !is_valid_epc(&epc.value) {
                out.error(
                    "outputEPCList",
                    format!("invalid EPC '{}' in outputEPCList", epc.value),
                    epc.line,
                );
            }
        }
    }
}

fn check_parent(event: &EpcisEvent, out: &mut EventFindings) {
    match event.parent_id.as_deref() {
        None => {
            let needs_parent = event.kind == EventKind::AggregationEvent
                && matches!(event.parsed_action(), Some(Action::Add | Action::Delete));
            if needs_parent {
                out.error(
                    "parentID",
                    "parentID is required for AggregationEvent ADD/DELETE".to_string(),
                    None,
                );
            }
        }
        Some(parent) if !is_valid_epc(parent) => {
            out.error("parentID", format!("invalid parentID '{}'", parent), None)
        }
        Some(_) => {}
    }
}

fn check_vocabulary(event: &EpcisEvent, out: &mut EventFindings) {
    match (event.biz_step.as_deref(), event.biz_step_term()) {
        (None, _) => out.warning("bizStep", "recommended field bizStep is missing".to_string()),
        (Some(_), Some(term)) if is_known_biz_step(term) => {}
        (Some(raw), _) => out.error(
            "bizStep",
            format!("bizStep '{}' is not a CBV business step", raw),
            None,
        ),
    }

    match (event.disposition.as_deref(), event.disposition_term()) {
        (None, _) => out.warning("disposition", "recommended field disposition is missing".to_string()),
        (Some(_), Some(term)) if is_known_disposition(term) => {}
        (Some(raw), _) => out.error(
            "disposition",
            format!("disposition '{}' is not a CBV disposition", raw),
            None,
        ),
    }
}

/// Known step with a known disposition the step does not allow
fn check_step_disposition(event: &EpcisEvent, rule: DispositionRule, out: &mut EventFindings) {
    if rule == DispositionRule::Off {
        return;
    }
    let (Some(step), Some(disposition)) = (event.biz_step_term(), event.disposition_term()) else {
        return;
    };
    if !is_known_disposition(disposition) {
        return;
    }
    let Some(allowed) = allowed_dispositions(step) else {
        return;
    };
    if allowed.contains(&disposition) {
        return;
    }

    let message = format!(
        "disposition '{}' is not allowed for {} (expected {})",
        disposition,
        step,
        allowed.join(" or ")
    );
    match rule {
        DispositionRule::Error => out.error("disposition", message, None),
        DispositionRule::Warning => out.warning("disposition", message),
        DispositionRule::Off => {}
    }
}

fn check_locations(event: &EpcisEvent, out: &mut EventFindings) {
    match event.read_point.as_deref() {
        None => out.warning("readPoint", "recommended field readPoint is missing".to_string()),
        Some(raw) if !is_sgln(raw) => out.error(
            "readPoint",
            format!("readPoint '{}' is not an SGLN URI", raw),
            None,
        ),
        Some(_) => {}
    }

    if let Some(raw) = event.biz_location.as_deref() {
        if !is_sgln(raw) {
            out.error(
                "bizLocation",
                format!("bizLocation '{}' is not an SGLN URI", raw),
                None,
            );
        }
    }
}

fn check_ilmd(event: &EpcisEvent, out: &mut EventFindings) {
    let Some(ilmd) = event.ilmd.as_ref() else {
        return;
    };
    if !event.is_biz_step("commissioning") {
        return;
    }

    if ilmd.lot_number.is_none() {
        out.error("ilmd", "commissioning ILMD is missing lotNumber".to_string(), None);
    }
    match ilmd.item_expiration_date.as_deref() {
        None => out.error(
            "ilmd",
            "commissioning ILMD is missing itemExpirationDate".to_string(),
            None,
        ),
        Some(raw) if !is_iso_date(raw) => out.error(
            "ilmd",
            format!("itemExpirationDate '{}' must be YYYY-MM-DD", raw),
            None,
        ),
        Some(_) => {}
    }
}

fn check_shipping(event: &EpcisEvent, out: &mut EventFindings) {
    for &kind in SHIPPING_TRANSACTION_TYPES {
        if !event
            .biz_transactions
            .iter()
            .any(|t| t.is_kind(CbvVocabulary::BusinessTransactionType, kind))
        {
            out.warning(
                "bizTransactionList",
                format!("shipping event has no '{}' business transaction", kind),
            );
        }
    }

    check_parties(&event.sources, "sourceList", out);
    check_parties(&event.destinations, "destinationList", out);
}

fn check_parties(entries: &[TypedValue], field: &str, out: &mut EventFindings) {
    for &kind in SHIPPING_PARTY_TYPES {
        if !entries
            .iter()
            .any(|e| e.is_kind(CbvVocabulary::SourceDestinationType, kind))
        {
            out.warning(field, format!("shipping event {} has no '{}' entry", field, kind));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EpcRef, Ilmd, Severity};
    use crate::parser::DocumentShape;

    fn doc_with(events: Vec<EpcisEvent>) -> ParsedDocument {
        ParsedDocument {
            content_type: crate::models::ContentType::Json,
            shape: DocumentShape::default(),
            instance_identifier: None,
            events,
            findings: Vec::new(),
        }
    }

    fn complete_event() -> EpcisEvent {
        let mut e = EpcisEvent::new(0, EventKind::ObjectEvent, Some(5));
        e.event_time = Some("2025-02-01T10:00:00Z".to_string());
        e.event_time_zone_offset = Some("+00:00".to_string());
        e.action = Some("ADD".to_string());
        e.epcs = vec![EpcRef::new("urn:epc:id:sgtin:0614141.107346.1", Some(9))];
        e.biz_step = Some("urn:epcglobal:cbv:bizstep:commissioning".to_string());
        e.disposition = Some("urn:epcglobal:cbv:disp:active".to_string());
        e.read_point = Some("urn:epc:id:sgln:0614141.07346.1234".to_string());
        e.ilmd = Some(Ilmd {
            lot_number: Some("LOT-1".to_string()),
            item_expiration_date: Some("2027-01-31".to_string()),
        });
        e
    }

    fn run(events: Vec<EpcisEvent>) -> Vec<NewFinding> {
        run_with(events, ValidationPolicy::default())
    }

    fn run_with(events: Vec<EpcisEvent>, policy: ValidationPolicy) -> Vec<NewFinding> {
        let mut sink = FindingSink::new();
        check(&doc_with(events), &policy, &mut sink);
        sink.into_findings()
    }

    #[test]
    fn test_complete_event_is_clean() {
        assert!(run(vec![complete_event()]).is_empty());
    }

    #[test]
    fn test_missing_event_time_is_single_error() {
        let mut e = complete_event();
        e.event_time = None;
        let found = run(vec![e]);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Error);
        assert!(found[0].message.contains("eventTime"));
        assert_eq!(found[0].line_number, Some(5));
    }

    #[test]
    fn test_findings_sorted_by_field_name() {
        let mut e = complete_event();
        e.read_point = None;
        e.action = Some("UPSERT".to_string());
        e.event_time_zone_offset = Some("+25:00".to_string());
        e.epcs.push(EpcRef::new("not-an-epc", Some(10)));

        let fields: Vec<String> = run(vec![e])
            .into_iter()
            .map(|f| f.field.unwrap_or_default())
            .collect();
        assert_eq!(fields, vec!["action", "epcList", "eventTimeZoneOffset", "readPoint"]);
    }

    #[test]
    fn test_bad_epc_localized_to_its_line() {
        let mut e = complete_event();
        e.epcs.push(EpcRef::new("urn:epc:id:sgtin:bad", Some(11)));
        let found = run(vec![e]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line_number, Some(11));
    }

    #[test]
    fn test_unpack_all_may_omit_children() {
        let mut e = complete_event();
        e.kind = EventKind::AggregationEvent;
        e.action = Some("DELETE".to_string());
        e.parent_id = Some("urn:epc:id:sscc:0614141.1234567890".to_string());
        e.epcs.clear();
        e.ilmd = None;
        assert!(run(vec![e.clone()]).is_empty());

        e.parent_id = None;
        let found = run(vec![e]);
        let fields: Vec<&str> = found.iter().filter_map(|f| f.field.as_deref()).collect();
        assert_eq!(fields, vec!["childEPCs", "parentID"]);
    }

    #[test]
    fn test_commissioning_ilmd_requirements() {
        let mut e = complete_event();
        e.ilmd = Some(Ilmd {
            lot_number: None,
            item_expiration_date: Some("31.01.2027".to_string()),
        });
        let found = run(vec![e]);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|f| f.field.as_deref() == Some("ilmd") && f.is_error()));
    }

    #[test]
    fn test_shipping_recommendations_are_warnings() {
        let mut e = complete_event();
        e.ilmd = None;
        e.action = Some("OBSERVE".to_string());
        e.biz_step = Some("shipping".to_string());
        e.disposition = Some("in_transit".to_string());
        e.biz_transactions.push(TypedValue {
            kind: Some("urn:epcglobal:cbv:btt:po".to_string()),
            value: "urn:epcglobal:cbv:bt:0614141073467:PO-1".to_string(),
        });

        let found = run(vec![e]);
        assert!(found.iter().all(|f| f.severity == Severity::Warning));
        // desadv + 2 sources + 2 destinations
        assert_eq!(found.len(), 5);
        assert_eq!(found[0].field.as_deref(), Some("bizTransactionList"));
    }

    #[test]
    fn test_unknown_vocabulary_is_error() {
        let mut e = complete_event();
        e.biz_step = Some("urn:epcglobal:cbv:bizstep:teleporting".to_string());
        e.ilmd = None;
        let found = run(vec![e]);
        assert_eq!(found.len(), 1);
        assert!(found[0].is_error());
        assert_eq!(found[0].field.as_deref(), Some("bizStep"));
    }

    #[test]
    fn test_foreign_vocabulary_namespaces_are_errors() {
        for step in [
            "urn:acme:custom:storing",
            "urn:epcglobal:cbv:disp:storing",
            "https://evil.example/x/storing",
        ] {
            let mut e = complete_event();
            e.biz_step = Some(step.to_string());
            e.ilmd = None;
            let found = run(vec![e]);
            assert_eq!(found.len(), 1, "{}", step);
            assert!(found[0].is_error());
            assert_eq!(found[0].field.as_deref(), Some("bizStep"));
        }

        let mut e = complete_event();
        e.disposition = Some("urn:epcglobal:cbv:bizstep:active".to_string());
        let found = run(vec![e]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field.as_deref(), Some("disposition"));
    }

    #[test]
    fn test_disposition_must_suit_business_step() {
        let mut e = complete_event();
        e.ilmd = None;
        e.biz_step = Some("urn:epcglobal:cbv:bizstep:shipping".to_string());
        e.disposition = Some("urn:epcglobal:cbv:disp:active".to_string());
        e.biz_transactions = vec![
            TypedValue {
                kind: Some("po".to_string()),
                value: "urn:epcglobal:cbv:bt:0614141073467:PO-1".to_string(),
            },
            TypedValue {
                kind: Some("desadv".to_string()),
                value: "urn:epcglobal:cbv:bt:0614141073467:ASN-1".to_string(),
            },
        ];
        let parties = vec![
            TypedValue {
                kind: Some("owning_party".to_string()),
                value: "urn:epc:id:sgln:0614141.00001.0".to_string(),
            },
            TypedValue {
                kind: Some("location".to_string()),
                value: "urn:epc:id:sgln:0614141.00001.0".to_string(),
            },
        ];
        e.sources = parties.clone();
        e.destinations = parties;

        let found = run(vec![e.clone()]);
        assert_eq!(found.len(), 1);
        assert!(found[0].is_error());
        assert_eq!(found[0].field.as_deref(), Some("disposition"));
        assert!(found[0].message.contains("in_transit"));

        let warned = run_with(
            vec![e.clone()],
            ValidationPolicy {
                disposition_rule: DispositionRule::Warning,
                ..Default::default()
            },
        );
        assert_eq!(warned.len(), 1);
        assert_eq!(warned[0].severity, Severity::Warning);

        let off = run_with(
            vec![e.clone()],
            ValidationPolicy {
                disposition_rule: DispositionRule::Off,
                ..Default::default()
            },
        );
        assert!(off.is_empty());

        e.disposition = Some("in_transit".to_string());
        assert!(run(vec![e]).is_empty());
    }

    #[test]
    fn test_unrestricted_step_accepts_any_disposition() {
        let mut e = complete_event();
        e.ilmd = None;
        e.biz_step = Some("inspecting".to_string());
        e.disposition = Some("damaged".to_string());
        assert!(run(vec![e]).is_empty());
    }
}
