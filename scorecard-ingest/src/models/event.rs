//! Normalized EPCIS event
//!
//! Both the XML and JSON parsers produce this shape. Fields keep their raw
//! text so the field stage can report malformed values instead of the parser
//! silently dropping them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// EPCIS event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ObjectEvent,
    AggregationEvent,
    TransactionEvent,
    TransformationEvent,
    AssociationEvent,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::ObjectEvent,
        EventKind::AggregationEvent,
        EventKind::TransactionEvent,
        EventKind::TransformationEvent,
        EventKind::AssociationEvent,
    ];

    /// Match an element / `type` name to a known event kind
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ObjectEvent => "ObjectEvent",
            EventKind::AggregationEvent => "AggregationEvent",
            EventKind::TransactionEvent => "TransactionEvent",
            EventKind::TransformationEvent => "TransformationEvent",
            EventKind::AssociationEvent => "AssociationEvent",
        }
    }

    /// Name of the field holding this kind's primary EPC list
    pub fn epc_field(&self) -> &'static str {
        match self {
            EventKind::ObjectEvent | EventKind::TransactionEvent => "epcList",
            EventKind::AggregationEvent | EventKind::AssociationEvent => "childEPCs",
            EventKind::TransformationEvent => "inputEPCList",
        }
    }

    /// Transformation events are the only kind without an `action`
    pub fn requires_action(&self) -> bool {
        !matches!(self, EventKind::TransformationEvent)
    }

    /// Events whose EPC list describes parent/child containment
    pub fn is_containment(&self) -> bool {
        matches!(self, EventKind::AggregationEvent | EventKind::AssociationEvent)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// EPCIS `action` value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Add,
    Observe,
    Delete,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ADD" => Ok(Action::Add),
            "OBSERVE" => Ok(Action::Observe),
            "DELETE" => Ok(Action::Delete),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

/// One EPC with the line it appeared on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpcRef {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl EpcRef {
    pub fn new(value: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            value: value.into(),
            line,
        }
    }
}

/// `type` + value pair used by business transactions, sources and destinations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub value: String,
}

impl TypedValue {
    /// True when the type is `term` within `vocabulary` (`po`, `owning_party`, ...)
    pub fn is_kind(&self, vocabulary: CbvVocabulary, term: &str) -> bool {
        self.kind.as_deref().and_then(|k| cbv_term(k, vocabulary)) == Some(term)
    }
}

/// Instance/lot master data carried by commissioning events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ilmd {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_expiration_date: Option<String>,
}

/// One parsed event, immutable once the parser hands it over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpcisEvent {
    /// 0-based position in the document's event list
    pub index: usize,
    pub kind: EventKind,
    /// Line of the event's opening element / object
    pub line: Option<u32>,
    pub event_time: Option<String>,
    pub event_time_zone_offset: Option<String>,
    pub action: Option<String>,
    /// epcList / childEPCs / inputEPCList depending on kind
    pub epcs: Vec<EpcRef>,
    /// Transformation events only
    pub output_epcs: Vec<EpcRef>,
    pub parent_id: Option<String>,
    pub biz_step: Option<String>,
    pub disposition: Option<String>,
    pub read_point: Option<String>,
    pub biz_location: Option<String>,
    pub biz_transactions: Vec<TypedValue>,
    pub sources: Vec<TypedValue>,
    pub destinations: Vec<TypedValue>,
    pub ilmd: Option<Ilmd>,
    /// Set by an `errorDeclaration` block or an explicit `outOfOrder` flag
    pub out_of_order: bool,
}

impl EpcisEvent {
    pub fn new(index: usize, kind: EventKind, line: Option<u32>) -> Self {
        Self {
            index,
            kind,
            line,
            event_time: None,
            event_time_zone_offset: None,
            action: None,
            epcs: Vec::new(),
            output_epcs: Vec::new(),
            parent_id: None,
            biz_step: None,
            disposition: None,
            read_point: None,
            biz_location: None,
            biz_transactions: Vec::new(),
            sources: Vec::new(),
            destinations: Vec::new(),
            ilmd: None,
            out_of_order: false,
        }
    }

    /// Event time as UTC, `None` when absent or unparseable
    pub fn parsed_event_time(&self) -> Option<DateTime<Utc>> {
        self.event_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn parsed_action(&self) -> Option<Action> {
        self.action.as_deref().and_then(|a| a.parse().ok())
    }

    /// Bare CBV business step (`shipping`), whichever URI form was used.
    /// `None` when absent or written in a foreign namespace.
    pub fn biz_step_term(&self) -> Option<&str> {
        self.biz_step
            .as_deref()
            .and_then(|v| cbv_term(v, CbvVocabulary::BizStep))
    }

    pub fn disposition_term(&self) -> Option<&str> {
        self.disposition
            .as_deref()
            .and_then(|v| cbv_term(v, CbvVocabulary::Disposition))
    }

    pub fn is_biz_step(&self, term: &str) -> bool {
        self.biz_step_term() == Some(term)
    }

    /// Every EPC this event touches, outputs included
    pub fn all_epcs(&self) -> impl Iterator<Item = &EpcRef> {
        self.epcs.iter().chain(self.output_epcs.iter())
    }
}

/// CBV vocabularies carried by event fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CbvVocabulary {
    BizStep,
    Disposition,
    BusinessTransactionType,
    SourceDestinationType,
}

impl CbvVocabulary {
    /// Segment used in `urn:epcglobal:cbv:<segment>:<term>`
    fn urn_segment(self) -> &'static str {
        match self {
            CbvVocabulary::BizStep => "bizstep",
            CbvVocabulary::Disposition => "disp",
            CbvVocabulary::BusinessTransactionType => "btt",
            CbvVocabulary::SourceDestinationType => "sdt",
        }
    }

    /// Prefix used in `https://ref.gs1.org/cbv/<Prefix>-<term>`
    fn web_prefix(self) -> &'static str {
        match self {
            CbvVocabulary::BizStep => "BizStep",
            CbvVocabulary::Disposition => "Disp",
            CbvVocabulary::BusinessTransactionType => "BTT",
            CbvVocabulary::SourceDestinationType => "SDT",
        }
    }
}

const CBV_URN_PREFIX: &str = "urn:epcglobal:cbv:";
const CBV_WEB_PREFIX: &str = "https://ref.gs1.org/cbv/";

/// Reduce a CBV value to its bare term within one vocabulary
///
/// Accepts `urn:epcglobal:cbv:bizstep:shipping`,
/// `https://ref.gs1.org/cbv/BizStep-shipping` and plain `shipping`.
/// Any other namespace, or another vocabulary's URI, yields `None`.
pub fn cbv_term(value: &str, vocabulary: CbvVocabulary) -> Option<&str> {
    let value = value.trim();

    if let Some(rest) = value.strip_prefix(CBV_URN_PREFIX) {
        let (segment, term) = rest.split_once(':')?;
        return (segment.eq_ignore_ascii_case(vocabulary.urn_segment()) && is_bare_term(term))
            .then_some(term);
    }

    if let Some(rest) = value.strip_prefix(CBV_WEB_PREFIX) {
        let (prefix, term) = rest.split_once('-')?;
        return (prefix.eq_ignore_ascii_case(vocabulary.web_prefix()) && is_bare_term(term))
            .then_some(term);
    }

    is_bare_term(value).then_some(value)
}

fn is_bare_term(value: &str) -> bool {
    !value.is_empty() && !value.contains([':', '/'])
}
