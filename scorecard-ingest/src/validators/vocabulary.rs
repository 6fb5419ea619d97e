//! CBV vocabulary and simple format checks

use chrono::NaiveDate;

/// CBV business steps (bare terms)
pub const BIZ_STEPS: &[&str] = &[
    "accepting",
    "arriving",
    "assembling",
    "collecting",
    "commissioning",
    "consigning",
    "creating_class_instance",
    "cycle_counting",
    "decommissioning",
    "departing",
    "destroying",
    "disassembling",
    "dispensing",
    "encoding",
    "entering_exiting",
    "holding",
    "inspecting",
    "installing",
    "killing",
    "loading",
    "other",
    "packing",
    "picking",
    "receiving",
    "removing",
    "repackaging",
    "repairing",
    "replacing",
    "reserving",
    "retail_selling",
    "shipping",
    "staging_outbound",
    "stock_taking",
    "stocking",
    "storing",
    "transporting",
    "unloading",
    "unpacking",
    "void_shipping",
];

/// CBV dispositions (bare terms)
pub const DISPOSITIONS: &[&str] = &[
    "active",
    "available",
    "completeness_inferred",
    "completeness_verified",
    "conformant",
    "container_closed",
    "container_open",
    "damaged",
    "destroyed",
    "dispensed",
    "disposed",
    "encoded",
    "expired",
    "in_progress",
    "in_transit",
    "inactive",
    "mismatch_instance",
    "mismatch_class",
    "mismatch_quantity",
    "needs_replacement",
    "no_pedigree_match",
    "non_conformant",
    "non_sellable_other",
    "partially_dispensed",
    "recalled",
    "reserved",
    "retail_sold",
    "returned",
    "sellable_accessible",
    "sellable_not_accessible",
    "stolen",
    "unavailable",
    "unknown",
];

/// Dispositions a chain-of-custody step may leave product in
///
/// Steps not listed here accept any CBV disposition.
const STEP_DISPOSITIONS: &[(&str, &[&str])] = &[
    ("commissioning", &["active", "in_progress"]),
    ("packing", &["active", "in_progress"]),
    ("shipping", &["in_transit"]),
    ("receiving", &["active", "in_progress"]),
    ("storing", &["active", "sellable_accessible"]),
    ("dispensing", &["dispensed", "partially_dispensed"]),
    ("decommissioning", &["destroyed", "expired", "recalled"]),
];

/// Allowed dispositions for a business step, if the step is restricted
pub fn allowed_dispositions(biz_step: &str) -> Option<&'static [&'static str]> {
    STEP_DISPOSITIONS
        .iter()
        .find(|(step, _)| *step == biz_step)
        .map(|(_, allowed)| *allowed)
}

pub fn is_known_biz_step(term: &str) -> bool {
    BIZ_STEPS.contains(&term)
}

pub fn is_known_disposition(term: &str) -> bool {
    DISPOSITIONS.contains(&term)
}

/// `±HH:MM`, hours 00-14, minutes on a quarter hour
pub fn is_valid_timezone_offset(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 6 || !matches!(bytes[0], b'+' | b'-') || bytes[3] != b':' {
        return false;
    }
    let digits = [bytes[1], bytes[2], bytes[4], bytes[5]];
    if !digits.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let hours = (bytes[1] - b'0') * 10 + (bytes[2] - b'0');
    let minutes = (bytes[4] - b'0') * 10 + (bytes[5] - b'0');
    hours <= 14 && matches!(minutes, 0 | 15 | 30 | 45) && !(hours == 14 && minutes != 0)
}

/// Calendar date in `YYYY-MM-DD` form
pub fn is_iso_date(value: &str) -> bool {
    value.len() == 10 && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}
