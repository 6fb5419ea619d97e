//! GS1 EPC pure-identity URI patterns

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpcScheme {
    Sgtin,
    Sscc,
    Sgln,
    Grai,
    Giai,
}

static SGTIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^urn:epc:id:sgtin:\d+\.\d+\.[A-Za-z0-9]{1,20}$").expect("sgtin pattern"));
static SSCC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^urn:epc:id:sscc:\d+\.\d+$").expect("sscc pattern"));
static SGLN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^urn:epc:id:sgln:\d+\.\d*(\.[A-Za-z0-9_-]{0,20})?$").expect("sgln pattern")
});
static GRAI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^urn:epc:id:grai:\d+\.\d*\.[A-Za-z0-9]{1,16}$").expect("grai pattern"));
static GIAI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^urn:epc:id:giai:\d+\.[A-Za-z0-9]{1,30}$").expect("giai pattern"));

/// Scheme of a well-formed EPC URI, `None` when it matches no pattern
pub fn classify(epc: &str) -> Option<EpcScheme> {
    let epc = epc.trim();
    [
        (EpcScheme::Sgtin, &*SGTIN),
        (EpcScheme::Sscc, &*SSCC),
        (EpcScheme::Sgln, &*SGLN),
        (EpcScheme::Grai, &*GRAI),
        (EpcScheme::Giai, &*GIAI),
    ]
    .into_iter()
    .find(|(_, pattern)| pattern.is_match(epc))
    .map(|(scheme, _)| scheme)
}

pub fn is_valid_epc(epc: &str) -> bool {
    classify(epc).is_some()
}

pub fn is_sgln(value: &str) -> bool {
    classify(value) == Some(EpcScheme::Sgln)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_schemes() {
        assert_eq!(classify("urn:epc:id:sgtin:0614141.107346.2017"), Some(EpcScheme::Sgtin));
        assert_eq!(classify("urn:epc:id:sscc:0614141.1234567890"), Some(EpcScheme::Sscc));
        assert_eq!(classify("urn:epc:id:sgln:0614141.07346.1234"), Some(EpcScheme::Sgln));
        assert_eq!(classify("urn:epc:id:sgln:0614141.00001.0"), Some(EpcScheme::Sgln));
        assert_eq!(classify("urn:epc:id:grai:0614141.12345.400"), Some(EpcScheme::Grai));
        assert_eq!(classify("urn:epc:id:giai:0614141.ABC123"), Some(EpcScheme::Giai));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(!is_valid_epc("urn:epc:id:sgtin:0614141.107346"));
        assert!(!is_valid_epc("urn:epc:id:sgtin:0614141.107346.TOO-LONG-SERIAL-NUMBER-123"));
        assert!(!is_valid_epc("urn:epc:id:sscc:ABC.123"));
        assert!(!is_valid_epc("sgtin:0614141.107346.1"));
        assert!(!is_valid_epc(""));
        assert!(!is_sgln("urn:epc:id:sgtin:0614141.107346.2017"));
    }
}
