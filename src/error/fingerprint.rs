//! Deterministic error fingerprinting
//!
//! Two captures of the identical error must collapse to the same identity
//! without a server round trip. The identity is a reversible hex encoding of
//! the mechanism plus the error's distinguishing fields, not a cryptographic
//! hash; stability and low collision for realistic inputs are all that is
//! required.

use crate::signal::{ErrorMechanism, ErrorSignal};

/// Join the mechanism and distinguishing fields with `-` and hex-encode the
/// result. Pure: identical inputs always yield identical output, and field
/// order is significant.
pub fn fingerprint(mechanism: ErrorMechanism, parts: &[&str]) -> String {
    let mut joined = String::from(mechanism.as_str());
    for part in parts {
        joined.push('-');
        joined.push_str(part);
    }
    hex::encode(joined.as_bytes())
}

/// Identity of an error signal: mechanism + message + locator, matching what
/// the acquisition layer observes for each mechanism (file name for JS
/// errors, resource URL for load failures, status text for HTTP failures).
///
/// Returns `None` when every identity field is empty; whether such records
/// are still reported is a configuration decision
/// (`EngineConfig::report_unfingerprinted`).
pub fn fingerprint_signal(signal: &ErrorSignal) -> Option<String> {
    if signal.message.is_empty() && signal.locator.is_empty() {
        return None;
    }
    Some(fingerprint(
        signal.mechanism,
        &[&signal.message, &signal.locator],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn signal(message: &str, locator: &str) -> ErrorSignal {
        ErrorSignal {
            mechanism: ErrorMechanism::Js,
            message: message.to_string(),
            error_type: "TypeError".to_string(),
            stack: None,
            locator: locator.to_string(),
            meta: Value::Null,
        }
    }

    #[test]
    fn test_fingerprint_is_pure() {
        let a = fingerprint(ErrorMechanism::Js, &["x is not a function", "app.js"]);
        let b = fingerprint(ErrorMechanism::Js, &["x is not a function", "app.js"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_one_character_change_changes_identity() {
        let a = fingerprint(ErrorMechanism::Js, &["x is not a function", "app.js"]);
        let b = fingerprint(ErrorMechanism::Js, &["y is not a function", "app.js"]);
        let c = fingerprint(ErrorMechanism::Js, &["x is not a function", "app.ts"]);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_mechanism_distinguishes_identity() {
        let js = fingerprint(ErrorMechanism::Js, &["timeout", "main.js"]);
        let http = fingerprint(ErrorMechanism::Http, &["timeout", "main.js"]);
        assert_ne!(js, http);
    }

    #[test]
    fn test_encoding_is_reversible() {
        let uid = fingerprint(ErrorMechanism::Cors, &["Script error."]);
        let decoded = hex::decode(uid).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "cors-Script error.");
    }

    #[test]
    fn test_no_collisions_for_realistic_corpus() {
        let corpus = [
            ("x is not defined", "bundle.js"),
            ("x is not defined", "vendor.js"),
            ("Cannot read properties of undefined", "bundle.js"),
            ("Failed to fetch", ""),
            ("Internal Server Error", "api/v1/users"),
            ("Not Found", "api/v1/users"),
        ];
        let mut uids: Vec<String> = corpus
            .iter()
            .map(|(msg, loc)| fingerprint(ErrorMechanism::Js, &[msg, loc]))
            .collect();
        uids.sort();
        uids.dedup();
        assert_eq!(uids.len(), corpus.len());
    }

    #[test]
    fn test_signal_without_identity_fields_yields_none() {
        assert!(fingerprint_signal(&signal("", "")).is_none());
        assert!(fingerprint_signal(&signal("boom", "")).is_some());
        assert!(fingerprint_signal(&signal("", "app.js")).is_some());
    }
}
