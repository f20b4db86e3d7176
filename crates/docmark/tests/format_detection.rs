//! Format sniffing integration tests.

use docmark::core::formats;
use docmark::{CandidateSource, FormatSniffer, InputDocument};
use proptest::prelude::*;

fn formats_of(sniffer: &FormatSniffer, bytes: &[u8], filename: &str, declared: Option<&str>) -> Vec<&'static str> {
    sniffer
        .sniff(bytes, filename, declared)
        .into_iter()
        .map(|candidate| candidate.format)
        .collect()
}

#[test]
fn test_signature_outranks_extension_and_declared_type() {
    let sniffer = FormatSniffer::default();
    let candidates = sniffer.sniff(b"%PDF-1.7\n%binary", "notes.txt", Some("text/html"));

    assert_eq!(candidates[0].format, formats::PDF);
    assert_eq!(candidates[0].source, CandidateSource::Signature);
    assert_eq!(
        candidates.iter().map(|c| c.format).collect::<Vec<_>>(),
        vec![formats::PDF, formats::TEXT, formats::HTML]
    );
}

#[test]
fn test_extension_is_used_without_signature() {
    let sniffer = FormatSniffer::default();
    assert_eq!(formats_of(&sniffer, b"a,b\n1,2\n", "table.csv", None), vec![formats::CSV]);
}

#[test]
fn test_unknown_without_any_hint() {
    let sniffer = FormatSniffer::default();
    let candidates = sniffer.sniff(&[0x00, 0x13, 0x37, 0x42], "", None);

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].format, formats::UNKNOWN);
    assert_eq!(candidates[0].source, CandidateSource::Fallback);
}

#[test]
fn test_declared_type_follows_fallback() {
    let sniffer = FormatSniffer::default();
    assert_eq!(
        formats_of(&sniffer, &[0x00, 0x01], "", Some("text/csv")),
        vec![formats::UNKNOWN, formats::CSV]
    );
}

#[test]
fn test_sniff_document_matches_sniff() {
    let sniffer = FormatSniffer::default();
    let document = InputDocument::new(b"<!DOCTYPE html><html></html>".to_vec(), "page.htm").with_content_type("text/html");

    assert_eq!(
        sniffer.sniff_document(&document),
        sniffer.sniff(document.bytes(), document.filename(), document.content_type())
    );
}

proptest! {
    #[test]
    fn prop_candidates_are_nonempty_unique_and_deterministic(
        bytes in proptest::collection::vec(any::<u8>(), 0..512),
        filename in "[a-z]{0,8}(\\.(pdf|txt|csv|docx|png|mp3|bin))?",
        declared in proptest::option::of(prop_oneof![
            Just("application/pdf"),
            Just("text/plain"),
            Just("application/x-unknown"),
        ]),
    ) {
        let sniffer = FormatSniffer::default();
        let first = sniffer.sniff(&bytes, &filename, declared);
        let second = sniffer.sniff(&bytes, &filename, declared);

        prop_assert!(!first.is_empty());
        prop_assert_eq!(&first, &second);

        let mut seen = std::collections::HashSet::new();
        for candidate in &first {
            prop_assert!(seen.insert(candidate.format), "duplicate candidate {}", candidate.format);
        }
    }
}
