//! Format sniffing.
//!
//! Detection order:
//! 1. Byte signatures from [`SIGNATURES`], most specific first. A signature may require
//!    several byte runs at fixed offsets plus a marker anywhere inside the sniff window
//!    (the way OOXML packages are told apart from plain ZIP archives).
//! 2. The `infer` crate, when the local table has nothing to say.
//! 3. The filename extension.
//! 4. The generic [`formats::UNKNOWN`] candidate when nothing above resolved.
//!
//! The declared content type never displaces a detected candidate. It is appended last.

use crate::core::formats;
use crate::types::InputDocument;
use serde::Serialize;

/// Default number of leading bytes inspected.
pub const DEFAULT_SNIFF_WINDOW: usize = 8 * 1024;

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    Signature,
    Extension,
    Declared,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub format: &'static str,
    pub source: CandidateSource,
}

impl Candidate {
    fn new(format: &'static str, source: CandidateSource) -> Self {
        Self { format, source }
    }
}

struct Signature {
    format: &'static str,
    /// Byte runs that must all appear at their offsets.
    parts: &'static [(usize, &'static [u8])],
    /// Marker that must appear anywhere inside the sniff window.
    marker: Option<&'static [u8]>,
    /// Text signatures skip a BOM and leading whitespace and compare case-insensitively.
    text: bool,
    /// Structural check for magics short enough to occur in ordinary text.
    check: Option<fn(&[u8]) -> bool>,
}

impl Signature {
    const fn binary(format: &'static str, parts: &'static [(usize, &'static [u8])]) -> Self {
        Self {
            format,
            parts,
            marker: None,
            text: false,
            check: None,
        }
    }

    const fn checked(
        format: &'static str,
        parts: &'static [(usize, &'static [u8])],
        check: fn(&[u8]) -> bool,
    ) -> Self {
        Self {
            format,
            parts,
            marker: None,
            text: false,
            check: Some(check),
        }
    }

    const fn container(format: &'static str, parts: &'static [(usize, &'static [u8])], marker: &'static [u8]) -> Self {
        Self {
            format,
            parts,
            marker: Some(marker),
            text: false,
            check: None,
        }
    }

    const fn text(format: &'static str, parts: &'static [(usize, &'static [u8])]) -> Self {
        Self {
            format,
            parts,
            marker: None,
            text: true,
            check: None,
        }
    }

    fn specificity(&self) -> usize {
        self.parts.iter().map(|(_, bytes)| bytes.len()).sum::<usize>() + self.marker.map_or(0, <[u8]>::len)
    }

    fn matches(&self, window: &[u8], text_window: &[u8]) -> bool {
        let haystack = if self.text { text_window } else { window };
        let parts_match = self.parts.iter().all(|(offset, bytes)| {
            haystack
                .get(*offset..offset + bytes.len())
                .is_some_and(|slice| if self.text { slice.eq_ignore_ascii_case(bytes) } else { slice == *bytes })
        });
        parts_match
            && self.marker.is_none_or(|marker| contains(window, marker))
            && self.check.is_none_or(|check| check(window))
    }
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

static SIGNATURES: &[Signature] = &[
    Signature::binary(formats::PDF, &[(0, b"%PDF-")]),
    Signature::container(formats::DOCX, &[(0, ZIP_MAGIC)], b"word/"),
    Signature::container(formats::XLSX, &[(0, ZIP_MAGIC)], b"xl/"),
    Signature::container(formats::PPTX, &[(0, ZIP_MAGIC)], b"ppt/"),
    Signature::container(formats::EPUB, &[(0, ZIP_MAGIC)], b"mimetypeapplication/epub+zip"),
    Signature::binary(formats::ZIP, &[(0, ZIP_MAGIC)]),
    Signature::binary(formats::OLE, &[(0, b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1")]),
    Signature::binary(formats::RTF, &[(0, b"{\\rtf")]),
    Signature::binary(formats::PNG, &[(0, b"\x89PNG\r\n\x1a\n")]),
    Signature::binary(formats::JPEG, &[(0, b"\xFF\xD8\xFF")]),
    Signature::binary(formats::GIF, &[(0, b"GIF87a")]),
    Signature::binary(formats::GIF, &[(0, b"GIF89a")]),
    Signature::checked(formats::BMP, &[(0, b"BM")], bmp_header),
    Signature::binary(formats::TIFF, &[(0, b"II*\x00")]),
    Signature::binary(formats::TIFF, &[(0, b"MM\x00*")]),
    Signature::binary(formats::WEBP, &[(0, b"RIFF"), (8, b"WEBP")]),
    Signature::binary(formats::WAV, &[(0, b"RIFF"), (8, b"WAVE")]),
    Signature::binary(formats::AVI, &[(0, b"RIFF"), (8, b"AVI ")]),
    Signature::checked(formats::MP3, &[(0, b"ID3")], id3_header),
    Signature::checked(formats::MP3, &[(0, b"\xFF\xFB")], mpeg_frame_header),
    Signature::binary(formats::FLAC, &[(0, b"fLaC")]),
    Signature::binary(formats::OGG, &[(0, b"OggS")]),
    Signature::binary(formats::M4A, &[(4, b"ftypM4A ")]),
    Signature::binary(formats::MOV, &[(4, b"ftypqt  ")]),
    Signature::binary(formats::MP4, &[(4, b"ftyp")]),
    Signature::container(formats::WEBM, &[(0, b"\x1A\x45\xDF\xA3")], b"webm"),
    Signature::binary(formats::MKV, &[(0, b"\x1A\x45\xDF\xA3")]),
    Signature::text(formats::HTML, &[(0, b"<!doctype html")]),
    Signature::text(formats::HTML, &[(0, b"<html")]),
    Signature::text(formats::XML, &[(0, b"<?xml")]),
];

/// BITMAPFILEHEADER: reserved bytes zero and a known DIB header size at offset 14.
fn bmp_header(window: &[u8]) -> bool {
    let Some(header) = window.get(..18) else {
        return false;
    };
    let dib_size = u32::from_le_bytes([header[14], header[15], header[16], header[17]]);
    header[6..10].iter().all(|b| *b == 0) && matches!(dib_size, 12 | 16 | 40 | 52 | 56 | 64 | 108 | 124)
}

/// ID3v2 tag header: major version 2 to 4 and a synchsafe size.
fn id3_header(window: &[u8]) -> bool {
    let Some(header) = window.get(..10) else {
        return false;
    };
    (2..=4).contains(&header[3]) && header[4] != 0xFF && header[6..10].iter().all(|b| *b < 0x80)
}

/// MPEG-1 Layer III frame header: valid bitrate and sample-rate indexes.
fn mpeg_frame_header(window: &[u8]) -> bool {
    let Some(&flags) = window.get(2) else {
        return false;
    };
    let bitrate = flags >> 4;
    let sample_rate = (flags >> 2) & 0b11;
    bitrate != 0 && bitrate != 0xF && sample_rate != 0b11
}

/// Applies the structural checks of the local table to a format reported by `infer`,
/// which accepts the same short magics without them.
fn plausible(format: &str, window: &[u8]) -> bool {
    match format {
        formats::BMP => bmp_header(window),
        formats::MP3 => id3_header(window) || mpeg_frame_header(window),
        _ => true,
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}

/// Strip a UTF-8 BOM and leading ASCII whitespace.
fn text_start(window: &[u8]) -> &[u8] {
    let without_bom = window.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(window);
    let start = without_bom
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(without_bom.len());
    &without_bom[start..]
}

/// Infers candidate formats for a document.
#[derive(Debug, Clone, Copy)]
pub struct FormatSniffer {
    window: usize,
}

impl Default for FormatSniffer {
    fn default() -> Self {
        Self::new(DEFAULT_SNIFF_WINDOW)
    }
}

impl FormatSniffer {
    pub fn new(window: usize) -> Self {
        Self { window: window.max(16) }
    }

    pub fn sniff_document(&self, document: &InputDocument) -> Vec<Candidate> {
        self.sniff(document.bytes(), document.filename(), document.content_type())
    }

    /// Ordered, deduplicated candidates, most confident first.
    pub fn sniff(&self, bytes: &[u8], filename: &str, declared: Option<&str>) -> Vec<Candidate> {
        let window = &bytes[..bytes.len().min(self.window)];
        let mut candidates: Vec<Candidate> = Vec::new();

        for format in signature_matches(window) {
            push(Candidate::new(format, CandidateSource::Signature), &mut candidates);
        }

        if candidates.is_empty()
            && let Some(format) = infer::get(window)
                .and_then(|kind| formats::format_for_mime(kind.mime_type()))
                .filter(|format| plausible(format, window))
        {
            push(Candidate::new(format, CandidateSource::Signature), &mut candidates);
        }

        let extension_format = std::path::Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(formats::format_for_extension);
        if let Some(format) = extension_format {
            push(Candidate::new(format, CandidateSource::Extension), &mut candidates);
        }

        if candidates.is_empty() {
            push(Candidate::new(formats::UNKNOWN, CandidateSource::Fallback), &mut candidates);
        }

        if let Some(declared) = declared {
            match formats::format_for_mime(declared) {
                Some(format) => push(Candidate::new(format, CandidateSource::Declared), &mut candidates),
                None => tracing::debug!("Ignoring unrecognised declared content type '{}'", declared),
            }
        }

        tracing::debug!(
            filename,
            candidates = ?candidates.iter().map(|c| c.format).collect::<Vec<_>>(),
            "Sniffed candidate formats"
        );
        candidates
    }
}

fn push(candidate: Candidate, candidates: &mut Vec<Candidate>) {
    if !candidates.iter().any(|existing| existing.format == candidate.format) {
        candidates.push(candidate);
    }
}

/// Formats whose signatures match, most specific first, table order on ties.
fn signature_matches(window: &[u8]) -> Vec<&'static str> {
    let text_window = text_start(window);
    let mut matched: Vec<&Signature> = SIGNATURES
        .iter()
        .filter(|signature| signature.matches(window, text_window))
        .collect();
    matched.sort_by_key(|signature| std::cmp::Reverse(signature.specificity()));
    matched.into_iter().map(|signature| signature.format).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formats_of(candidates: &[Candidate]) -> Vec<&'static str> {
        candidates.iter().map(|c| c.format).collect()
    }

    #[test]
    fn test_pdf_signature_outranks_txt_extension() {
        let candidates = FormatSniffer::default().sniff(b"%PDF-1.7\n%\xE2\xE3", "notes.txt", None);
        assert_eq!(candidates[0].format, formats::PDF);
        assert_eq!(candidates[0].source, CandidateSource::Signature);
        assert_eq!(formats_of(&candidates), vec![formats::PDF, formats::TEXT]);
    }

    #[test]
    fn test_unknown_bytes_and_extension_yield_single_fallback() {
        let candidates = FormatSniffer::default().sniff(b"\x00\x13\x37 nothing here", "blob.zzqx", None);
        assert_eq!(candidates, vec![Candidate::new(formats::UNKNOWN, CandidateSource::Fallback)]);
    }

    #[test]
    fn test_ooxml_container_is_more_specific_than_zip() {
        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(b"\x14\x00\x06\x00[Content_Types].xml....word/document.xml");
        let candidates = FormatSniffer::default().sniff(&bytes, "upload", None);
        assert_eq!(formats_of(&candidates), vec![formats::DOCX, formats::ZIP]);
    }

    #[test]
    fn test_riff_subtypes_are_distinguished() {
        let wav = b"RIFF\x24\x00\x00\x00WAVEfmt ";
        let webp = b"RIFF\x24\x00\x00\x00WEBPVP8 ";
        assert_eq!(FormatSniffer::default().sniff(wav, "", None)[0].format, formats::WAV);
        assert_eq!(FormatSniffer::default().sniff(webp, "", None)[0].format, formats::WEBP);
    }

    #[test]
    fn test_text_signature_skips_bom_and_whitespace() {
        let html = b"\xEF\xBB\xBF\n  <!DOCTYPE HTML><html><body>hi</body></html>";
        let candidates = FormatSniffer::default().sniff(html, "page", None);
        assert_eq!(candidates[0].format, formats::HTML);
    }

    #[test]
    fn test_declared_type_is_appended_last() {
        let candidates = FormatSniffer::default().sniff(b"%PDF-1.4", "report.pdf", Some("text/html"));
        assert_eq!(formats_of(&candidates), vec![formats::PDF, formats::HTML]);
        assert_eq!(candidates[1].source, CandidateSource::Declared);
    }

    #[test]
    fn test_declared_type_never_duplicates_detected_format() {
        let candidates = FormatSniffer::default().sniff(b"%PDF-1.4", "report.pdf", Some("application/pdf"));
        assert_eq!(formats_of(&candidates), vec![formats::PDF]);
    }

    #[test]
    fn test_declared_type_follows_fallback() {
        let candidates = FormatSniffer::default().sniff(b"plain words", "", Some("text/plain; charset=utf-8"));
        assert_eq!(formats_of(&candidates), vec![formats::UNKNOWN, formats::TEXT]);
    }

    #[test]
    fn test_text_starting_with_short_magic_is_not_binary() {
        for text in [&b"BMW quarterly report\nRevenue grew."[..], b"ID3 tags explained\n", b"BM"] {
            let candidates = FormatSniffer::default().sniff(text, "report.txt", None);
            assert_eq!(
                candidates,
                vec![Candidate::new(formats::TEXT, CandidateSource::Extension)],
                "{:?}",
                String::from_utf8_lossy(text)
            );
        }
    }

    #[test]
    fn test_real_bmp_and_mp3_headers_still_match() {
        let mut bmp = b"BM\x46\x00\x00\x00\x00\x00\x00\x00\x36\x00\x00\x00\x28\x00\x00\x00".to_vec();
        bmp.extend_from_slice(&[0; 16]);
        assert_eq!(FormatSniffer::default().sniff(&bmp, "", None)[0].format, formats::BMP);

        let id3 = b"ID3\x04\x00\x00\x00\x00\x01\x7F rest";
        assert_eq!(FormatSniffer::default().sniff(id3, "", None)[0].format, formats::MP3);

        let frame = b"\xFF\xFB\x90\x64\x00\x00\x00\x00";
        assert_eq!(FormatSniffer::default().sniff(frame, "", None)[0].format, formats::MP3);
    }

    #[test]
    fn test_extension_only() {
        let candidates = FormatSniffer::default().sniff(b"a,b\n1,2\n", "data.csv", None);
        assert_eq!(candidates, vec![Candidate::new(formats::CSV, CandidateSource::Extension)]);
    }

    #[test]
    fn test_marker_outside_window_is_ignored() {
        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend(std::iter::repeat_n(b'x', 64));
        bytes.extend_from_slice(b"word/document.xml");
        let candidates = FormatSniffer::new(32).sniff(&bytes, "", None);
        assert_eq!(formats_of(&candidates), vec![formats::ZIP]);
    }

    #[test]
    fn test_sniff_is_deterministic() {
        let sniffer = FormatSniffer::default();
        let first = sniffer.sniff(b"GIF89a....", "image.png", Some("image/jpeg"));
        for _ in 0..10 {
            assert_eq!(sniffer.sniff(b"GIF89a....", "image.png", Some("image/jpeg")), first);
        }
        assert_eq!(formats_of(&first), vec![formats::GIF, formats::PNG, formats::JPEG]);
    }
}
