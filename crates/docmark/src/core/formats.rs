//! Format identifiers and the extension / MIME lookup tables.
//!
//! Formats are short lowercase identifiers (`"pdf"`, `"docx"`, `"mp3"`). Converters match on
//! these identifiers rather than on MIME types so a single id covers every alias a file
//! type is known by.

use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const UNKNOWN: &str = "unknown";

pub const PDF: &str = "pdf";
pub const DOCX: &str = "docx";
pub const XLSX: &str = "xlsx";
pub const PPTX: &str = "pptx";
pub const EPUB: &str = "epub";
pub const ZIP: &str = "zip";
pub const RTF: &str = "rtf";
pub const OLE: &str = "ole";

pub const TEXT: &str = "text";
pub const MARKDOWN: &str = "markdown";
pub const HTML: &str = "html";
pub const XML: &str = "xml";
pub const JSON: &str = "json";
pub const CSV: &str = "csv";
pub const TSV: &str = "tsv";

pub const PNG: &str = "png";
pub const JPEG: &str = "jpeg";
pub const GIF: &str = "gif";
pub const BMP: &str = "bmp";
pub const TIFF: &str = "tiff";
pub const WEBP: &str = "webp";

pub const MP3: &str = "mp3";
pub const WAV: &str = "wav";
pub const FLAC: &str = "flac";
pub const OGG: &str = "ogg";
pub const M4A: &str = "m4a";

pub const MP4: &str = "mp4";
pub const MOV: &str = "mov";
pub const MKV: &str = "mkv";
pub const WEBM: &str = "webm";
pub const AVI: &str = "avi";

pub const IMAGE_FORMATS: &[&str] = &[PNG, JPEG, GIF, BMP, TIFF, WEBP];
pub const AUDIO_FORMATS: &[&str] = &[MP3, WAV, FLAC, OGG, M4A];
pub const VIDEO_FORMATS: &[&str] = &[MP4, MOV, MKV, WEBM, AVI];

pub fn is_image(format: &str) -> bool {
    IMAGE_FORMATS.contains(&format)
}

pub fn is_audio(format: &str) -> bool {
    AUDIO_FORMATS.contains(&format)
}

pub fn is_video(format: &str) -> bool {
    VIDEO_FORMATS.contains(&format)
}

pub fn is_media(format: &str) -> bool {
    is_audio(format) || is_video(format)
}

/// File extension to format mapping.
static EXT_TO_FORMAT: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();

    m.insert("txt", TEXT);
    m.insert("text", TEXT);
    m.insert("log", TEXT);
    m.insert("md", MARKDOWN);
    m.insert("markdown", MARKDOWN);
    m.insert("html", HTML);
    m.insert("htm", HTML);
    m.insert("xhtml", HTML);
    m.insert("xml", XML);
    m.insert("json", JSON);
    m.insert("jsonl", JSON);
    m.insert("csv", CSV);
    m.insert("tsv", TSV);

    m.insert("pdf", PDF);
    m.insert("docx", DOCX);
    m.insert("xlsx", XLSX);
    m.insert("pptx", PPTX);
    m.insert("epub", EPUB);
    m.insert("zip", ZIP);
    m.insert("rtf", RTF);
    m.insert("doc", OLE);
    m.insert("xls", OLE);
    m.insert("ppt", OLE);
    m.insert("msg", OLE);

    m.insert("png", PNG);
    m.insert("jpg", JPEG);
    m.insert("jpeg", JPEG);
    m.insert("gif", GIF);
    m.insert("bmp", BMP);
    m.insert("tif", TIFF);
    m.insert("tiff", TIFF);
    m.insert("webp", WEBP);

    m.insert("mp3", MP3);
    m.insert("wav", WAV);
    m.insert("flac", FLAC);
    m.insert("ogg", OGG);
    m.insert("oga", OGG);
    m.insert("m4a", M4A);

    m.insert("mp4", MP4);
    m.insert("m4v", MP4);
    m.insert("mov", MOV);
    m.insert("mkv", MKV);
    m.insert("webm", WEBM);
    m.insert("avi", AVI);

    m
});

/// MIME type to format mapping.
static MIME_TO_FORMAT: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();

    m.insert("text/plain", TEXT);
    m.insert("text/markdown", MARKDOWN);
    m.insert("text/x-markdown", MARKDOWN);
    m.insert("text/html", HTML);
    m.insert("application/xhtml+xml", HTML);
    m.insert("application/xml", XML);
    m.insert("text/xml", XML);
    m.insert("application/json", JSON);
    m.insert("text/json", JSON);
    m.insert("text/csv", CSV);
    m.insert("application/csv", CSV);
    m.insert("text/tab-separated-values", TSV);

    m.insert("application/pdf", PDF);
    m.insert(
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        DOCX,
    );
    m.insert("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet", XLSX);
    m.insert(
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        PPTX,
    );
    m.insert("application/epub+zip", EPUB);
    m.insert("application/zip", ZIP);
    m.insert("application/x-zip-compressed", ZIP);
    m.insert("application/rtf", RTF);
    m.insert("text/rtf", RTF);
    m.insert("application/msword", OLE);
    m.insert("application/vnd.ms-excel", OLE);
    m.insert("application/vnd.ms-powerpoint", OLE);
    m.insert("application/vnd.ms-outlook", OLE);
    m.insert("application/x-ole-storage", OLE);

    m.insert("image/png", PNG);
    m.insert("image/jpeg", JPEG);
    m.insert("image/pjpeg", JPEG);
    m.insert("image/gif", GIF);
    m.insert("image/bmp", BMP);
    m.insert("image/x-ms-bmp", BMP);
    m.insert("image/tiff", TIFF);
    m.insert("image/webp", WEBP);

    m.insert("audio/mpeg", MP3);
    m.insert("audio/mp3", MP3);
    m.insert("audio/wav", WAV);
    m.insert("audio/x-wav", WAV);
    m.insert("audio/vnd.wave", WAV);
    m.insert("audio/flac", FLAC);
    m.insert("audio/x-flac", FLAC);
    m.insert("audio/ogg", OGG);
    m.insert("audio/mp4", M4A);
    m.insert("audio/x-m4a", M4A);

    m.insert("video/mp4", MP4);
    m.insert("video/quicktime", MOV);
    m.insert("video/x-matroska", MKV);
    m.insert("video/webm", WEBM);
    m.insert("video/x-msvideo", AVI);

    m
});

/// Map a (lowercase) file extension to a format id.
///
/// Known extensions come from the fixed table; anything else is guessed through
/// `mime_guess` and mapped back through the MIME table.
pub fn format_for_extension(extension: &str) -> Option<&'static str> {
    let extension = extension.trim_start_matches('.').to_ascii_lowercase();
    if let Some(format) = EXT_TO_FORMAT.get(extension.as_str()) {
        return Some(format);
    }

    mime_guess::from_ext(&extension)
        .iter()
        .find_map(|mime| format_for_mime(mime.essence_str()))
}

/// Map a content type (parameters allowed) to a format id.
pub fn format_for_mime(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    MIME_TO_FORMAT.get(essence.as_str()).copied()
}

/// Preferred MIME type for a format, used when reporting results.
pub fn mime_for_format(format: &str) -> &'static str {
    MIME_TO_FORMAT
        .iter()
        .filter(|(_, f)| **f == format)
        .map(|(mime, _)| *mime)
        .min_by_key(|mime| (mime.contains("x-"), mime.len()))
        .unwrap_or("application/octet-stream")
}
