//! Inline `data:` image handling.
//!
//! Converters that embed images produce `![alt](data:image/png;base64,....)` links. By
//! default those are truncated to `![alt](data:image/png;base64...)` so the Markdown stays
//! small. When data URIs are kept, images larger than the configured size are downscaled
//! until they fit.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Any Markdown image whose target is a data URI.
static DATA_URI_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(data:([^;,)\s]+)(?:;[^,)\s]*)?,[^)]*\)")
        .unwrap_or_else(|e| panic!("invalid data URI pattern: {e}"))
});

/// Base64 encoded raster images.
#[cfg(feature = "images")]
static BASE64_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(data:image/([A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/=]+)\)")
        .unwrap_or_else(|e| panic!("invalid base64 image pattern: {e}"))
});

/// Replace the payload of every data-URI image with `...`, keeping alt text and MIME type.
pub fn truncate_data_uris(markdown: &str) -> String {
    DATA_URI_IMAGE
        .replace_all(markdown, |caps: &Captures<'_>| format!("![{}](data:{};base64...)", &caps[1], &caps[2]))
        .into_owned()
}

/// Apply the configured data-URI policy.
pub fn process_data_uris(markdown: &str, keep_data_uris: bool, max_image_size_kb: Option<u64>) -> String {
    if !keep_data_uris {
        return truncate_data_uris(markdown);
    }
    match max_image_size_kb {
        Some(max_kb) => resize_base64_images(markdown, max_kb),
        None => markdown.to_string(),
    }
}

/// Downscale base64 images whose decoded size exceeds `max_kb` KiB.
///
/// Each pass scales the original by a further factor of 0.8 (up to five passes) and
/// re-encodes it in its own format, JPEG at quality 85. The first encoding that fits
/// replaces the image; images that never fit or fail to decode are left untouched.
#[cfg(feature = "images")]
pub fn resize_base64_images(markdown: &str, max_kb: u64) -> String {
    BASE64_IMAGE
        .replace_all(markdown, |caps: &Captures<'_>| {
            let original = caps[0].to_string();
            match shrink(&caps[2], &caps[3], max_kb) {
                Ok(Some(data)) => format!("![{}](data:image/{};base64,{})", &caps[1], &caps[2], data),
                Ok(None) => original,
                Err(e) => {
                    tracing::debug!(error = %e, "Failed to resize inline image, keeping original");
                    original
                }
            }
        })
        .into_owned()
}

#[cfg(not(feature = "images"))]
pub fn resize_base64_images(markdown: &str, _max_kb: u64) -> String {
    markdown.to_string()
}

#[cfg(feature = "images")]
const SCALE_STEP: f64 = 0.8;
#[cfg(feature = "images")]
const MAX_ITERATIONS: usize = 5;
#[cfg(feature = "images")]
const JPEG_QUALITY: u8 = 85;

#[cfg(feature = "images")]
fn shrink(subtype: &str, payload: &str, max_kb: u64) -> Result<Option<String>, image::ImageError> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use image::codecs::jpeg::JpegEncoder;
    use image::imageops::FilterType;
    use image::{ImageFormat, ImageReader};
    use std::io::Cursor;

    let Ok(bytes) = STANDARD.decode(payload) else {
        return Ok(None);
    };
    let limit = max_kb.saturating_mul(1024) as usize;
    if bytes.len() <= limit {
        return Ok(None);
    }

    let Some(format) = ImageFormat::from_mime_type(format!("image/{}", subtype.to_ascii_lowercase()))
        .or_else(|| ImageFormat::from_extension(subtype))
    else {
        return Ok(None);
    };

    let image = ImageReader::with_format(Cursor::new(&bytes), format).decode()?;
    let mut scale = SCALE_STEP;

    for _ in 0..MAX_ITERATIONS {
        let width = ((image.width() as f64 * scale) as u32).max(1);
        let height = ((image.height() as f64 * scale) as u32).max(1);
        let resized = image.resize_exact(width, height, FilterType::Lanczos3);

        let mut encoded = Vec::new();
        if format == ImageFormat::Jpeg {
            JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY).encode_image(&resized.to_rgb8())?;
        } else {
            resized.write_to(&mut Cursor::new(&mut encoded), format)?;
        }

        if encoded.len() <= limit {
            tracing::debug!(
                original_bytes = bytes.len(),
                resized_bytes = encoded.len(),
                width,
                height,
                "Downscaled inline image"
            );
            return Ok(Some(STANDARD.encode(&encoded)));
        }

        scale *= SCALE_STEP;
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_data_uris() {
        let markdown = "before ![chart](data:image/png;base64,iVBORw0KGgo=) after ![x](https://e.com/a.png)";
        assert_eq!(
            truncate_data_uris(markdown),
            "before ![chart](data:image/png;base64...) after ![x](https://e.com/a.png)"
        );
    }

    #[test]
    fn test_truncation_is_idempotent() {
        let once = truncate_data_uris("![](data:image/svg+xml;utf8,<svg></svg>)");
        assert_eq!(once, "![](data:image/svg+xml;base64...)");
        assert_eq!(truncate_data_uris(&once), once);
    }

    #[test]
    fn test_keep_without_limit_is_untouched() {
        let markdown = "![a](data:image/png;base64,AAAA)";
        assert_eq!(process_data_uris(markdown, true, None), markdown);
        assert_eq!(process_data_uris(markdown, false, None), "![a](data:image/png;base64...)");
    }

    #[cfg(feature = "images")]
    #[test]
    fn test_small_images_are_kept() {
        let markdown = "![a](data:image/png;base64,AAAA)";
        assert_eq!(resize_base64_images(markdown, 200), markdown);
    }

    #[cfg(feature = "images")]
    #[test]
    fn test_large_image_is_downscaled() {
        use base64::Engine;
        use base64::engine::general_purpose::STANDARD;
        use image::{ImageBuffer, ImageFormat, Rgb};
        use std::io::Cursor;

        let noisy = ImageBuffer::from_fn(256, 256, |x, y| {
            let v = (x.wrapping_mul(2654435761) ^ y.wrapping_mul(40503)) as u8;
            Rgb([v, v.wrapping_mul(3), v.wrapping_add(x as u8)])
        });
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(noisy)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        assert!(png.len() > 100 * 1024);

        let markdown = format!("![noise](data:image/png;base64,{})", STANDARD.encode(&png));
        let resized = resize_base64_images(&markdown, 100);
        assert_ne!(resized, markdown);
        assert!(resized.len() < markdown.len());
        assert!(resized.starts_with("![noise](data:image/png;base64,"));
        assert_eq!(resize_base64_images(&resized, 100), resized);
    }
}
