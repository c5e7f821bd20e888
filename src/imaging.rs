//! Image Encoding Utilities
//!
//! JPEG re-encoding and the progressive lossy recompression ladder used to
//! keep upload payloads within provider limits. Decoding failures map to
//! `CoreError::InvalidImage` so callers surface a typed failure, never a
//! panic.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

use crate::{CoreError, CoreResult};

// =============================================================================
// Payload Size Policy
// =============================================================================

/// Images at or below this size may be inline-encoded as a data URL (1 MiB)
pub const INLINE_THRESHOLD_BYTES: usize = 1024 * 1024;

/// Raw images above this size must be recompressed before inlining (2 MiB)
pub const INLINE_SAFETY_THRESHOLD_BYTES: usize = 2 * 1024 * 1024;

/// Recompression target size (1.5 MiB)
pub const RECOMPRESS_TARGET_BYTES: usize = 1536 * 1024;

/// Descending JPEG quality levels tried during recompression
pub const QUALITY_LADDER: [u8; 4] = [70, 50, 30, 20];

/// JPEG quality used when uploading an image for analysis
pub const ANALYSIS_UPLOAD_QUALITY: u8 = 80;

// =============================================================================
// Probing and Encoding
// =============================================================================

/// Basic metadata for a decoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

/// Decodes image bytes and returns their dimensions.
pub fn probe(bytes: &[u8]) -> CoreResult<ImageInfo> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| CoreError::InvalidImage(format!("Failed to decode image: {}", e)))?;

    Ok(ImageInfo {
        width: img.width(),
        height: img.height(),
    })
}

/// Re-encodes image bytes as JPEG at the given quality (1-100).
///
/// Alpha channels are flattened since JPEG has no transparency.
pub fn encode_jpeg(bytes: &[u8], quality: u8) -> CoreResult<Vec<u8>> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| CoreError::InvalidImage(format!("Failed to decode image: {}", e)))?;

    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| CoreError::InvalidImage(format!("Failed to encode JPEG: {}", e)))?;

    Ok(out)
}

/// Recompresses an image down the quality ladder until it fits under
/// `target_bytes`, returning the first result that fits.
///
/// If no quality level gets under the target, the smallest result obtained is
/// returned rather than failing; upload size limits are enforced upstream and
/// a best-effort payload keeps the flow alive.
pub fn compress_to_target(bytes: &[u8], target_bytes: usize) -> CoreResult<Vec<u8>> {
    let mut best: Option<Vec<u8>> = None;

    for quality in QUALITY_LADDER {
        let encoded = encode_jpeg(bytes, quality)?;
        debug!(
            quality,
            size = encoded.len(),
            target = target_bytes,
            "recompression attempt"
        );

        if encoded.len() <= target_bytes {
            return Ok(encoded);
        }

        match &best {
            Some(b) if b.len() <= encoded.len() => {}
            _ => best = Some(encoded),
        }
    }

    best.ok_or_else(|| CoreError::InvalidImage("Recompression produced no output".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encodes a flat-color RGB image as PNG for use as test input.
    fn test_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_probe_dimensions() {
        let png = test_png(320, 200);
        let info = probe(&png).unwrap();
        assert_eq!(info.width, 320);
        assert_eq!(info.height, 200);
    }

    #[test]
    fn test_probe_invalid_bytes() {
        let err = probe(b"not an image").unwrap_err();
        assert!(matches!(err, CoreError::InvalidImage(_)));
    }

    #[test]
    fn test_encode_jpeg_roundtrip() {
        let png = test_png(64, 64);
        let jpeg = encode_jpeg(&png, ANALYSIS_UPLOAD_QUALITY).unwrap();

        // Output must itself decode, at the same dimensions.
        let info = probe(&jpeg).unwrap();
        assert_eq!(info.width, 64);
        assert_eq!(info.height, 64);
    }

    #[test]
    fn test_encode_jpeg_quality_ordering() {
        let png = test_png(256, 256);
        let high = encode_jpeg(&png, 90).unwrap();
        let low = encode_jpeg(&png, 20).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_compress_to_target_fits() {
        let png = test_png(128, 128);
        // Generous target: the first ladder step should already fit.
        let out = compress_to_target(&png, 512 * 1024).unwrap();
        assert!(out.len() <= 512 * 1024);
    }

    #[test]
    fn test_compress_to_target_best_effort() {
        let png = test_png(256, 256);
        // Impossible 1-byte target: returns the smallest ladder result
        // instead of failing.
        let out = compress_to_target(&png, 1).unwrap();
        assert!(!out.is_empty());

        let floor = encode_jpeg(&png, *QUALITY_LADDER.last().unwrap()).unwrap();
        assert_eq!(out.len(), floor.len());
    }

    #[test]
    fn test_compress_invalid_input() {
        assert!(compress_to_target(b"garbage", RECOMPRESS_TARGET_BYTES).is_err());
    }
}
