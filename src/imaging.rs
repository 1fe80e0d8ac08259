use std::io::Cursor;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use tracing::warn;

use crate::analysis::RegionGeometry;

/// Per-axis padding around a credits block before cropping, relative to
/// the block's own width and height.
const CROP_PADDING_FRAC: f32 = 0.02;

const JPEG_DERIVATIVE_QUALITY: u8 = 90;

pub const THUMBNAIL_MAX_EDGE_PX: u32 = 512;

pub fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("failed to probe image format")?
        .into_dimensions()
        .context("failed to read image dimensions")
}

fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).context("failed to decode image")
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .context("failed to encode png")?;
    Ok(out.into_inner())
}

/// Downscales so the long edge is at most `max_edge_px`, re-encoding as
/// JPEG. Images already within the cap pass through byte-identical.
pub fn shrink_to_long_edge(bytes: &[u8], max_edge_px: u32) -> Result<Vec<u8>> {
    let image = decode(bytes)?;
    let (width, height) = image.dimensions();
    if width.max(height) <= max_edge_px {
        return Ok(bytes.to_vec());
    }
    let resized = image.resize(max_edge_px, max_edge_px, FilterType::Lanczos3);
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_DERIVATIVE_QUALITY)
        .encode_image(&resized.to_rgb8())
        .context("failed to encode jpeg derivative")?;
    Ok(out)
}

/// Derivative fed to the OCR pass. Normalized coordinates survive the
/// downscale, so the analysis can run on fewer pixels while crops still
/// come from the original bytes. Failures keep the original.
pub fn analysis_derivative(bytes: &[u8], max_edge_px: u32) -> Vec<u8> {
    match shrink_to_long_edge(bytes, max_edge_px) {
        Ok(derived) => derived,
        Err(err) => {
            warn!("analysis derivative failed, using original image: {}", err);
            bytes.to_vec()
        }
    }
}

/// PNG thumbnail with the long edge capped at `max_edge_px`.
pub fn make_thumbnail(bytes: &[u8], max_edge_px: u32) -> Result<Vec<u8>> {
    let image = decode(bytes)?;
    let (width, height) = image.dimensions();
    if width.max(height) <= max_edge_px {
        return encode_png(&image);
    }
    encode_png(&image.resize(max_edge_px, max_edge_px, FilterType::Lanczos3))
}

/// Cuts the padded axis-aligned envelope of a credits block out of the
/// original image and re-encodes it as PNG. Returns the crop bytes and
/// the crop method tag; anything degenerate falls back to the original
/// bytes under the same tag.
pub fn extract_credits_crop(bytes: &[u8], geometry: &RegionGeometry) -> (Vec<u8>, &'static str) {
    match try_extract_crop(bytes, geometry) {
        Ok(Some(crop)) => (crop, "axis_aligned"),
        Ok(None) => {
            warn!("credits crop box degenerate, keeping full image");
            (bytes.to_vec(), "axis_aligned")
        }
        Err(err) => {
            warn!("credits crop failed, keeping full image: {}", err);
            (bytes.to_vec(), "axis_aligned")
        }
    }
}

fn try_extract_crop(bytes: &[u8], geometry: &RegionGeometry) -> Result<Option<Vec<u8>>> {
    let image = decode(bytes)?;
    let (width, height) = image.dimensions();

    let bbox = geometry.bbox;
    let padding_x = bbox.width() * CROP_PADDING_FRAC;
    let padding_y = bbox.height() * CROP_PADDING_FRAC;

    // Truncating pixel conversion, clamped to the image.
    let x1 = (((bbox.x1 - padding_x) * width as f32) as i64).max(0) as u32;
    let y1 = (((bbox.y1 - padding_y) * height as f32) as i64).max(0) as u32;
    let x2 = ((((bbox.x2 + padding_x) * width as f32) as i64).min(width as i64)) as u32;
    let y2 = ((((bbox.y2 + padding_y) * height as f32) as i64).min(height as i64)) as u32;

    if x2 <= x1 || y2 <= y1 {
        return Ok(None);
    }

    let crop = image.crop_imm(x1, y1, x2 - x1, y2 - y1);
    encode_png(&crop).map(Some)
}
