//! Raster optimization and thumbnails for attachments
//!
//! Everything here degrades instead of failing: an image that cannot be
//! decoded is passed through untouched and gets a placeholder thumbnail.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use super::Blob;
use crate::error::CaptureError;

pub const MAX_WIDTH: u32 = 1920;
pub const MAX_HEIGHT: u32 = 1080;
pub const JPEG_QUALITY: u8 = 85;
pub const THUMB_WIDTH: u32 = 120;
pub const THUMB_HEIGHT: u32 = 90;
pub const THUMB_QUALITY: u8 = 60;
/// Files at or below this size are uploaded as they are
pub const SMALL_FILE_THRESHOLD: usize = 200 * 1024;

pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_PNG: &str = "image/png";
pub const MIME_SVG: &str = "image/svg+xml";

/// Placeholder thumbnail background
const PLACEHOLDER_FILL: Rgba<u8> = Rgba([0xf3, 0xf4, 0xf6, 0xff]);

/// Preview image for the attachment list
#[derive(Clone, Debug, PartialEq)]
pub struct Thumbnail {
    pub image: Blob,
    /// Extension label for generic file placeholders, drawn by the UI
    pub label: Option<String>,
}

impl Thumbnail {
    pub fn is_placeholder(&self) -> bool {
        self.label.is_some()
    }
}

/// Scale `width`×`height` down to fit `max_w`×`max_h`, keeping the aspect
/// ratio; sizes already inside the bounds are returned unchanged
pub fn fit_dimensions(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if width <= max_w && height <= max_h {
        return (width, height);
    }
    let ratio = (max_w as f64 / width as f64).min(max_h as f64 / height as f64);
    (
        ((width as f64 * ratio).round() as u32).max(1),
        ((height as f64 * ratio).round() as u32).max(1),
    )
}

fn fit(img: &RgbaImage) -> RgbaImage {
    let (w, h) = fit_dimensions(img.width(), img.height(), MAX_WIDTH, MAX_HEIGHT);
    if (w, h) == img.dimensions() {
        return img.clone();
    }
    imageops::resize(img, w, h, FilterType::Lanczos3)
}

fn encode_jpeg(img: &RgbaImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
    Ok(buf)
}

fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Downscale a captured or flattened screenshot into the upload bounds and
/// re-encode it as JPEG
pub fn optimize_screenshot(img: &RgbaImage) -> Result<Blob, CaptureError> {
    let fitted = fit(img);
    let data = encode_jpeg(&fitted, JPEG_QUALITY)
        .map_err(|err| CaptureError::Failed(format!("JPEG encoding failed: {err}")))?;
    log::debug!(
        "Optimized screenshot {}x{} -> {}x{} ({} bytes)",
        img.width(),
        img.height(),
        fitted.width(),
        fitted.height(),
        data.len()
    );
    Ok(Blob::new(data, MIME_JPEG))
}

/// Decode any raster blob, fit it into the upload bounds and re-encode as
/// JPEG. Returns the input unchanged if any step fails.
pub fn optimize_blob_to_jpeg(blob: &Blob) -> Blob {
    let optimized = image::load_from_memory(&blob.data)
        .map(|img| fit(&img.to_rgba8()))
        .and_then(|img| encode_jpeg(&img, JPEG_QUALITY));
    match optimized {
        Ok(data) => Blob::new(data, MIME_JPEG),
        Err(err) => {
            log::warn!("Keeping original {} blob: {}", blob.content_type, err);
            blob.clone()
        }
    }
}

/// Shrink a user-attached image before upload
///
/// Non-images, SVGs and small files are returned as they are. PNGs stay PNG
/// to keep transparency; everything else becomes JPEG.
pub fn optimize_file(file: &Blob) -> Blob {
    if !file.is_image() || file.content_type == MIME_SVG || file.len() <= SMALL_FILE_THRESHOLD {
        return file.clone();
    }

    let img = match image::load_from_memory(&file.data) {
        Ok(img) => img.to_rgba8(),
        Err(err) => {
            log::warn!("Failed to decode {}: {}", file.content_type, err);
            return file.clone();
        }
    };
    let fitted = fit(&img);

    let encoded = if file.content_type == MIME_PNG {
        encode_png(&fitted).map(|data| Blob::new(data, MIME_PNG))
    } else {
        encode_jpeg(&fitted, JPEG_QUALITY).map(|data| Blob::new(data, MIME_JPEG))
    };
    match encoded {
        Ok(blob) => blob,
        Err(err) => {
            log::warn!("Failed to re-encode {}: {}", file.content_type, err);
            file.clone()
        }
    }
}

/// Thumbnail of a bitmap, stretched to the thumbnail box
pub fn thumbnail_from_image(img: &RgbaImage) -> Thumbnail {
    let small = imageops::resize(img, THUMB_WIDTH, THUMB_HEIGHT, FilterType::Triangle);
    match encode_jpeg(&small, THUMB_QUALITY) {
        Ok(data) => Thumbnail {
            image: Blob::new(data, MIME_JPEG),
            label: None,
        },
        Err(err) => {
            log::warn!("Thumbnail encoding failed: {}", err);
            placeholder("img")
        }
    }
}

/// Thumbnail for an arbitrary blob; non-image or undecodable content gets
/// a placeholder labeled with a guessed extension
pub fn generate_thumbnail(blob: &Blob) -> Thumbnail {
    if blob.is_image() && blob.content_type != MIME_SVG {
        match image::load_from_memory(&blob.data) {
            Ok(img) => return thumbnail_from_image(&img.to_rgba8()),
            Err(err) => log::warn!("Cannot preview {}: {}", blob.content_type, err),
        }
    }
    placeholder(&ext_from_mime(&blob.content_type))
}

fn placeholder(ext: &str) -> Thumbnail {
    let img = RgbaImage::from_pixel(THUMB_WIDTH, THUMB_HEIGHT, PLACEHOLDER_FILL);
    let data = encode_png(&img).unwrap_or_default();
    Thumbnail {
        image: Blob::new(data, MIME_PNG),
        label: Some(ext.to_uppercase()),
    }
}

/// Best-effort file extension for a MIME type
pub fn ext_from_mime(mime: &str) -> String {
    let known = match mime {
        MIME_SVG => Some("svg"),
        "application/pdf" => Some("pdf"),
        "text/plain" => Some("txt"),
        "text/csv" => Some("csv"),
        "application/zip" => Some("zip"),
        "application/json" => Some("json"),
        _ => None,
    };
    if let Some(ext) = known {
        return ext.to_string();
    }
    match mime.split_once('/') {
        Some((_, subtype)) if !subtype.is_empty() => subtype.chars().take(4).collect(),
        _ => "file".to_string(),
    }
}

/// Human-readable byte count: `512 B`, `1.5 KB`, `3.2 MB`
pub fn format_bytes(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{bytes} B")
    } else if b < KIB * KIB {
        format!("{:.1} KB", b / KIB)
    } else {
        format!("{:.1} MB", b / (KIB * KIB))
    }
}
