//! Image decoding for query uploads and fetched catalog photos.

use std::path::Path;

use image::{DynamicImage, GenericImageView};

use crate::types::{VisionError, VisionResult};

/// Decode raw image bytes into an RGB image.
///
/// Alpha and palette information is dropped so every downstream transform
/// works on the same pixel layout.
pub fn decode_image(bytes: &[u8]) -> VisionResult<DynamicImage> {
    if bytes.is_empty() {
        return Err(VisionError::InvalidInput("empty image payload".to_string()));
    }

    let img = image::load_from_memory(bytes)?;
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(VisionError::InvalidInput(format!(
            "image has no pixels ({w}x{h})"
        )));
    }

    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// Load and decode an image from a file path.
pub fn load_image_file(path: &Path) -> VisionResult<DynamicImage> {
    let bytes = std::fs::read(path)?;
    decode_image(&bytes)
}

/// Check if a file path points to a supported image format.
pub fn is_supported_format(path: &str) -> bool {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    matches!(
        ext.as_str(),
        "png" | "jpg" | "jpeg" | "webp" | "gif" | "bmp" | "tiff" | "tif" | "ico"
    )
}
