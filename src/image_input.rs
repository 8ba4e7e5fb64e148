use std::path::Path;

use image::RgbImage;

use crate::error::DecodeError;

/// File extensions picked up when scanning a directory for images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Decode an encoded image (PNG, JPEG, BMP, ...) into an RGB pixel grid.
///
/// The returned buffer is always in RGB channel order.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    let decoded = image::load_from_memory(bytes)?;
    let rgb = decoded.to_rgb8();
    ensure_dimensions(&rgb)?;
    Ok(rgb)
}

pub fn load_image(path: &Path) -> Result<RgbImage, DecodeError> {
    let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_image(&bytes)
}

pub fn ensure_dimensions(image: &RgbImage) -> Result<(), DecodeError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(DecodeError::ZeroDimensions);
    }
    Ok(())
}

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}
