//! Pure Rust thumbnail backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF) | `image::ImageReader` with content sniffing |
//! | Downscale | `DynamicImage::resize` with `Lanczos3`, aspect preserved |
//! | Sharpening | `image::imageops::unsharpen` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` at the requested quality |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |

use super::backend::{BackendError, ImageBackend};
use super::params::ThumbnailParams;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
///
/// The format is sniffed from the content, so a mislabelled extension still
/// decodes and a corrupt file fails here.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Save a DynamicImage to the given path, inferring format from extension.
fn save_image(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let create = || {
        std::fs::File::create(path)
            .map(std::io::BufWriter::new)
            .map_err(BackendError::Io)
    };
    match ext.as_str() {
        "jpg" | "jpeg" => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(create()?, quality as u8);
            rgb.write_with_encoder(encoder)
                .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))
        }
        "png" => {
            let encoder = image::codecs::png::PngEncoder::new(create()?);
            img.write_with_encoder(encoder)
                .map_err(|e| BackendError::ProcessingFailed(format!("PNG encode failed: {}", e)))
        }
        other => Err(BackendError::ProcessingFailed(format!(
            "Unsupported output format: {}",
            other
        ))),
    }
}

impl ImageBackend for RustBackend {
    fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;

        // Fit inside the bounding box, never upscale
        let scaled = if img.width() > params.max_width || img.height() > params.max_height {
            img.resize(params.max_width, params.max_height, FilterType::Lanczos3)
        } else {
            img
        };

        let final_img = if let Some(sharpening) = params.sharpening {
            DynamicImage::from(image::imageops::unsharpen(
                &scaled,
                sharpening.sigma,
                sharpening.threshold,
            ))
        } else {
            scaled
        };

        save_image(&final_img, &params.output, params.quality.value())
    }
}
