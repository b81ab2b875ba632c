//! Parameter types for thumbnail rendering.
//!
//! These structs describe *what* to render, not *how*. They are the interface
//! between the [thumbnail cache](crate::cache) (which decides when a
//! thumbnail is needed and where it goes) and the [`backend`](super::backend)
//! (which does the pixel work), so the cache can be tested with a mock.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1-100, default 90). Clamped on construction.
//! - [`Sharpening`]: unsharp-mask parameters (sigma + threshold).
//! - [`ThumbnailParams`]: source, output, bounding box, quality, optional sharpening.

use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Sharpening parameters for unsharp mask.
///
/// - `sigma`: Standard deviation of the Gaussian blur (higher = more sharpening)
/// - `threshold`: Minimum brightness difference to sharpen (0 = sharpen all pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

impl Sharpening {
    /// Light sharpening suitable for small thumbnails.
    pub fn light() -> Self {
        Self {
            sigma: 0.5,
            threshold: 0,
        }
    }
}

/// Parameters for one thumbnail render.
///
/// The source is scaled down to fit inside `max_width × max_height` with its
/// aspect ratio preserved; it is never scaled up. The output format follows
/// the extension of `output`.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub max_width: u32,
    pub max_height: u32,
    pub quality: Quality,
    pub sharpening: Option<Sharpening>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_90() {
        assert_eq!(Quality::default().value(), 90);
    }

    #[test]
    fn sharpening_light_values() {
        let s = Sharpening::light();
        assert_eq!(s.sigma, 0.5);
        assert_eq!(s.threshold, 0);
    }
}
