//! Thumbnail rendering in pure Rust, no system image libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (JPEG, PNG, GIF) |
//! | **Thumbnail** | `resize` (Lanczos3) + optional `unsharpen` |
//! | **Encode** | JPEG or PNG by output extension |
//!
//! The module is split into:
//! - **Parameters**: Data structures describing a render
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use params::{Quality, Sharpening, ThumbnailParams};
pub use rust_backend::RustBackend;
