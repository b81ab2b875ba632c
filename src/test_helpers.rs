//! Shared test utilities for the galleryd test suite.
//!
//! Provides file builders and a ready-made gallery layout so dispatcher and
//! resolver tests can start from the same on-disk shape.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let fx = GalleryFixture::new();
//! let id = fx.register_photos().await;
//! // /id/{id}/photo.png, /id/{id}/My%20Trip/beach.jpg
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::address::{AddressStore, Identifier};

// =========================================================================
// File builders
// =========================================================================

/// An identifier that is never persisted anywhere.
pub fn identifier() -> Identifier {
    AddressStore::new("/unused", "test-salt").compute("/fixture")
}

/// Write `len` bytes to `path`, creating parent directories.
pub fn write_bytes(path: &Path, len: usize) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, vec![0xAB; len]).unwrap();
}

/// Write a decodable `width × height` PNG gradient to `path`.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    img.save(path).unwrap();
}

// =========================================================================
// Gallery fixture
// =========================================================================

/// A temp directory laid out like a running server's world:
///
/// ```text
/// {tmp}/
/// ├── client/
/// │   ├── index.html
/// │   ├── folder.png
/// │   └── gallery/index.html
/// ├── data/
/// │   ├── Files/
/// │   └── Thumbnails/
/// └── photos/
///     ├── photo.png          (10240 bytes)
///     └── My Trip/beach.jpg  (2048 bytes)
/// ```
pub struct GalleryFixture {
    pub tmp: TempDir,
    pub store: Arc<AddressStore>,
}

impl GalleryFixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        std::fs::create_dir_all(root.join("client").join("gallery")).unwrap();
        std::fs::write(root.join("client").join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(
            root.join("client").join("gallery").join("index.html"),
            "<h1>viewer</h1>",
        )
        .unwrap();
        write_bytes(&root.join("client").join("folder.png"), 64);

        write_bytes(&root.join("photos").join("photo.png"), 10240);
        write_bytes(&root.join("photos").join("My Trip").join("beach.jpg"), 2048);

        let store = Arc::new(AddressStore::new(
            root.join("data").join("Files"),
            "test-salt",
        ));
        Self { tmp, store }
    }

    pub fn client_dir(&self) -> PathBuf {
        self.tmp.path().join("client")
    }

    pub fn photos_dir(&self) -> PathBuf {
        self.tmp.path().join("photos")
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.tmp.path().join("data").join("Thumbnails")
    }

    /// Persist the photos directory and return its identifier.
    pub async fn register_photos(&self) -> Identifier {
        let photos = self.photos_dir();
        self.store
            .identifier_for(&photos.to_string_lossy(), true)
            .await
    }
}
