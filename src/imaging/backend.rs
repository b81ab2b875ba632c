//! Image rendering backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the one operation the thumbnail cache needs
//! from an image library. The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend); tests substitute a mock
//! that records and counts renders.

use super::params::ThumbnailParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image rendering backends.
///
/// Implementations are called from the blocking thread pool and may take as
/// long as decoding the source requires.
pub trait ImageBackend: Send + Sync + 'static {
    /// Render a thumbnail of `params.source` into `params.output`.
    fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::{Quality, Sharpening};
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Mock backend that records renders and writes a placeholder output.
    ///
    /// `delay` stretches each render so concurrent callers overlap;
    /// `fail` makes every render return an error.
    #[derive(Default)]
    pub struct MockBackend {
        pub operations: Mutex<Vec<RecordedOp>>,
        pub renders: AtomicUsize,
        pub delay: Duration,
        pub fail: bool,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedOp {
        pub source: String,
        pub max_width: u32,
        pub max_height: u32,
        pub quality: u32,
        pub sharpening: Option<(f32, i32)>,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn render_count(&self) -> usize {
            self.renders.load(Ordering::SeqCst)
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }
    }

    impl ImageBackend for MockBackend {
        fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            self.operations.lock().unwrap().push(RecordedOp {
                source: params.source.to_string_lossy().to_string(),
                max_width: params.max_width,
                max_height: params.max_height,
                quality: params.quality.value(),
                sharpening: params.sharpening.map(|s| (s.sigma, s.threshold)),
            });
            std::thread::sleep(self.delay);
            if self.fail {
                return Err(BackendError::ProcessingFailed("mock failure".into()));
            }
            std::fs::write(&params.output, b"thumb")?;
            Ok(())
        }
    }

    #[test]
    fn mock_records_thumbnail_with_sharpening() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::new();

        backend
            .thumbnail(&ThumbnailParams {
                source: "/source.jpg".into(),
                output: tmp.path().join("thumb.jpg"),
                max_width: 128,
                max_height: 96,
                quality: Quality::new(85),
                sharpening: Some(Sharpening::light()),
            })
            .unwrap();

        assert_eq!(backend.render_count(), 1);
        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            RecordedOp {
                max_width: 128,
                max_height: 96,
                quality: 85,
                sharpening: Some((0.5, 0)),
                ..
            }
        ));
        assert!(tmp.path().join("thumb.jpg").exists());
    }

    #[test]
    fn failing_mock_writes_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::failing();
        let output = tmp.path().join("thumb.jpg");
        let result = backend.thumbnail(&ThumbnailParams {
            source: Path::new("/source.jpg").to_path_buf(),
            output: output.clone(),
            max_width: 10,
            max_height: 10,
            quality: Quality::default(),
            sharpening: None,
        });
        assert!(result.is_err());
        assert!(!output.exists());
    }
}
