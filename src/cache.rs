//! On-disk thumbnail cache.
//!
//! The dispatcher asks for a thumbnail by source path and gets back the path
//! of a rendered file it can stream. Rendering is expensive (full decode of
//! the source), so every thumbnail is rendered once and reused until the
//! source changes.
//!
//! # Contract
//!
//! [`ThumbnailCache::cache_path_for`] takes a source image path and returns
//! the path of its thumbnail:
//!
//! 1. The first call renders and persists the thumbnail.
//! 2. Later calls return the persisted file without rendering.
//! 3. Concurrent calls for the same source render at most once; the others
//!    wait for that render and share its result.
//! 4. If rendering fails (unreadable or corrupt source), the call returns a
//!    [`ThumbnailError`], which the dispatcher reports as "not found".
//!
//! # Design
//!
//! ## Cache keys
//!
//! The key is the SHA-256 of the source path text. Keying by path rather
//! than content means a lookup costs one `stat` instead of a full read of a
//! potentially large original. Staleness is handled by comparing
//! modification times: a thumbnail older than its source is re-rendered.
//!
//! ## Storage
//!
//! ```text
//! {thumbnails_dir}/
//! ├── 3f/
//! │   └── a9c1...e2.jpg
//! └── 7b/
//!     └── 04d8...91.jpg
//! ```
//!
//! Renders go to a uniquely named temporary file in the shard directory and
//! are renamed into place, so a reader never streams a half-written file.
//!
//! ## Single flight
//!
//! An in-flight table maps each source path to a per-path async mutex. A
//! caller takes the mutex, re-checks the disk, and only renders on a miss.
//! Entries are removed once no caller holds them, so the table only ever
//! contains sources with work in progress.
//!
//! Each render runs in its own spawned task that owns the lock. A client
//! that disconnects mid-render abandons only its wait: the render still
//! finishes, is renamed into place, and later callers reuse it.

use crate::config::ThumbnailsConfig;
use crate::imaging::{BackendError, ImageBackend, Quality, Sharpening, ThumbnailParams};
use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::Instrument;

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Rendering failed: {0}")]
    Render(#[from] BackendError),
    #[error("Render task aborted: {0}")]
    Aborted(String),
}

/// A cache that turns source image paths into rendered thumbnail paths.
#[async_trait]
pub trait ThumbnailCache: Send + Sync {
    /// Path of the thumbnail for `source`, rendering it on first use.
    async fn cache_path_for(&self, source: &Path) -> Result<PathBuf, ThumbnailError>;
}

/// Render settings shared by every thumbnail in one cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailSettings {
    pub max_width: u32,
    pub max_height: u32,
    /// Output format and file extension (`jpg` or `png`).
    pub format: String,
    pub quality: Quality,
    pub sharpening: Option<Sharpening>,
}

impl ThumbnailSettings {
    pub fn from_config(config: &ThumbnailsConfig) -> Self {
        Self {
            max_width: config.width,
            max_height: config.height,
            format: config.format.clone(),
            quality: Quality::new(config.quality),
            sharpening: config.sharpen.then(Sharpening::light),
        }
    }
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self::from_config(&ThumbnailsConfig::default())
    }
}

/// Thumbnail cache persisted under a directory, rendering through an
/// [`ImageBackend`].
pub struct DiskThumbnailCache<B: ImageBackend> {
    dir: PathBuf,
    settings: ThumbnailSettings,
    backend: Arc<B>,
    in_flight: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl<B: ImageBackend> DiskThumbnailCache<B> {
    pub fn new(dir: impl Into<PathBuf>, settings: ThumbnailSettings, backend: B) -> Self {
        Self {
            dir: dir.into(),
            settings,
            backend: Arc::new(backend),
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Where the thumbnail for `source` is stored.
    pub fn thumbnail_path(&self, source: &Path) -> PathBuf {
        let key = hash_source_path(source);
        self.dir
            .join(&key[..2])
            .join(format!("{}.{}", &key[2..], self.settings.format))
    }
}

#[async_trait]
impl<B: ImageBackend> ThumbnailCache for DiskThumbnailCache<B> {
    /// The lock, render, rename and table cleanup all run in a detached
    /// task. Dropping the caller's future only stops the wait; a render in
    /// progress still lands in the cache and keeps the lock until then.
    #[tracing::instrument(skip(self, source), fields(source = %source.display()))]
    async fn cache_path_for(&self, source: &Path) -> Result<PathBuf, ThumbnailError> {
        let key = source.to_path_buf();
        let lock = Arc::clone(self.in_flight.entry(key.clone()).or_default().value());
        let job = RenderJob {
            target: self.thumbnail_path(source),
            source: key,
            settings: self.settings.clone(),
            backend: Arc::clone(&self.backend),
        };
        let in_flight = Arc::clone(&self.in_flight);

        let task = tokio::spawn(
            async move {
                let result = {
                    let _guard = lock.lock().await;
                    job.ensure().await
                };
                drop(lock);
                in_flight.remove_if(&job.source, |_, lock| Arc::strong_count(lock) == 1);
                result
            }
            .instrument(tracing::Span::current()),
        );

        task.await
            .map_err(|e| ThumbnailError::Aborted(e.to_string()))?
    }
}

/// Everything one render needs, owned so it can outlive the request.
struct RenderJob<B> {
    source: PathBuf,
    target: PathBuf,
    settings: ThumbnailSettings,
    backend: Arc<B>,
}

impl<B: ImageBackend> RenderJob<B> {
    /// Return the cached thumbnail if it is at least as new as the source,
    /// otherwise render it. Runs under the per-source lock.
    async fn ensure(&self) -> Result<PathBuf, ThumbnailError> {
        let source_mtime = fs::metadata(&self.source).await?.modified()?;
        if is_fresh(&self.target, source_mtime).await {
            return Ok(self.target.clone());
        }

        let shard = self
            .target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        fs::create_dir_all(&shard).await?;
        let staging = shard.join(format!(
            ".{}.{}",
            uuid::Uuid::new_v4(),
            self.settings.format
        ));

        let params = ThumbnailParams {
            source: self.source.clone(),
            output: staging.clone(),
            max_width: self.settings.max_width,
            max_height: self.settings.max_height,
            quality: self.settings.quality,
            sharpening: self.settings.sharpening,
        };
        let backend = Arc::clone(&self.backend);
        let rendered = tokio::task::spawn_blocking(move || backend.thumbnail(&params))
            .await
            .map_err(|e| ThumbnailError::Aborted(e.to_string()))
            .and_then(|r| r.map_err(ThumbnailError::from));

        if let Err(e) = rendered {
            let _ = fs::remove_file(&staging).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&staging, &self.target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        tracing::debug!(thumbnail = %self.target.display(), "thumbnail rendered");
        Ok(self.target.clone())
    }
}

/// SHA-256 of the source path text, as lowercase hex.
pub fn hash_source_path(source: &Path) -> String {
    let digest = Sha256::digest(source.as_os_str().as_encoded_bytes());
    format!("{:x}", digest)
}

async fn is_fresh(target: &Path, source_mtime: SystemTime) -> bool {
    match fs::metadata(target).await.and_then(|m| m.modified()) {
        Ok(thumb_mtime) => thumb_mtime >= source_mtime,
        Err(_) => false,
    }
}
