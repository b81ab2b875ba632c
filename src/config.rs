//! Server configuration module.
//!
//! Handles loading, validating, and merging `galleryd.toml`. The file is
//! sparse: stock defaults are the base layer and user values override them
//! key by key.
//!
//! ## Configuration Options
//!
//! ```toml
//! salt = "change-me"        # Secret mixed into every identifier (required)
//! data_dir = "~/galleryd"   # Address Records + thumbnails (default: platform data dir)
//! client_dir = "build"      # Static assets and gallery/index.html
//!
//! [server]
//! bind = "127.0.0.1:8001"
//!
//! [thumbnails]
//! width = 128               # Bounding box, aspect ratio preserved
//! height = 128
//! format = "jpg"            # jpg | png
//! quality = 90              # 1-100 (jpg only)
//! sharpen = false
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! ## Data Directory Layout
//!
//! ```text
//! {data_dir}/
//! ├── Files/        # Address Records, sharded by identifier prefix
//! └── Thumbnails/   # Rendered thumbnails, sharded by source hash prefix
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name looked up by the CLI.
pub const CONFIG_FILENAME: &str = "galleryd.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration loaded from `galleryd.toml`.
///
/// Everything except `salt` has a usable default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Secret mixed into identifier hashing. Changing it orphans every
    /// identifier handed out before.
    pub salt: String,
    /// Root for Address Records and the thumbnail cache. `~` expands to `$HOME`.
    pub data_dir: String,
    /// Client asset root served for unrecognized top-level paths.
    pub client_dir: String,
    pub server: ServerConfig,
    pub thumbnails: ThumbnailsConfig,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            salt: String::new(),
            data_dir: default_data_dir(),
            client_dir: "build".to_string(),
            server: ServerConfig::default(),
            thumbnails: ThumbnailsConfig::default(),
        }
    }
}

/// Platform data directory, falling back to `./data` when the platform
/// has no notion of one.
fn default_data_dir() -> String {
    directories::ProjectDirs::from("", "", "galleryd")
        .map(|dirs| dirs.data_dir().to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string())
}

impl GalleryConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.salt.is_empty() {
            return Err(ConfigError::Validation("salt must not be empty".into()));
        }
        if self.data_dir.is_empty() {
            return Err(ConfigError::Validation("data_dir must not be empty".into()));
        }
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "server.bind is not a socket address: {}",
                self.server.bind
            )));
        }
        if self.thumbnails.width == 0 || self.thumbnails.height == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.width and thumbnails.height must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.thumbnails.quality) {
            return Err(ConfigError::Validation(
                "thumbnails.quality must be 1-100".into(),
            ));
        }
        if !matches!(self.thumbnails.format.as_str(), "jpg" | "jpeg" | "png") {
            return Err(ConfigError::Validation(format!(
                "thumbnails.format must be jpg or png, got {}",
                self.thumbnails.format
            )));
        }
        Ok(())
    }

    pub fn data_root(&self) -> PathBuf {
        expand_tilde(&self.data_dir)
    }

    /// Directory holding the sharded Address Records.
    pub fn records_dir(&self) -> PathBuf {
        self.data_root().join("Files")
    }

    /// Directory holding rendered thumbnails.
    pub fn thumbnails_dir(&self) -> PathBuf {
        self.data_root().join("Thumbnails")
    }

    pub fn client_root(&self) -> PathBuf {
        expand_tilde(&self.client_dir)
    }

    /// The gallery viewer document served for `/id/...` without a `type`.
    pub fn viewer_document(&self) -> PathBuf {
        self.client_root().join("gallery").join("index.html")
    }

    /// Parsed listen address. Only valid after [`validate`](Self::validate).
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.bind.parse().map_err(|_| {
            ConfigError::Validation(format!("invalid bind address: {}", self.server.bind))
        })
    }
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8001".to_string(),
        }
    }
}

/// Thumbnail rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    /// Bounding box width in pixels.
    pub width: u32,
    /// Bounding box height in pixels.
    pub height: u32,
    /// Output format, also the cached file's extension.
    pub format: String,
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub quality: u32,
    /// Apply a light unsharp mask after downscaling.
    pub sharpen: bool,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            format: "jpg".to_string(),
            quality: 90,
            sharpen: false,
        }
    }
}

/// Expand a leading `~` to `$HOME`.
pub fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/home".to_string());
            PathBuf::from(format!("{home}{rest}"))
        }
        _ => PathBuf::from(path),
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(GalleryConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<GalleryConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: GalleryConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, merged over stock defaults.
///
/// A missing file yields the defaults, which still fail validation until a
/// salt is configured.
pub fn load_config(path: &Path) -> Result<GalleryConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `galleryd.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# galleryd configuration
# ======================
# All settings except `salt` are optional. Values shown are the defaults.
# Unknown keys will cause an error.

# Secret mixed into every identifier. Keep it private: identifiers act as
# capabilities, and changing the salt invalidates every URL handed out.
salt = "change-me"

# Where Address Records (Files/) and rendered thumbnails (Thumbnails/) live.
# Defaults to the platform data directory. A leading ~ expands to $HOME.
# data_dir = "~/.local/share/galleryd"

# Static client assets. Unrecognized paths are served from here, and
# gallery/index.html is the viewer document.
client_dir = "build"

# ---------------------------------------------------------------------------
# Listener
# ---------------------------------------------------------------------------
[server]
bind = "127.0.0.1:8001"

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# Bounding box in pixels. The source aspect ratio is preserved.
width = 128
height = 128

# Output format: "jpg" or "png".
format = "jpg"

# JPEG quality (1 = worst, 100 = best).
quality = 90

# Light unsharp mask after downscaling.
sharpen = false
"##
}
