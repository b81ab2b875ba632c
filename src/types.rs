//! Shared types serialized to clients.
//!
//! The field names are the wire contract of the `type=index` document and
//! are consumed by the gallery viewer as-is.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Client-facing description of a directory or image.
///
/// Directories carry `indexURL` and never `size`; images carry `size`,
/// `imageURL` and an (always empty) `items` list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    /// Last path component.
    pub name: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Byte size, images only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Folder icon for directories, thumbnail URL for images.
    #[serde(rename = "thumbURL")]
    pub thumb_url: String,
    #[serde(rename = "indexURL", skip_serializing_if = "Option::is_none")]
    pub index_url: Option<String>,
    #[serde(rename = "imageURL", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Children of a listed directory, or `[]` for an image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<FileInfo>>,
}
