//! Filesystem entry classification and metadata resolution.
//!
//! Every addressed resource is `root + sub-path`, where `root` comes from an
//! Address Record and `sub-path` from the request. Resolution classifies the
//! entry and, for `type=index`, turns it into a [`FileInfo`].
//!
//! ## Classification
//!
//! | Entry | Result |
//! |-------|--------|
//! | directory | [`ResourceEntry::Directory`] |
//! | regular file, non-empty, extension in [`IMAGE_EXTENSIONS`] | [`ResourceEntry::Image`] |
//! | anything else (missing, empty, other extension, special file, symlink loop) | [`ResourceEntry::Absent`] |
//!
//! Extensions match case-sensitively as stored: `photo.JPG` is absent.
//!
//! ## URLs
//!
//! All generated URLs are `/id/{identifier}{escaped sub-path}?type=…`. The
//! sub-path is escaped per segment (see [`crate::request::escape_path`]) so
//! the dispatcher decodes it back to the exact filename.

use crate::address::Identifier;
use crate::request::escape_path;
use crate::types::FileInfo;
use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;

/// Extensions served as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif"];

/// Icon shown for directories, served from the client asset root.
pub const FOLDER_ICON_URL: &str = "/folder.png";

/// Classification of a resolved filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEntry {
    Directory,
    Image { size: u64 },
    Absent,
}

/// Whether `path` has one of the supported image extensions.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e))
}

fn classify_metadata(path: &Path, meta: &Metadata) -> ResourceEntry {
    if meta.is_dir() {
        ResourceEntry::Directory
    } else if meta.is_file() && meta.len() > 0 && is_image_path(path) {
        ResourceEntry::Image { size: meta.len() }
    } else {
        ResourceEntry::Absent
    }
}

/// Stat `path` and classify it. Every stat failure is [`ResourceEntry::Absent`].
pub async fn classify(path: &Path) -> ResourceEntry {
    match fs::metadata(path).await {
        Ok(meta) => classify_metadata(path, &meta),
        Err(_) => ResourceEntry::Absent,
    }
}

/// Resolve `root + sub_path` into a client-facing description.
///
/// `depth` controls directory listing: at depth 0 a directory is described
/// on its own, at depth `n` its `items` hold its children resolved at
/// depth `n - 1`. Returns `None` for anything that is not a directory or a
/// supported image; no partial description is ever produced.
pub async fn file_info(
    id: &Identifier,
    root: &Path,
    sub_path: &str,
    depth: u32,
) -> Option<FileInfo> {
    let full_path = join_sub_path(root, sub_path);
    let meta = fs::metadata(&full_path).await.ok()?;
    let entry = classify_metadata(&full_path, &meta);
    let base = format!("/id/{}{}", id, escape_path(sub_path));

    let mut info = FileInfo {
        name: display_name(&full_path),
        created: meta
            .created()
            .or_else(|_| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from)?,
        modified: meta.modified().ok().map(DateTime::<Utc>::from)?,
        size: None,
        thumb_url: String::new(),
        index_url: None,
        image_url: None,
        items: None,
    };

    match entry {
        ResourceEntry::Directory => {
            info.thumb_url = FOLDER_ICON_URL.to_string();
            info.index_url = Some(format!("{base}?type=index"));
            if depth > 0 {
                info.items = Some(list_children(id, root, sub_path, depth - 1).await);
            }
        }
        ResourceEntry::Image { size } => {
            info.size = Some(size);
            info.image_url = Some(format!("{base}?type=image"));
            info.thumb_url = format!("{base}?type=thumb");
            info.items = Some(Vec::new());
        }
        ResourceEntry::Absent => return None,
    }
    Some(info)
}

/// Describe the children of a directory, skipping absent entries and names
/// that are not UTF-8. Sorted by name.
///
/// Boxed because it recurses back into [`file_info`].
fn list_children<'a>(
    id: &'a Identifier,
    root: &'a Path,
    sub_path: &'a str,
    depth: u32,
) -> Pin<Box<dyn Future<Output = Vec<FileInfo>> + Send + 'a>> {
    Box::pin(async move {
        let dir = join_sub_path(root, sub_path);
        let mut names = Vec::new();
        match fs::read_dir(&dir).await {
            Ok(mut entries) => loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => match entry.file_name().into_string() {
                        Ok(name) => names.push(name),
                        Err(raw) => tracing::debug!(?raw, "skipping non UTF-8 entry"),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(dir = %dir.display(), error = %e, "listing cut short");
                        break;
                    }
                }
            },
            Err(e) => tracing::debug!(dir = %dir.display(), error = %e, "directory not listable"),
        }
        names.sort();

        let mut items = Vec::with_capacity(names.len());
        for name in names {
            let child = format!("{sub_path}/{name}");
            if let Some(info) = file_info(id, root, &child, depth).await {
                items.push(info);
            }
        }
        items
    })
}

/// `root + sub_path`, where `sub_path` is `""` or `/a/b`.
pub fn join_sub_path(root: &Path, sub_path: &str) -> PathBuf {
    sub_path
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |acc, segment| acc.join(segment))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{identifier, write_bytes};
    use std::fs as stdfs;
    use tempfile::TempDir;

    // =========================================================================
    // classify() tests
    // =========================================================================

    #[test]
    fn image_extensions_are_case_sensitive() {
        assert!(is_image_path(Path::new("/a/photo.jpg")));
        assert!(is_image_path(Path::new("/a/photo.jpeg")));
        assert!(is_image_path(Path::new("/a/photo.png")));
        assert!(is_image_path(Path::new("/a/photo.gif")));
        assert!(!is_image_path(Path::new("/a/photo.JPG")));
        assert!(!is_image_path(Path::new("/a/photo.webp")));
        assert!(!is_image_path(Path::new("/a/jpg")));
    }

    #[tokio::test]
    async fn classify_directory_image_and_absent() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("a.png"), 42);
        write_bytes(&tmp.path().join("empty.png"), 0);
        write_bytes(&tmp.path().join("notes.txt"), 10);

        assert_eq!(classify(tmp.path()).await, ResourceEntry::Directory);
        assert_eq!(
            classify(&tmp.path().join("a.png")).await,
            ResourceEntry::Image { size: 42 }
        );
        assert_eq!(classify(&tmp.path().join("empty.png")).await, ResourceEntry::Absent);
        assert_eq!(classify(&tmp.path().join("notes.txt")).await, ResourceEntry::Absent);
        assert_eq!(classify(&tmp.path().join("missing.png")).await, ResourceEntry::Absent);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn classify_symlink_loop_is_absent() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.jpg");
        let b = tmp.path().join("b.jpg");
        std::os::unix::fs::symlink(&b, &a).unwrap();
        std::os::unix::fs::symlink(&a, &b).unwrap();
        assert_eq!(classify(&a).await, ResourceEntry::Absent);
    }

    // =========================================================================
    // file_info() tests
    // =========================================================================

    #[tokio::test]
    async fn directory_info_has_index_url_and_no_size() {
        let tmp = TempDir::new().unwrap();
        stdfs::create_dir(tmp.path().join("Trip 2012")).unwrap();
        let id = identifier();

        let info = file_info(&id, tmp.path(), "/Trip 2012", 0).await.unwrap();
        assert_eq!(info.name, "Trip 2012");
        assert_eq!(info.size, None);
        assert_eq!(info.thumb_url, FOLDER_ICON_URL);
        assert_eq!(
            info.index_url.as_deref(),
            Some(format!("/id/{id}/Trip%202012?type=index").as_str())
        );
        assert_eq!(info.image_url, None);
        assert_eq!(info.items, None);
    }

    #[tokio::test]
    async fn root_directory_index_url_has_no_sub_path() {
        let tmp = TempDir::new().unwrap();
        let id = identifier();
        let info = file_info(&id, tmp.path(), "", 0).await.unwrap();
        assert_eq!(
            info.index_url.as_deref(),
            Some(format!("/id/{id}?type=index").as_str())
        );
    }

    #[tokio::test]
    async fn image_info_has_urls_and_size() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("photo.png"), 10240);
        let id = identifier();

        let info = file_info(&id, tmp.path(), "/photo.png", 1).await.unwrap();
        assert_eq!(info.name, "photo.png");
        assert_eq!(info.size, Some(10240));
        assert_eq!(
            info.image_url.as_deref(),
            Some(format!("/id/{id}/photo.png?type=image").as_str())
        );
        assert_eq!(info.thumb_url, format!("/id/{id}/photo.png?type=thumb"));
        assert_eq!(info.index_url, None);
        assert_eq!(info.items, Some(Vec::new()));
    }

    #[tokio::test]
    async fn rejected_files_resolve_to_none() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("empty.jpg"), 0);
        write_bytes(&tmp.path().join("photo.JPG"), 100);
        write_bytes(&tmp.path().join("clip.mov"), 100);
        let id = identifier();

        for sub in ["/empty.jpg", "/photo.JPG", "/clip.mov", "/missing.png"] {
            assert_eq!(file_info(&id, tmp.path(), sub, 1).await, None, "{sub}");
        }
    }

    #[tokio::test]
    async fn listing_includes_supported_children_sorted() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("b.jpg"), 5);
        write_bytes(&tmp.path().join("a.gif"), 7);
        write_bytes(&tmp.path().join("readme.txt"), 9);
        write_bytes(&tmp.path().join("zero.png"), 0);
        stdfs::create_dir(tmp.path().join("sub")).unwrap();
        write_bytes(&tmp.path().join("sub").join("deep.png"), 3);
        let id = identifier();

        let info = file_info(&id, tmp.path(), "", 1).await.unwrap();
        let items = info.items.unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a.gif", "b.jpg", "sub"]);

        // Children are listed one level deep only
        let sub = items.iter().find(|i| i.name == "sub").unwrap();
        assert_eq!(sub.items, None);
        assert_eq!(
            sub.index_url.as_deref(),
            Some(format!("/id/{id}/sub?type=index").as_str())
        );
        assert_eq!(items[0].size, Some(7));
    }

    #[tokio::test]
    async fn serialized_field_names() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("photo.png"), 12);
        let id = identifier();

        let info = file_info(&id, tmp.path(), "/photo.png", 0).await.unwrap();
        let json = serde_json::to_value(&info).unwrap();
        for key in ["name", "created", "modified", "size", "thumbURL", "imageURL", "items"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json.get("indexURL").is_none());
    }

    #[test]
    fn join_sub_path_appends_segments() {
        assert_eq!(join_sub_path(Path::new("/r"), ""), Path::new("/r"));
        assert_eq!(join_sub_path(Path::new("/r"), "/a/b c"), Path::new("/r/a/b c"));
    }
}
