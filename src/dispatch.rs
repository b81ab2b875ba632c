//! Request dispatch: decoded path → terminal [`Outcome`].
//!
//! Every request walks a small, fixed tree. The root's named children are
//! the [`RootRoute`] variants; anything else at the root is a static asset.
//! Below `/id/{identifier}` the representation is picked by the `type`
//! query parameter rather than by another path segment.
//!
//! ```text
//! /                                  static asset (or a directory's index.html)
//! /id/{identifier}{sub-path}         viewer document
//!                     ?type=index    JSON description (FileInfo)
//!                     ?type=image    raw image bytes
//!                     ?type=thumb    cached thumbnail bytes
//! ```
//!
//! Resolution and response are separate steps: [`Dispatcher::resolve`]
//! produces a typed [`Outcome`] or [`DispatchError`], and
//! [`Dispatcher::dispatch`] turns that into an HTTP response. Files go
//! through `tower_http`'s `ServeFile`, which sets the content type and
//! answers conditional and range requests.
//!
//! | Failure | Status |
//! |---------|--------|
//! | traversal, undecodable path, unknown `type`, `/id` without identifier | 400 |
//! | unresolved identifier, absent or unsupported entry, thumbnail unavailable | 404 |
//! | method other than GET/HEAD | 405 |
//! | unexpected filesystem error on a static asset | 500 |

use crate::address::{AddressStore, Identifier};
use crate::cache::ThumbnailCache;
use crate::metadata::{self, ResourceEntry};
use crate::request::{PathError, decode_components, path_from_components};
use crate::types::FileInfo;
use axum::Json;
use axum::body::Body;
use axum::extract::{Query, Request};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tower::ServiceExt;
use tower_http::services::ServeFile;

/// Document served for a directory on the static fallback.
pub const DEFAULT_DOCUMENT: &str = "index.html";

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<PathError> for DispatchError {
    fn from(e: PathError) -> Self {
        DispatchError::BadRequest(e.to_string())
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = match &self {
            DispatchError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DispatchError::NotFound => StatusCode::NOT_FOUND,
            DispatchError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::Io(e) => {
                tracing::error!(error = %e, "filesystem error while dispatching");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

// =============================================================================
// Route table
// =============================================================================

/// Named children of the dispatch root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootRoute {
    /// `/id/{identifier}{sub-path}`
    Id,
}

impl RootRoute {
    pub const ALL: &[RootRoute] = &[RootRoute::Id];

    pub fn segment(self) -> &'static str {
        match self {
            RootRoute::Id => "id",
        }
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.segment() == segment)
    }
}

/// What an `/id/...` request asks for, selected by `?type=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// No `type`: the gallery viewer document.
    Viewer,
    Index,
    Image,
    Thumb,
}

impl Representation {
    /// Representations reachable through an explicit `type` value.
    pub const ALL: &[Representation] = &[
        Representation::Index,
        Representation::Image,
        Representation::Thumb,
    ];

    pub fn query_value(self) -> Option<&'static str> {
        match self {
            Representation::Viewer => None,
            Representation::Index => Some("index"),
            Representation::Image => Some("image"),
            Representation::Thumb => Some("thumb"),
        }
    }

    /// Map a `type` value to a representation. Absent or empty selects the
    /// viewer; anything unrecognized is a client error.
    pub fn from_query(value: Option<&str>) -> Result<Self, DispatchError> {
        match value {
            None | Some("") => Ok(Representation::Viewer),
            Some(v) => Self::ALL
                .iter()
                .copied()
                .find(|r| r.query_value() == Some(v))
                .ok_or_else(|| DispatchError::BadRequest(format!("unknown type: {v}"))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TypeQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
}

// =============================================================================
// Contexts threaded through the tree
// =============================================================================

/// A request after method and path checks.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub components: Vec<String>,
    pub uri: Uri,
}

impl RequestContext {
    pub fn new(method: &Method, uri: &Uri) -> Result<Self, DispatchError> {
        if method != Method::GET && method != Method::HEAD {
            return Err(DispatchError::MethodNotAllowed);
        }
        Ok(Self {
            components: decode_components(uri.path())?,
            uri: uri.clone(),
        })
    }

    /// The raw `type` query value, if any.
    fn type_param(&self) -> Result<Option<String>, DispatchError> {
        Query::<TypeQuery>::try_from_uri(&self.uri)
            .map(|Query(q)| q.kind)
            .map_err(|e| DispatchError::BadRequest(e.body_text()))
    }
}

/// A request whose identifier resolved to a recorded root.
#[derive(Debug, Clone)]
pub struct IdContext {
    pub identifier: Identifier,
    pub root_path: PathBuf,
    /// `""` for the root itself, else `/a/b`.
    pub sub_path: String,
    pub full_path: PathBuf,
}

impl IdContext {
    pub fn new(identifier: Identifier, root_path: PathBuf, rest: &[String]) -> Self {
        let sub_path = path_from_components(rest);
        let full_path = metadata::join_sub_path(&root_path, &sub_path);
        Self {
            identifier,
            root_path,
            sub_path,
            full_path,
        }
    }
}

/// Terminal result of a resolved request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Stream this file.
    File(PathBuf),
    /// Answer with this description as JSON.
    Index(FileInfo),
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Resolves requests against the address store, the filesystem and the
/// thumbnail cache.
pub struct Dispatcher {
    store: Arc<AddressStore>,
    thumbnails: Arc<dyn ThumbnailCache>,
    client_root: PathBuf,
    viewer_document: PathBuf,
}

impl Dispatcher {
    pub fn new(
        store: Arc<AddressStore>,
        thumbnails: Arc<dyn ThumbnailCache>,
        client_root: impl Into<PathBuf>,
        viewer_document: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            thumbnails,
            client_root: client_root.into(),
            viewer_document: viewer_document.into(),
        }
    }

    /// Handle one request end to end.
    pub async fn dispatch(&self, req: Request) -> Response {
        match self.resolve(req.method(), req.uri()).await {
            Ok(Outcome::File(path)) => serve_file(path, req).await,
            Ok(Outcome::Index(info)) => Json(info).into_response(),
            Err(e) => e.into_response(),
        }
    }

    /// Walk the route tree for `uri`.
    #[tracing::instrument(skip(self, uri), fields(path = %uri.path()))]
    pub async fn resolve(&self, method: &Method, uri: &Uri) -> Result<Outcome, DispatchError> {
        let ctx = RequestContext::new(method, uri)?;
        match ctx.components.split_first() {
            Some((first, rest)) => match RootRoute::from_segment(first) {
                Some(RootRoute::Id) => self.resolve_id(&ctx, rest).await,
                None => self.resolve_static(&ctx.components).await,
            },
            None => self.resolve_static(&[]).await,
        }
    }

    async fn resolve_id(
        &self,
        ctx: &RequestContext,
        rest: &[String],
    ) -> Result<Outcome, DispatchError> {
        let (token, sub) = rest
            .split_first()
            .ok_or_else(|| DispatchError::BadRequest("missing identifier".into()))?;
        // A malformed token can never have a record
        let identifier = Identifier::parse(token).map_err(|_| DispatchError::NotFound)?;
        let root = self
            .store
            .path_for(&identifier)
            .await
            .ok_or(DispatchError::NotFound)?;
        let id_ctx = IdContext::new(identifier, PathBuf::from(root), sub);

        let representation = Representation::from_query(ctx.type_param()?.as_deref())?;
        tracing::debug!(identifier = %id_ctx.identifier, sub_path = %id_ctx.sub_path, ?representation, "resolved identifier");
        self.resolve_representation(&id_ctx, representation).await
    }

    async fn resolve_representation(
        &self,
        ctx: &IdContext,
        representation: Representation,
    ) -> Result<Outcome, DispatchError> {
        match representation {
            Representation::Viewer => Ok(Outcome::File(self.viewer_document.clone())),
            Representation::Index => {
                metadata::file_info(&ctx.identifier, &ctx.root_path, &ctx.sub_path, 1)
                    .await
                    .map(Outcome::Index)
                    .ok_or(DispatchError::NotFound)
            }
            Representation::Image => {
                require_image(ctx).await?;
                Ok(Outcome::File(ctx.full_path.clone()))
            }
            Representation::Thumb => {
                require_image(ctx).await?;
                match self.thumbnails.cache_path_for(&ctx.full_path).await {
                    Ok(thumb) => Ok(Outcome::File(thumb)),
                    Err(e) => {
                        tracing::warn!(source = %ctx.full_path.display(), error = %e, "thumbnail unavailable");
                        Err(DispatchError::NotFound)
                    }
                }
            }
        }
    }

    /// Serve `components` literally from the client asset root. A directory
    /// serves its [`DEFAULT_DOCUMENT`].
    async fn resolve_static(&self, components: &[String]) -> Result<Outcome, DispatchError> {
        let path = components
            .iter()
            .fold(self.client_root.clone(), |acc, c| acc.join(c));
        let meta = stat(&path).await?;
        if meta.is_file() {
            return Ok(Outcome::File(path));
        }
        if meta.is_dir() {
            let document = path.join(DEFAULT_DOCUMENT);
            if stat(&document).await?.is_file() {
                return Ok(Outcome::File(document));
            }
        }
        Err(DispatchError::NotFound)
    }
}

async fn require_image(ctx: &IdContext) -> Result<(), DispatchError> {
    match metadata::classify(&ctx.full_path).await {
        ResourceEntry::Image { .. } => Ok(()),
        ResourceEntry::Directory | ResourceEntry::Absent => Err(DispatchError::NotFound),
    }
}

/// `stat` with missing entries mapped to [`DispatchError::NotFound`].
async fn stat(path: &std::path::Path) -> Result<std::fs::Metadata, DispatchError> {
    tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => DispatchError::NotFound,
        _ => DispatchError::Io(e),
    })
}

async fn serve_file(path: PathBuf, req: Request) -> Response {
    match ServeFile::new(path).oneshot(req).await {
        Ok(res) => res.map(Body::new),
        Err(never) => match never {},
    }
}
