//! # galleryd
//!
//! A local image-gallery server. Directories on disk are browsed through a
//! web client, but the client never sees a filesystem path: every gallery
//! root is exposed as a short opaque identifier, and the server keeps the
//! mapping back.
//!
//! # Architecture: Resolve, Then Respond
//!
//! Every request goes through the same three steps:
//!
//! ```text
//! 1. Decode     "/id/AbX9_k2-Qm1z0w/My%20Trip/01.jpg?type=thumb"
//!               → ["id", "AbX9_k2-Qm1z0w", "My Trip", "01.jpg"] + type=thumb
//! 2. Resolve    route tree → Address Record → filesystem / thumbnail cache
//!               → Outcome::File(path) | Outcome::Index(FileInfo) | DispatchError
//! 3. Respond    stream the file, serialize the description, or map the error
//!               to 400 / 404 / 405 / 500
//! ```
//!
//! Keeping resolution free of HTTP response types means the whole route tree
//! is testable by asserting on [`dispatch::Outcome`] values, and the HTTP
//! layer stays a thin adapter.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`address`] | Salted path → identifier hashing and the sharded on-disk record store |
//! | [`request`] | Path decoding with traversal checks, and per-segment URL escaping |
//! | [`metadata`] | Classifies entries (directory / image / absent) and builds `FileInfo` |
//! | [`cache`] | Thumbnail cache contract plus the on-disk, single-flight implementation |
//! | [`imaging`] | Pure-Rust thumbnail rendering behind the `ImageBackend` trait |
//! | [`dispatch`] | The route tree: static fallback, `/id`, and the `type` selector |
//! | [`server`] | axum router, listener and graceful shutdown |
//! | [`config`] | `galleryd.toml` loading, merging and validation |
//! | [`types`] | Client-facing JSON types (`FileInfo`) |
//!
//! # Design Decisions
//!
//! ## Identifiers Are Capabilities
//!
//! An identifier is `SHA-256(salt ‖ path)`, base64url-encoded and cut to 14
//! characters. Without the salt a client cannot compute the identifier of a
//! path it guesses, so only directories someone registered are reachable.
//! The reverse map is a plain file per identifier, sharded by its first two
//! characters:
//!
//! ```text
//! {data_dir}/Files/Ab/AbX9_k2-Qm1z0w    → "/home/me/Pictures/2024"
//! ```
//!
//! Records are append-only. A later save for the same identifier with a
//! different path keeps the first record and logs the conflict.
//!
//! ## A Closed Route Table
//!
//! The root's named children are the variants of [`dispatch::RootRoute`] and
//! the representations under an identifier are the variants of
//! [`dispatch::Representation`]. Anything the root doesn't name falls back to
//! a static file from the client directory; anything unknown below the root
//! is a client error. There is no dynamic handler lookup to go wrong.
//!
//! ## Injected Thumbnail Cache
//!
//! The dispatcher holds an `Arc<dyn ThumbnailCache>` handed to it at
//! construction. Production wires a [`cache::DiskThumbnailCache`] rendering
//! with [`imaging::RustBackend`]; tests wire the same cache around a counting
//! mock backend to check that concurrent requests render once.
//!
//! ## Pure-Rust Imaging
//!
//! Thumbnails are decoded, resized (Lanczos3) and encoded with the `image`
//! crate alone. No system libraries, so the binary runs anywhere it builds.

pub mod address;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod imaging;
pub mod metadata;
pub mod request;
pub mod server;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
