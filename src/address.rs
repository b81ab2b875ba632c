//! Opaque path addressing.
//!
//! Every gallery root is exposed to clients as a short [`Identifier`] instead
//! of its filesystem path. The identifier is a salted digest, so a client can
//! neither derive it from a path nor recover a path from it: the mapping back
//! lives only in the server-side record store.
//!
//! ## Identifier derivation
//!
//! ```text
//! SHA-256(salt ‖ path) → URL-safe base64 → first 14 chars
//! ```
//!
//! Fourteen base64 characters carry 84 bits, short enough for readable URLs
//! and far beyond any realistic number of registered roots.
//!
//! ## Record layout
//!
//! ```text
//! {records_dir}/
//! ├── Ab/
//! │   └── AbX9_k2-Qm1z0w     # literal path text
//! └── zQ/
//!     └── zQ0c...
//! ```
//!
//! Shard directories are keyed by the identifier's first two characters to
//! bound fan-out. Records are written once and never rewritten: if a later
//! save for the same identifier carries a different path, the first record
//! wins and the conflict is logged.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;

/// Length of an identifier in characters.
pub const IDENTIFIER_LEN: usize = 14;

#[derive(Error, Debug)]
pub enum AddressError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

/// A short, URL-safe token standing in for a filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Parse a client-supplied token.
    ///
    /// Anything that is not exactly [`IDENTIFIER_LEN`] characters of the
    /// URL-safe base64 alphabet is rejected, which also keeps path
    /// separators out of record file names.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let valid = s.len() == IDENTIFIER_LEN
            && s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(AddressError::InvalidIdentifier(s.to_string()))
        }
    }

    /// First two characters, used as the shard directory name.
    pub fn prefix(&self) -> &str {
        &self.0[..2]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Salted path hashing plus the persistent identifier → path index.
#[derive(Debug, Clone)]
pub struct AddressStore {
    records_dir: PathBuf,
    salt: String,
}

impl AddressStore {
    pub fn new(records_dir: impl Into<PathBuf>, salt: impl Into<String>) -> Self {
        Self {
            records_dir: records_dir.into(),
            salt: salt.into(),
        }
    }

    /// Compute the identifier for `path` without touching the store.
    pub fn compute(&self, path: &str) -> Identifier {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(path.as_bytes());
        let encoded = URL_SAFE_NO_PAD.encode(hasher.finalize());
        Identifier(encoded[..IDENTIFIER_LEN].to_string())
    }

    /// Compute the identifier for `path`, optionally persisting its record.
    ///
    /// A failed write is logged and otherwise ignored: the identifier is
    /// still valid, it just won't resolve until a later save succeeds.
    pub async fn identifier_for(&self, path: &str, persist: bool) -> Identifier {
        let id = self.compute(path);
        if persist && let Err(e) = self.save(&id, path).await {
            tracing::warn!(identifier = %id, path, error = %e, "failed to persist address record");
        }
        id
    }

    /// Look up the path recorded for `id`.
    ///
    /// Missing records and read failures are both reported as `None`.
    pub async fn path_for(&self, id: &Identifier) -> Option<String> {
        match fs::read_to_string(self.record_path(id)).await {
            Ok(path) => Some(path),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::debug!(identifier = %id, error = %e, "address record unreadable");
                }
                None
            }
        }
    }

    /// Write the record for `id` unless one already exists.
    ///
    /// The record is staged under a unique temporary name in the shard
    /// directory and renamed into place, so readers never see a partial file.
    #[tracing::instrument(skip(self, id), fields(identifier = %id))]
    pub async fn save(&self, id: &Identifier, path: &str) -> Result<(), AddressError> {
        let record = self.record_path(id);
        match fs::read_to_string(&record).await {
            Ok(existing) if existing == path => return Ok(()),
            Ok(existing) => {
                tracing::warn!(
                    identifier = %id,
                    recorded = %existing,
                    requested = path,
                    "identifier already recorded for a different path; keeping the first"
                );
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let shard = self.records_dir.join(id.prefix());
        fs::create_dir_all(&shard).await?;
        let staging = shard.join(format!(".{}.{}", id, uuid::Uuid::new_v4()));
        fs::write(&staging, path).await?;
        if let Err(e) = fs::rename(&staging, &record).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        tracing::debug!(identifier = %id, path, "address record written");
        Ok(())
    }

    /// Where the record for `id` lives on disk.
    pub fn record_path(&self, id: &Identifier) -> PathBuf {
        self.records_dir.join(id.prefix()).join(id.as_str())
    }
}
