//! Request path decoding and URL escaping.
//!
//! Incoming paths are split on `/`, each segment is percent-decoded, and the
//! result is checked before any routing happens. Outgoing URLs escape every
//! segment with the inverse of that decoding, so any UTF-8 filename survives
//! the round trip.
//!
//! ```text
//! "/id/AbX9_k2-Qm1z0w/My%20Trip/01.jpg"
//!   → ["id", "AbX9_k2-Qm1z0w", "My Trip", "01.jpg"]
//! ```

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use thiserror::Error;

/// Everything except RFC 3986 unreserved characters is escaped.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Characters a decoded segment may not contain: anything the platform
/// treats as a separator, plus NUL.
const FORBIDDEN_IN_SEGMENT: &[char] = if cfg!(windows) {
    &['/', '\\', '\0']
} else {
    &['/', '\0']
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("segment is not valid UTF-8 after decoding")]
    InvalidUtf8,
    #[error("parent directory segment")]
    Traversal,
    #[error("segment contains a separator or NUL: {0:?}")]
    IllegalSegment(String),
}

/// Split a raw URL path into decoded segments.
///
/// Empty segments are dropped, so `/`, `` and `//` all decode to the root.
/// A segment that decodes to `..`, or that smuggles a separator or NUL
/// through percent-encoding, is rejected. A backslash is only a separator
/// on Windows; elsewhere it is an ordinary filename character.
pub fn decode_components(raw: &str) -> Result<Vec<String>, PathError> {
    raw.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            let segment = percent_decode_str(s)
                .decode_utf8()
                .map_err(|_| PathError::InvalidUtf8)?;
            if segment == ".." {
                return Err(PathError::Traversal);
            }
            if segment.contains(FORBIDDEN_IN_SEGMENT) {
                return Err(PathError::IllegalSegment(segment.into_owned()));
            }
            Ok(segment.into_owned())
        })
        .collect()
}

/// Join components back into a sub-path: `""` for the root, else `/a/b`.
pub fn path_from_components(components: &[String]) -> String {
    components.iter().map(|c| format!("/{c}")).collect()
}

/// Percent-encode each segment of a sub-path, keeping the separators.
pub fn escape_path(sub_path: &str) -> String {
    sub_path
        .split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}
