//! Key validation.
//!
//! Keys are relative, slash-separated names (`"history/script-revisions.v2"`).
//! Backends that map keys onto a filesystem rely on this to keep every key
//! inside the storage root.

use crate::error::{ErrorKind, Result};

/// Validates a storage key and returns its normalized form.
///
/// Segments are split on `/` only. Empty and `.` segments are dropped and
/// `..` removes the previous segment; popping past the root is an error, as
/// is a key with nothing left. NUL and backslash are refused outright, since
/// filesystems either truncate at the first or treat the second as a separator.
///
/// # Examples
///
/// ```
/// use draftcast_storage::validate_key;
/// // Valid keys
/// assert!(validate_key("script-revisions.v2").is_ok());
/// assert!(validate_key("history/project/ep-1").is_ok());
/// // Invalid keys
/// assert!(validate_key("../outside").is_err());
/// assert!(validate_key("a\0b").is_err());
/// // Keys get resolved
/// assert_eq!(validate_key("a//./b/../c/").unwrap(), "a/c");
/// ```
pub fn validate(key: impl AsRef<str>) -> Result<String> {
    let raw = key.as_ref();
    if raw.contains(['\0', '\\']) {
        exn::bail!(ErrorKind::InvalidKey(raw.to_string()));
    }
    let segments = raw.split('/').try_fold(Vec::new(), |mut kept, segment| {
        match segment {
            "" | "." => {},
            ".." => {
                kept.pop()?;
            },
            name => kept.push(name),
        }
        Some(kept)
    });
    match segments {
        Some(kept) if !kept.is_empty() => Ok(kept.join("/")),
        _ => exn::bail!(ErrorKind::InvalidKey(raw.to_string())),
    }
}
