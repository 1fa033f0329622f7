//! Collapse manifest rows to one fetch per distinct payload.

use std::collections::HashSet;

use crate::descriptor::TileDescriptor;

/// Return the first descriptor for each distinct digest, in manifest order.
///
/// Identical payloads (blank sea tiles are the usual case) appear under many
/// paths; only one of them needs to be downloaded.
///
/// # Examples
/// ```
/// use tilemirror_core::{ContentDigest, TileDescriptor, unique_by_digest};
///
/// let row = |path: &str, digest: &str| TileDescriptor {
///     path: path.to_owned(),
///     modified_stamp: 0,
///     byte_size: 1,
///     digest: ContentDigest::new(digest).expect("hex digest"),
/// };
/// let rows = [row("1/0/0.png", "aa"), row("1/1/0.png", "aa"), row("1/0/1.png", "bb")];
/// let unique = unique_by_digest(&rows);
/// assert_eq!(unique.len(), 2);
/// assert_eq!(unique[0].path, "1/0/0.png");
/// ```
#[must_use]
pub fn unique_by_digest(descriptors: &[TileDescriptor]) -> Vec<&TileDescriptor> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(descriptors.len());
    let mut unique = Vec::new();
    for descriptor in descriptors {
        if seen.insert(descriptor.digest.as_str()) {
            unique.push(descriptor);
        }
    }
    unique
}
