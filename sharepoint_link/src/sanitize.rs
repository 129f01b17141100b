//! Filesystem-safe local names for remote paths.

use crate::error::{Result, ShareError};

/// Components must stay strictly below this many UTF-8 bytes.
///
/// Leaves headroom under the common 255-byte NAME_MAX for download managers
/// that append their own suffixes.
pub const MAX_COMPONENT_BYTES: usize = 240;

/// Inserted where a truncated name was cut.
pub const OMIT_MARKER: &str = "(omit)";

/// Characters rejected by at least one common filesystem, and their full-width
/// look-alikes.
const REPLACEMENTS: [(char, char); 9] = [
    ('<', '＜'),
    ('>', '＞'),
    (':', '：'),
    ('"', '”'),
    ('/', '／'),
    ('\\', '＼'),
    ('|', '｜'),
    ('?', '？'),
    ('*', '＊'),
];

/// Replace disallowed characters with their full-width substitutes.
///
/// ```
/// use sharepoint_link::sanitize::replace_reserved_chars;
///
/// assert_eq!(replace_reserved_chars("a:b?.txt"), "a：b？.txt");
/// ```
pub fn replace_reserved_chars(component: &str) -> String {
    component
        .chars()
        .map(|c| {
            REPLACEMENTS
                .iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect()
}

/// Shorten `component` below [`MAX_COMPONENT_BYTES`], keeping its start.
///
/// With `keep_ext` the text from the last `.` on is carried over unchanged.
/// The cut is marked with [`OMIT_MARKER`].
pub fn truncate_if_too_long(component: &str, keep_ext: bool) -> Result<String> {
    if component.len() < MAX_COMPONENT_BYTES {
        return Ok(component.to_string());
    }

    if keep_ext {
        if let Some(dot) = component.rfind('.') {
            let (stem, suffix) = component.split_at(dot);
            if let Some(truncated) = shrink(stem, suffix) {
                return Ok(truncated);
            }
        }
    }

    shrink(component, "").ok_or_else(|| ShareError::TruncationError(component.to_string()))
}

/// Longest `<stem prefix>(omit)<suffix>` that fits, trimming one char at a time.
fn shrink(stem: &str, suffix: &str) -> Option<String> {
    let boundaries = stem
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(stem.len()));
    let mut ends: Vec<usize> = boundaries.collect();
    ends.reverse();

    ends.into_iter()
        .map(|end| format!("{}{}{}", &stem[..end], OMIT_MARKER, suffix))
        .find(|candidate| candidate.len() < MAX_COMPONENT_BYTES)
}

/// Make every component of a remote path safe to use as a local name.
///
/// Only the last component keeps its extension when truncated.
pub fn sanitize_path<S: AsRef<str>>(components: &[S]) -> Result<Vec<String>> {
    let last = components.len().saturating_sub(1);
    components
        .iter()
        .enumerate()
        .map(|(i, component)| {
            let replaced = replace_reserved_chars(component.as_ref());
            truncate_if_too_long(&replaced, i == last)
        })
        .collect()
}
