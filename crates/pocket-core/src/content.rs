//! Text normalization shared by note storage, prompts, and audit records.
//!
//! All limits are in characters (Unicode scalar values), never bytes, so
//! clipping never splits a multi-byte character.

use crate::defaults::{CONTENT_STORED_CHARS, PREVIEW_CHARS};

/// Return the longest prefix of `input` holding at most `max_chars` characters.
pub fn clip_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &input[..byte_idx],
        None => input,
    }
}

/// Content as stored on a planet: trimmed, then capped.
pub fn normalize_content(input: &str) -> String {
    clip_chars(input.trim(), CONTENT_STORED_CHARS).to_string()
}

/// Preview kept on categorization records: whitespace runs collapsed to a
/// single space, trimmed, then capped.
pub fn normalize_preview(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    clip_chars(&collapsed, PREVIEW_CHARS).to_string()
}

/// Preview marker for image categorizations.
pub fn image_preview(object_key: &str) -> String {
    format!("[image] {}", object_key)
}

/// URL/path-safe slug: lowercase ASCII alphanumerics separated by single
/// dashes, no leading or trailing dash.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}
