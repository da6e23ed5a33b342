//! Marker recognition and small text utilities.

use regex::Regex;
use std::sync::LazyLock;

/// Tag that introduces the narrator's voice.
pub const NARRATOR_TAG: &str = "{narrator}:";
/// Tag that introduces the human participant.
pub const USER_TAG: &str = "{user}:";
/// Out-of-character prefix.
pub const OOC_MARKER: &str = "ooc:";

// An OOC lead, optionally behind the narrator tag ("{narrator}:\nooc: ...")
static OOC_LEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:\{narrator\}:\s*)?ooc:").unwrap());
static OOC_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:\{narrator\}:\s*)?ooc:\s*").unwrap());
static ROLE_TAG_LEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*\{(?:narrator|user)\}:\s*").unwrap());

/// Find the largest valid UTF-8 char boundary <= index.
pub fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        s.len()
    } else if s.is_char_boundary(index) {
        index
    } else {
        let mut i = index;
        while i > 0 && !s.is_char_boundary(i) {
            i -= 1;
        }
        i
    }
}

/// True when the trimmed text opens with the OOC marker.
pub fn is_ooc(text: &str) -> bool {
    OOC_LEAD_RE.is_match(text)
}

/// Remove a leading OOC marker (and a narrator tag in front of it).
///
/// Returns the text unchanged when it is not OOC.
pub fn strip_ooc_prefix(text: &str) -> &str {
    match OOC_PREFIX_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// Remove a leading `{narrator}:` or `{user}:` tag.
pub fn strip_role_tag(text: &str) -> &str {
    match ROLE_TAG_LEAD_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// True for a line that holds nothing but a role tag.
pub fn is_role_marker_line(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    lower == NARRATOR_TAG || lower == USER_TAG
}

/// Join two turn bodies with a blank line.
pub fn join_blocks(first: &str, second: &str) -> String {
    format!("{}\n\n{}", first, second)
}

/// Single-line excerpt of at most `max_len` bytes, for log messages.
pub fn excerpt(text: &str, max_len: usize) -> String {
    let flat = text.trim().replace(['\r', '\n'], " ");
    let end = floor_char_boundary(&flat, max_len);
    if end < flat.len() {
        format!("{}...", &flat[..end])
    } else {
        flat
    }
}
