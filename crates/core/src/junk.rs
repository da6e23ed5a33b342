//! Junk turn classification.
//!
//! A junk turn carries no usable content: it is empty, a bare marker, or a
//! speaker label with nothing after it ("Firestorm:").

use crate::turn::Turn;
use crate::BARE_LABEL_WORD_LIMIT;

/// Bare markers that never carry content on their own (compared lower-cased).
const BARE_MARKERS: [&str; 3] = ["ooc:", "ooc: {user}:", "{user}:"];

/// True when `turn` carries no usable content.
pub fn is_junk(turn: &Turn) -> bool {
    is_junk_text(&turn.text, BARE_LABEL_WORD_LIMIT)
}

/// Text-level junk predicate with an explicit bare-label word limit.
///
/// A trimmed text ending in ':' with fewer than `word_limit` words is a bare
/// speaker label, whichever side it came from.
pub fn is_junk_text(text: &str, word_limit: usize) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }

    let lower = trimmed.to_lowercase();
    if BARE_MARKERS.contains(&lower.as_str()) {
        return true;
    }

    lower.ends_with(':') && trimmed.split_whitespace().count() < word_limit
}

/// Drop junk turns, returning the survivors and how many were removed.
pub fn scrub(turns: Vec<Turn>, word_limit: usize) -> (Vec<Turn>, usize) {
    let before = turns.len();
    let kept: Vec<Turn> = turns
        .into_iter()
        .filter(|turn| !is_junk_text(&turn.text, word_limit))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_whitespace() {
        assert!(is_junk(&Turn::narrator("")));
        assert!(is_junk(&Turn::user("  \n\t ")));
    }

    #[test]
    fn test_bare_markers() {
        assert!(is_junk(&Turn::user("ooc:")));
        assert!(is_junk(&Turn::user(" OOC: {user}: ")));
        assert!(is_junk(&Turn::narrator("{USER}:")));
        assert!(is_junk(&Turn::narrator("{narrator}:")));
    }

    #[test]
    fn test_bare_speaker_label() {
        assert!(is_junk(&Turn::narrator("Hello:\n")));
        assert!(is_junk(&Turn::user("Brother Prophet Kael:")));
        assert!(!is_junk(&Turn::narrator("And then the old man said:")));
    }

    #[test]
    fn test_content_is_kept() {
        assert!(!is_junk(&Turn::narrator("ooc: sure")));
        assert!(!is_junk(&Turn::user("What now?")));
    }

    #[test]
    fn test_word_limit_is_tunable() {
        assert!(!is_junk_text("Kael the Bold:", 2));
        assert!(is_junk_text("Kael the Bold:", 4));
    }

    #[test]
    fn test_scrub_counts_removals() {
        let turns = vec![
            Turn::narrator("Hello:"),
            Turn::user("Hi there."),
            Turn::narrator("   "),
        ];
        let (kept, removed) = scrub(turns, BARE_LABEL_WORD_LIMIT);
        assert_eq!(removed, 2);
        assert_eq!(kept, vec![Turn::user("Hi there.")]);
    }
}
