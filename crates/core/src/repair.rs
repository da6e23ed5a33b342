//! Structural repair of known merged-turn shapes.
//!
//! The main defect: a narrator turn that swallowed the user's OOC question
//! and the narrator's OOC answer, e.g.
//!
//! ```text
//! *The fire crackles.*
//! ooc: why did she lie?
//! {narrator}:
//! ooc: she is protecting her brother.
//! ```
//!
//! which is re-split into the in-character part, a user question and a
//! narrator answer in canonical `{narrator}:\nooc: ...` form.
//!
//! A narrator turn that opens with an OOC line and carries on with narrative
//! after a blank line is cut in two, so the narrative leaves the OOC channel.

use std::sync::LazyLock;

use regex::Regex;

use crate::helpers::{NARRATOR_TAG, OOC_MARKER};
use crate::turn::{Role, Segment};

static MERGED_ANSWER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\r?\n[ \t]*\{narrator\}:[ \t]*\r?\n[ \t]*ooc:").unwrap()
});
static EMBEDDED_OOC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\nooc:").unwrap());
static OOC_LEAD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\s*ooc:").unwrap());
static BLANK_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n[ \t]*\r?\n").unwrap());
static OOC_BEFORE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*ooc:\s*\{narrator\}:\s*(?:ooc:\s*)?").unwrap()
});

/// Phrase that marks the human acknowledging an instruction.
pub const ACKNOWLEDGEMENT: &str = "Understood";

/// Rule firings for one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    pub merged_answers: usize,
    pub ooc_leads_split: usize,
    pub acknowledgements: usize,
    pub reordered_tags: usize,
}

impl RepairStats {
    pub fn total(&self) -> usize {
        self.merged_answers + self.ooc_leads_split + self.acknowledgements + self.reordered_tags
    }
}

/// Apply every repair rule to narrator segments.
///
/// Rules run in order on the pieces the previous rule left: merged answer,
/// OOC lead, then acknowledgement or tag order.
pub fn repair(segments: Vec<Segment>) -> (Vec<Segment>, RepairStats) {
    let mut stats = RepairStats::default();
    let mut repaired = Vec::with_capacity(segments.len());

    for segment in segments {
        if segment.role != Role::Narrator {
            repaired.push(segment);
            continue;
        }

        let parts = match split_merged_answer(&segment) {
            Some(parts) => {
                stats.merged_answers += 1;
                parts
            }
            None => vec![segment],
        };
        for part in parts {
            if part.role != Role::Narrator {
                repaired.push(part);
                continue;
            }
            match split_ooc_lead(&part) {
                Some(pieces) => {
                    stats.ooc_leads_split += 1;
                    for piece in pieces {
                        repaired.push(retag(piece, &mut stats));
                    }
                }
                None => repaired.push(retag(part, &mut stats)),
            }
        }
    }

    (repaired, stats)
}

// Acknowledgement and tag-order rules for a single narrator piece
fn retag(segment: Segment, stats: &mut RepairStats) -> Segment {
    if segment.text.contains(ACKNOWLEDGEMENT) {
        stats.acknowledgements += 1;
        Segment {
            role: Role::User,
            ..segment
        }
    } else if let Some(end) = OOC_BEFORE_TAG_RE.find(&segment.text).map(|m| m.end()) {
        stats.reordered_tags += 1;
        let text = canonical_narrator_ooc(segment.text[end..].trim());
        Segment { text, ..segment }
    } else {
        segment
    }
}

/// `{narrator}:\nooc: <content>`
pub fn canonical_narrator_ooc(content: &str) -> String {
    format!("{}\n{} {}", NARRATOR_TAG, OOC_MARKER, content)
}

fn split_merged_answer(segment: &Segment) -> Option<Vec<Segment>> {
    let m = MERGED_ANSWER_RE.find(&segment.text)?;
    let before = segment.text[..m.start()].trim();
    let answer = segment.text[m.end()..].trim();
    let source = &segment.source;

    let mut parts = Vec::with_capacity(3);
    match EMBEDDED_OOC_RE.find_iter(before).last() {
        Some(question) => {
            let in_character = before[..question.start()].trim();
            let question = before[question.start()..].trim();
            if !in_character.is_empty() {
                parts.push(Segment::new(Role::Narrator, source.clone(), in_character));
            }
            if !question.is_empty() {
                parts.push(Segment::new(Role::User, source.clone(), question));
            }
        }
        None if !before.is_empty() => {
            parts.push(Segment::new(Role::User, source.clone(), before));
        }
        None => {}
    }
    if !answer.is_empty() {
        parts.push(Segment::new(
            Role::Narrator,
            source.clone(),
            canonical_narrator_ooc(answer),
        ));
    }
    Some(parts)
}

/// `ooc: aside\n\nnarrative` -> `ooc: aside`, `narrative`
fn split_ooc_lead(segment: &Segment) -> Option<Vec<Segment>> {
    if !OOC_LEAD_RE.is_match(&segment.text) {
        return None;
    }
    let gap = BLANK_LINE_RE.find(&segment.text)?;
    let aside = segment.text[..gap.start()].trim();
    let narrative = segment.text[gap.end()..].trim();
    if aside.is_empty() || narrative.is_empty() {
        return None;
    }
    let source = &segment.source;
    Some(vec![
        Segment::new(Role::Narrator, source.clone(), aside),
        Segment::new(Role::Narrator, source.clone(), narrative),
    ])
}
