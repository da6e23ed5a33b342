//! Segment splitting.
//!
//! A turn whose text contains a role tag after a blank line is really
//! several turns glued together. The splitter cuts the text at each such
//! tag (the tag stays at the head of the segment it introduces), then asks
//! the [`ClassifierSet`] for a provisional role per segment.

use std::sync::LazyLock;

use regex::Regex;

use crate::classify::ClassifierSet;
use crate::helpers::is_role_marker_line;
use crate::turn::{Segment, Turn};

// Blank line followed by a role tag; group 1 is where the next segment starts
static SPLIT_POINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\r?\n[ \t]*\r?\n\s*(\{(?:narrator|user)\}:)").unwrap()
});

/// Changes made while splitting one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitStats {
    /// Segments produced beyond the first.
    pub extra_segments: usize,
    /// Redundant marker prefixes and dangling marker lines removed.
    pub stripped_markers: usize,
}

impl SplitStats {
    pub fn total(&self) -> usize {
        self.extra_segments + self.stripped_markers
    }
}

pub struct SegmentSplitter<'a> {
    classifiers: &'a ClassifierSet,
}

impl<'a> SegmentSplitter<'a> {
    pub fn new(classifiers: &'a ClassifierSet) -> Self {
        Self { classifiers }
    }

    /// Split one turn into segments carrying provisional roles.
    pub fn split(&self, turn: &Turn) -> (Vec<Segment>, SplitStats) {
        let mut stats = SplitStats::default();
        let mut segments = Vec::new();

        for piece in split_at_markers(&turn.text) {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }

            let (role, body) = match self.classifiers.classify(piece) {
                Some((_, cue)) => {
                    if cue.strip > 0 {
                        stats.stripped_markers += 1;
                    }
                    let role = cue.role.unwrap_or_else(|| turn.role.clone());
                    (role, &piece[cue.strip..])
                }
                None => (turn.role.clone(), piece),
            };

            let (body, dangling) = drop_trailing_markers(body.trim());
            stats.stripped_markers += dangling;
            if body.is_empty() {
                continue;
            }

            segments.push(Segment::new(role, turn.role.clone(), body));
        }

        stats.extra_segments = segments.len().saturating_sub(1);
        (segments, stats)
    }

    /// Split every turn, summing the stats.
    pub fn split_all(&self, turns: &[Turn]) -> (Vec<Segment>, SplitStats) {
        let mut total = SplitStats::default();
        let mut segments = Vec::with_capacity(turns.len());
        for turn in turns {
            let (mut parts, stats) = self.split(turn);
            total.extra_segments += stats.extra_segments;
            total.stripped_markers += stats.stripped_markers;
            segments.append(&mut parts);
        }
        (segments, total)
    }
}

fn split_at_markers(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for caps in SPLIT_POINT_RE.captures_iter(text) {
        if let Some(tag) = caps.get(1) {
            pieces.push(&text[start..tag.start()]);
            start = tag.start();
        }
    }
    pieces.push(&text[start..]);
    pieces
}

/// Remove trailing lines that are only a role tag with nothing after them.
fn drop_trailing_markers(body: &str) -> (&str, usize) {
    let mut end = body;
    let mut dropped = 0;
    while !end.is_empty() {
        let line_start = end.rfind('\n').map_or(0, |i| i + 1);
        if !is_role_marker_line(&end[line_start..]) {
            break;
        }
        end = end[..line_start].trim_end();
        dropped += 1;
    }
    (end, dropped)
}
