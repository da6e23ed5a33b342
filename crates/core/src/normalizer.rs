//! Per-record normalization.

use serde::Serialize;
use tracing::debug;

use crate::classify::ClassifierSet;
use crate::helpers::excerpt;
use crate::junk::scrub;
use crate::ooc::{correct_ooc_attribution, reconcile_with_ooc_blocks};
use crate::reconcile::{coalesce, reconcile};
use crate::record::{decode_record, DocumentError, PassThrough, RawLine};
use crate::repair::repair;
use crate::report::RecordFixes;
use crate::splitter::SegmentSplitter;
use crate::turn::{RoleVocabulary, Turn};
use crate::{BARE_LABEL_WORD_LIMIT, EXCERPT_LEN};

/// Which set of stages to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Scrub, split, repair, reconcile with OOC grouping and attribution,
    /// scrub, coalesce.
    #[default]
    Full,
    /// Split and reconcile only.
    Simple,
}

/// Configuration for a [`Normalizer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizerConfig {
    pub mode: Mode,
    pub bare_label_word_limit: usize,
    /// Maximum bytes of record text quoted in warnings.
    pub excerpt_len: usize,
    pub vocabulary: RoleVocabulary,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Full,
            bare_label_word_limit: BARE_LABEL_WORD_LIMIT,
            excerpt_len: EXCERPT_LEN,
            vocabulary: RoleVocabulary::default(),
        }
    }
}

/// What happened to one input line.
#[derive(Debug)]
pub enum LineStatus {
    Normalized(RecordFixes),
    PassedThrough { reason: PassThrough, excerpt: String },
}

/// A processed line, ready to be written.
#[derive(Debug)]
pub struct LineOutcome {
    pub index: usize,
    pub bytes: Vec<u8>,
    pub status: LineStatus,
}

/// Runs the normalization stages over one record at a time.
///
/// Holds no per-record state, so one instance can be shared across threads.
#[derive(Debug)]
pub struct Normalizer {
    config: NormalizerConfig,
    classifiers: ClassifierSet,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self::with_classifiers(config, ClassifierSet::default())
    }

    pub fn with_classifiers(config: NormalizerConfig, classifiers: ClassifierSet) -> Self {
        Self {
            config,
            classifiers,
        }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize the turns of one record.
    pub fn normalize(&self, turns: Vec<Turn>) -> (Vec<Turn>, RecordFixes) {
        let (preamble, body) = self.set_aside_preamble(turns);
        let (mut turns, fixes) = match self.config.mode {
            Mode::Full => self.run_full(body),
            Mode::Simple => self.run_simple(body),
        };
        if let Some(preamble) = preamble {
            turns.insert(0, preamble);
        }
        (turns, fixes)
    }

    fn set_aside_preamble(&self, mut turns: Vec<Turn>) -> (Option<Turn>, Vec<Turn>) {
        match turns.first() {
            Some(first) if self.config.vocabulary.is_system(&first.role) => {
                let preamble = turns.remove(0);
                (Some(preamble), turns)
            }
            _ => (None, turns),
        }
    }

    fn run_full(&self, turns: Vec<Turn>) -> (Vec<Turn>, RecordFixes) {
        let word_limit = self.config.bare_label_word_limit;
        let mut fixes = RecordFixes::default();

        let (turns, removed) = scrub(turns, word_limit);
        fixes.junk_removed += removed;

        let (segments, split) = SegmentSplitter::new(&self.classifiers).split_all(&turns);
        fixes.segments_split = split.extra_segments;
        fixes.markers_stripped = split.stripped_markers;

        let (segments, repairs) = repair(segments);
        fixes.repairs = repairs.total();

        let (turns, reconciled, blocks) = reconcile_with_ooc_blocks(segments);
        fixes.ooc_blocks_grouped = blocks;
        fixes.role_corrections = reconciled.role_corrections;
        fixes.merges = reconciled.merges;
        fixes.ooc_reattributions = reconciled.reattributions;

        let (turns, removed) = scrub(turns, word_limit);
        fixes.junk_removed += removed;

        // Scrubbing can empty the human side of a block
        let (turns, reattributed) = correct_ooc_attribution(turns);
        fixes.ooc_reattributions += reattributed;

        let (turns, merges) = coalesce(turns);
        fixes.merges += merges;

        (turns, fixes)
    }

    fn run_simple(&self, turns: Vec<Turn>) -> (Vec<Turn>, RecordFixes) {
        let mut fixes = RecordFixes::default();

        let (segments, split) = SegmentSplitter::new(&self.classifiers).split_all(&turns);
        fixes.segments_split = split.extra_segments;
        fixes.markers_stripped = split.stripped_markers;

        let (turns, reconciled) = reconcile(segments);
        fixes.role_corrections = reconciled.role_corrections;
        fixes.merges = reconciled.merges;

        (turns, fixes)
    }

    /// Normalize one raw line into the bytes that replace it.
    ///
    /// Lines that are not records, and records whose turns come out
    /// unchanged, keep their original bytes.
    pub fn normalize_line(&self, line: &RawLine) -> LineOutcome {
        let vocab = &self.config.vocabulary;
        let record = match decode_record(line.content(), vocab) {
            Ok(record) => record,
            Err(reason) => return self.pass_through(line, reason),
        };

        let original = record.turns.clone();
        let malformed = record.malformed;
        let (turns, mut fixes) = self.normalize(original.clone());
        fixes.junk_removed += malformed;

        // Stage fixes that cancel out leave the record as it was
        if turns == original && malformed == 0 {
            if fixes.total() > 0 {
                debug!(record = line.index, fixes = fixes.total(), "Fixes cancelled out");
            }
            return LineOutcome {
                index: line.index,
                bytes: line.bytes.clone(),
                status: LineStatus::Normalized(RecordFixes::default()),
            };
        }

        match record.encode(&turns, vocab) {
            Ok(json) => {
                let mut bytes = json.into_bytes();
                bytes.extend_from_slice(line.terminator());
                debug!(record = line.index, turns = turns.len(), "Rewrote conversation");
                LineOutcome {
                    index: line.index,
                    bytes,
                    status: LineStatus::Normalized(fixes),
                }
            }
            Err(e) => self.pass_through(line, DocumentError::Json(e).into()),
        }
    }

    fn pass_through(&self, line: &RawLine, reason: PassThrough) -> LineOutcome {
        let text = String::from_utf8_lossy(line.content());
        LineOutcome {
            index: line.index,
            bytes: line.bytes.clone(),
            status: LineStatus::PassedThrough {
                reason,
                excerpt: excerpt(&text, self.config.excerpt_len),
            },
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}
