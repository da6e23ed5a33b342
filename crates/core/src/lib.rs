//! Turn structure normalization for role-play dialogue transcripts.
//!
//! This crate provides the [`Normalizer`] which repairs the turn structure of
//! line-delimited conversation records: it splits turns that swallowed
//! another speaker, re-attributes roles so narrative and OOC exchanges
//! alternate, groups OOC interview blocks and drops turns with no content.

use classify::Cue;

/// Trait for segment classification rules.
///
/// Implementors look at the start of a segment's text and, when they
/// recognize a cue, report the provisional role and any redundant marker
/// prefix to strip.
pub trait SegmentRule {
    /// Short rule name, used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Inspect `text` and return a cue if this rule applies.
    fn classify(&self, text: &str) -> Option<Cue>;
}

// Blanket implementation for references to rules
impl<T: SegmentRule + ?Sized> SegmentRule for &T {
    fn name(&self) -> &str {
        (*self).name()
    }

    fn classify(&self, text: &str) -> Option<Cue> {
        (*self).classify(text)
    }
}

pub mod classify;
mod helpers;
pub mod junk;
pub mod logging;
pub mod normalizer;
pub mod ooc;
pub mod pipeline;
pub mod reconcile;
pub mod record;
pub mod repair;
pub mod report;
pub mod splitter;
pub mod turn;

pub use classify::{ClassifierSet, PatternRule};
pub use helpers::{excerpt, floor_char_boundary, is_ooc, NARRATOR_TAG, OOC_MARKER, USER_TAG};
pub use logging::{init_logging, LoggingError};
pub use normalizer::{LineOutcome, LineStatus, Mode, Normalizer, NormalizerConfig};
pub use pipeline::{
    discover_jsonl_files, process_file, process_path, process_stream, PipelineConfig,
    PipelineError, StreamError,
};
pub use record::{decode_record, DocumentError, PassThrough, RawLine, Record, RecordReader, RecordWriter};
pub use reconcile::{Emission, Reconciler};
pub use report::{RecordFixes, Report};
pub use turn::{Role, RoleVocabulary, Segment, Turn};

/// Default bare speaker-label limit: a colon-terminated text with fewer
/// words than this is junk
pub const BARE_LABEL_WORD_LIMIT: usize = 4;

/// Size of an OOC interview block (trigger plus two followers)
pub const OOC_BLOCK_SIZE: usize = 3;

/// Default maximum bytes of record text quoted in warnings
pub const EXCERPT_LEN: usize = 80;

/// Default records per parallel batch
pub const DEFAULT_BATCH_SIZE: usize = 1024;
