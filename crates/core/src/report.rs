//! Fix accounting.
//!
//! Counts are carried in plain values: each record yields a [`RecordFixes`],
//! the driver folds them into a [`Report`], and the caller decides what to
//! print.

use std::ops::AddAssign;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::record::PassThrough;

/// Structural changes made to one record, per stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordFixes {
    /// Junk and malformed turns removed by the pre- and post-scrub.
    pub junk_removed: usize,
    /// Segments produced beyond one per split turn.
    pub segments_split: usize,
    /// Redundant role markers stripped while splitting.
    pub markers_stripped: usize,
    /// Structural repair rule firings.
    pub repairs: usize,
    /// Segments whose enforced role differs from their input role.
    pub role_corrections: usize,
    /// Adjacent same-role, same-channel turns merged.
    pub merges: usize,
    /// OOC interview blocks regrouped.
    pub ooc_blocks_grouped: usize,
    /// OOC blocks given a human opener.
    pub ooc_reattributions: usize,
}

impl RecordFixes {
    pub fn total(&self) -> usize {
        self.junk_removed
            + self.segments_split
            + self.markers_stripped
            + self.repairs
            + self.role_corrections
            + self.merges
            + self.ooc_blocks_grouped
            + self.ooc_reattributions
    }
}

impl AddAssign for RecordFixes {
    fn add_assign(&mut self, other: Self) {
        self.junk_removed += other.junk_removed;
        self.segments_split += other.segments_split;
        self.markers_stripped += other.markers_stripped;
        self.repairs += other.repairs;
        self.role_corrections += other.role_corrections;
        self.merges += other.merges;
        self.ooc_blocks_grouped += other.ooc_blocks_grouped;
        self.ooc_reattributions += other.ooc_reattributions;
    }
}

/// Totals for a run over one or more files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub files: usize,
    pub records_read: usize,
    pub records_fixed: usize,
    pub total_fixes: usize,
    pub warnings: usize,
    pub passed_through: usize,
    pub breakdown: RecordFixes,
    pub output_path: Option<PathBuf>,
}

impl Report {
    /// Count a record that went through the pipeline.
    ///
    /// `index` is 1-based.
    pub fn tally(&mut self, index: usize, fixes: &RecordFixes) {
        self.records_read += 1;
        let total = fixes.total();
        if total > 0 {
            info!(record = index, fixes = total, "Applied fix(es) to conversation");
            self.records_fixed += 1;
            self.total_fixes += total;
            self.breakdown += *fixes;
        }
    }

    /// Count a record that was written through untouched.
    pub fn tally_pass_through(&mut self, index: usize, reason: &PassThrough, excerpt: &str) {
        self.records_read += 1;
        self.passed_through += 1;
        if reason.is_warning() {
            self.warnings += 1;
            warn!(record = index, reason = %reason, excerpt, "Copying record as-is");
        }
    }

    /// Fold another report (e.g. from a sibling file) into this one.
    pub fn merge(&mut self, other: Report) {
        self.files += other.files;
        self.records_read += other.records_read;
        self.records_fixed += other.records_fixed;
        self.total_fixes += other.total_fixes;
        self.warnings += other.warnings;
        self.passed_through += other.passed_through;
        self.breakdown += other.breakdown;
        if other.output_path.is_some() {
            self.output_path = other.output_path;
        }
    }
}
