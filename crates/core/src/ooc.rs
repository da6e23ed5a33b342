//! OOC block grouping and attribution.

use crate::helpers::{strip_ooc_prefix, OOC_MARKER};
use crate::reconcile::{ReconcileStats, Reconciler};
use crate::turn::{Role, Segment, Turn};
use crate::OOC_BLOCK_SIZE;

/// Fragments of the meta-question that opens an OOC interview
/// ("what are your character's motives?"), compared lower-cased.
pub const MOTIVE_QUESTION: [&str; 2] = ["what are", "motives"];

pub fn asks_motives(text: &str) -> bool {
    let lower = text.to_lowercase();
    MOTIVE_QUESTION.iter().all(|fragment| lower.contains(fragment))
}

/// Re-emit `segment` with a normalized `ooc: ` prefix, or `None` if nothing
/// is left once the old prefix is gone.
fn as_ooc_member(segment: &Segment) -> Option<Segment> {
    let body = strip_ooc_prefix(&segment.text).trim();
    if body.is_empty() {
        return None;
    }
    Some(Segment {
        text: format!("{} {}", OOC_MARKER, body),
        ..segment.clone()
    })
}

/// Reconcile `segments`, regrouping each interview into OOC form on the way.
///
/// A trigger is a motive question that the reconciler is about to hand to
/// the human, whatever role its input turn carried. The trigger and the two
/// units after it are re-emitted as `ooc: ` turns; a trigger without two
/// followers is reconciled as it is. Returns the turns, the reconciliation
/// counts and the number of blocks whose text actually changed.
pub fn reconcile_with_ooc_blocks(segments: Vec<Segment>) -> (Vec<Turn>, ReconcileStats, usize) {
    let mut reconciler = Reconciler::attributing();
    let mut blocks = 0;
    let mut pending = segments.into_iter();

    while let Some(segment) = pending.next() {
        let opens_interview = pending.len() >= OOC_BLOCK_SIZE - 1
            && reconciler.enforced_role(segment.is_ooc()) == Role::User
            && asks_motives(&segment.text);
        if !opens_interview {
            reconciler.step(segment);
            continue;
        }

        let block: Vec<Segment> = std::iter::once(segment)
            .chain(pending.by_ref().take(OOC_BLOCK_SIZE - 1))
            .collect();
        let mut changed = false;
        for member in &block {
            match as_ooc_member(member) {
                Some(ooc) => {
                    changed |= ooc.text != member.text;
                    reconciler.step(ooc);
                }
                None => changed = true,
            }
        }
        if changed {
            blocks += 1;
        }
    }

    let (turns, stats) = reconciler.finish();
    (turns, stats, blocks)
}

/// Hand the opener of an all-narrator OOC block to the human.
///
/// Returns true when the first turn was reassigned.
pub fn attribute_block(block: &mut [Turn]) -> bool {
    if block.iter().any(|t| t.role == Role::User) {
        return false;
    }
    match block.first_mut() {
        Some(first) if first.role == Role::Narrator => {
            first.role = Role::User;
            true
        }
        _ => false,
    }
}

/// Give every all-narrator OOC block its missing human opener.
///
/// For each maximal run of OOC turns with no `User` member, the first turn
/// is reassigned to `User` when it is a `Narrator` turn. Returns the number
/// of reassignments.
pub fn correct_ooc_attribution(turns: Vec<Turn>) -> (Vec<Turn>, usize) {
    let mut corrected = Vec::with_capacity(turns.len());
    let mut fixes = 0;
    let mut turns = turns.into_iter().peekable();

    while let Some(turn) = turns.next() {
        if !turn.is_ooc() {
            corrected.push(turn);
            continue;
        }

        let mut block = vec![turn];
        while let Some(next) = turns.next_if(Turn::is_ooc) {
            block.push(next);
        }

        if attribute_block(&mut block) {
            fixes += 1;
        }
        corrected.extend(block);
    }

    (corrected, fixes)
}
