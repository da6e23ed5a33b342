//! Role reconciliation.
//!
//! Narrative dialogue and OOC commentary are two channels that alternate
//! independently while sharing one transcript. The reconciler keeps one
//! last-speaker cursor per channel and assigns every segment the role that
//! answers the previous speaker on its channel:
//!
//! - narrative segment: counterpart of the last narrative speaker
//! - OOC segment: counterpart of the last speaker overall
//!
//! OOC turns never move the narrative cursor.

use crate::helpers::{join_blocks, strip_role_tag};
use crate::ooc::attribute_block;
use crate::turn::{Role, Segment, Turn};

/// What a single [`Reconciler::step`] did with its segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    /// A new turn was emitted.
    Appended,
    /// The segment was folded into the previous turn.
    Merged,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub merges: usize,
    pub role_corrections: usize,
    /// OOC blocks whose opener was handed to the human.
    pub reattributions: usize,
}

impl ReconcileStats {
    pub fn total(&self) -> usize {
        self.merges + self.role_corrections + self.reattributions
    }
}

// The OOC run currently being emitted
#[derive(Debug)]
struct OpenBlock {
    start: usize,
    opener_source: Role,
}

/// Per-record alternation state machine.
#[derive(Debug, Default)]
pub struct Reconciler {
    last_narrative_speaker: Option<Role>,
    last_overall_speaker: Option<Role>,
    turns: Vec<Turn>,
    stats: ReconcileStats,
    attribute_ooc_blocks: bool,
    open_block: Option<OpenBlock>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A reconciler that also gives each all-narrator OOC block its human
    /// opener as the block closes (see [`attribute_block`]).
    ///
    /// A reassigned opener never shifts later roles: the turn after an OOC
    /// block is narrative and answers the narrative cursor.
    pub fn attributing() -> Self {
        Self {
            attribute_ooc_blocks: true,
            ..Self::default()
        }
    }

    pub fn last_narrative_speaker(&self) -> Option<&Role> {
        self.last_narrative_speaker.as_ref()
    }

    pub fn last_overall_speaker(&self) -> Option<&Role> {
        self.last_overall_speaker.as_ref()
    }

    /// Role the next segment of the given channel must take.
    pub fn enforced_role(&self, is_ooc: bool) -> Role {
        let last = if is_ooc {
            self.last_overall_speaker.as_ref()
        } else {
            self.last_narrative_speaker.as_ref()
        };
        Role::counterpart(last)
    }

    pub fn step(&mut self, segment: Segment) -> Emission {
        let is_ooc = segment.is_ooc();
        if !is_ooc {
            self.close_block();
        }
        let enforced = self.enforced_role(is_ooc);

        let emission = match self.turns.last_mut() {
            Some(last) if continues(last, &enforced, is_ooc) => {
                append_block(last, &segment.text);
                self.stats.merges += 1;
                Emission::Merged
            }
            _ => {
                if segment.source != enforced {
                    self.stats.role_corrections += 1;
                }
                if is_ooc && self.attribute_ooc_blocks && self.open_block.is_none() {
                    self.open_block = Some(OpenBlock {
                        start: self.turns.len(),
                        opener_source: segment.source.clone(),
                    });
                }
                self.turns.push(Turn::new(enforced.clone(), segment.text));
                Emission::Appended
            }
        };

        if !is_ooc {
            self.last_narrative_speaker = Some(enforced.clone());
        }
        self.last_overall_speaker = Some(enforced);
        emission
    }

    fn close_block(&mut self) {
        let Some(block) = self.open_block.take() else {
            return;
        };
        if !attribute_block(&mut self.turns[block.start..]) {
            return;
        }
        if block.opener_source == Role::User {
            // Alternation had moved the human's own turn; the reassignment puts it back
            self.stats.role_corrections = self.stats.role_corrections.saturating_sub(1);
        } else {
            self.stats.reattributions += 1;
        }
    }

    pub fn finish(mut self) -> (Vec<Turn>, ReconcileStats) {
        self.close_block();
        (self.turns, self.stats)
    }
}

/// Same role and same channel as the previous turn.
fn continues(last: &Turn, role: &Role, is_ooc: bool) -> bool {
    last.role == *role && last.is_ooc() == is_ooc
}

// A leading role tag would turn the joint into a split point
fn append_block(last: &mut Turn, text: &str) {
    last.text = join_blocks(&last.text, strip_role_tag(text));
}

/// Run a fresh [`Reconciler`] over `segments`.
pub fn reconcile(segments: Vec<Segment>) -> (Vec<Turn>, ReconcileStats) {
    let mut reconciler = Reconciler::new();
    for segment in segments {
        reconciler.step(segment);
    }
    reconciler.finish()
}

/// Merge adjacent turns that share both role and channel.
///
/// A merged turn loses its leading role tag, so the joined text holds no
/// blank-line-plus-tag boundary for a later split to cut on.
pub fn coalesce(turns: Vec<Turn>) -> (Vec<Turn>, usize) {
    let mut merged: Vec<Turn> = Vec::with_capacity(turns.len());
    let mut merges = 0;
    for turn in turns {
        match merged.last_mut() {
            Some(last) if continues(last, &turn.role, turn.is_ooc()) => {
                append_block(last, &turn.text);
                merges += 1;
            }
            _ => merged.push(turn),
        }
    }
    (merged, merges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(role: Role, text: &str) -> Segment {
        Segment::inherited(role, text)
    }

    fn roles(turns: &[Turn]) -> Vec<Role> {
        turns.iter().map(|t| t.role.clone()).collect()
    }

    #[test]
    fn test_narrative_alternates_from_narrator() {
        let (turns, stats) = reconcile(vec![
            seg(Role::Narrator, "The gate opens."),
            seg(Role::Narrator, "I step through."),
            seg(Role::User, "A guard blocks the way."),
        ]);
        assert_eq!(roles(&turns), vec![Role::Narrator, Role::User, Role::Narrator]);
        assert_eq!(stats.role_corrections, 2);
        assert_eq!(stats.merges, 0);
    }

    #[test]
    fn test_ooc_does_not_move_narrative_cursor() {
        let mut reconciler = Reconciler::new();
        reconciler.step(seg(Role::Narrator, "*Rain falls.*"));
        reconciler.step(seg(Role::Narrator, "ooc: can we skip ahead?"));
        assert_eq!(reconciler.last_overall_speaker(), Some(&Role::User));
        assert_eq!(reconciler.last_narrative_speaker(), Some(&Role::Narrator));
        reconciler.step(seg(Role::Narrator, "{narrator}:\nooc: sure."));
        reconciler.step(seg(Role::User, "I head to the docks."));

        let (turns, stats) = reconciler.finish();
        assert_eq!(
            roles(&turns),
            vec![Role::Narrator, Role::User, Role::Narrator, Role::User]
        );
        assert_eq!(stats.role_corrections, 1);
    }

    #[test]
    fn test_enforced_role_defaults_to_narrator() {
        let reconciler = Reconciler::new();
        assert_eq!(reconciler.enforced_role(false), Role::Narrator);
        assert_eq!(reconciler.enforced_role(true), Role::Narrator);
    }

    #[test]
    fn test_raw_roles_are_committed() {
        let (turns, stats) = reconcile(vec![seg(Role::Raw("bot".to_string()), "Hello.")]);
        assert_eq!(turns, vec![Turn::narrator("Hello.")]);
        assert_eq!(stats.role_corrections, 1);
    }

    #[test]
    fn test_step_reports_emission() {
        let mut reconciler = Reconciler::new();
        assert_eq!(reconciler.step(seg(Role::Narrator, "One.")), Emission::Appended);
        assert_eq!(reconciler.step(seg(Role::User, "Two.")), Emission::Appended);
    }

    #[test]
    fn test_lone_narrator_ooc_turn_gets_user_opener() {
        let segments = vec![
            seg(Role::Narrator, "The road."),
            seg(Role::User, "I walk."),
            seg(Role::Narrator, "ooc: Resuming scene."),
            seg(Role::Narrator, "*The character walks into the tavern.*"),
        ];
        let mut reconciler = Reconciler::attributing();
        for segment in segments {
            reconciler.step(segment);
        }
        let (turns, stats) = reconciler.finish();
        assert_eq!(
            turns,
            vec![
                Turn::narrator("The road."),
                Turn::user("I walk."),
                Turn::user("ooc: Resuming scene."),
                Turn::narrator("*The character walks into the tavern.*"),
            ]
        );
        assert_eq!(stats.reattributions, 1);
        assert_eq!(stats.role_corrections, 0);

        // The second run lands on the same roles without counting anything
        let mut again = Reconciler::attributing();
        for turn in turns.clone() {
            again.step(Segment::from(turn));
        }
        let (rerun, stats) = again.finish();
        assert_eq!(rerun, turns);
        assert_eq!(stats.total(), 0);
    }

    #[test]
    fn test_plain_reconciler_leaves_ooc_openers() {
        let (turns, stats) = reconcile(vec![
            seg(Role::Narrator, "The road."),
            seg(Role::User, "I walk."),
            seg(Role::Narrator, "ooc: Resuming scene."),
        ]);
        assert_eq!(turns[2], Turn::narrator("ooc: Resuming scene."));
        assert_eq!(stats.total(), 0);
    }

    #[test]
    fn test_coalesce_merges_same_role_and_channel() {
        let (turns, merges) = coalesce(vec![
            Turn::narrator("The gate opens."),
            Turn::narrator("The guard nods."),
            Turn::narrator("ooc: brb"),
            Turn::user("I wave."),
        ]);
        assert_eq!(merges, 1);
        assert_eq!(
            turns,
            vec![
                Turn::narrator("The gate opens.\n\nThe guard nods."),
                Turn::narrator("ooc: brb"),
                Turn::user("I wave."),
            ]
        );
    }

    #[test]
    fn test_coalesce_drops_tag_of_merged_turn() {
        let (turns, merges) = coalesce(vec![
            Turn::narrator("The gate opens."),
            Turn::narrator("{narrator}: The guard nods."),
            Turn::user("ooc: wait"),
            Turn::user("{narrator}:\nooc: go on"),
        ]);
        assert_eq!(merges, 2);
        assert_eq!(
            turns,
            vec![
                Turn::narrator("The gate opens.\n\nThe guard nods."),
                Turn::user("ooc: wait\n\nooc: go on"),
            ]
        );
    }
}
