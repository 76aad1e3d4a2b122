//! The per-turn state machine.
//!
//! One turn per id, ids never reused. Status moves forward only:
//! `IN_PROGRESS → END` or `IN_PROGRESS → INTERRUPTED`, and a terminal turn is
//! settled for good. At most one turn per sender role is in progress at any
//! instant; the implicit finalization rule repairs streams whose explicit
//! end-of-turn signal was lost.

use std::collections::HashMap;
use std::time::Instant;

use relay_interface::{ProtocolEvent, SenderRole, TurnStatus, WordToken};

use crate::granularity::{Granularity, GranularityMode};
use crate::turn::{BlockMerge, Turn};

/// Why an event was not applied. Every rejection is non-fatal; the engine
/// logs it and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Update or interrupt for a turn id never opened by a fragment.
    UnknownTurn,
    /// The turn already reached a terminal status.
    TurnSettled,
    /// Block text shorter than what is already accumulated.
    StaleBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// State moved; the caller should emit a fresh snapshot.
    Changed,
    /// Valid but redundant, e.g. a byte-identical re-delivery.
    Noop,
    Rejected(RejectReason),
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub granularity: GranularityMode,
    /// A new fragment from a role with a live turn and a strictly greater
    /// sequence id ends that live turn first.
    pub implicit_finalize: bool,
    /// Accept content-only reconciliation on settled turns. Status never
    /// changes either way.
    pub accept_late_corrections: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            granularity: GranularityMode::Auto,
            implicit_finalize: true,
            accept_late_corrections: false,
        }
    }
}

pub struct TurnRegistry {
    config: RegistryConfig,
    turns: HashMap<String, Turn>,
    /// Live turn id per sender role.
    active: HashMap<SenderRole, String>,
    /// Creation ordinal, used to break sequence-id ties in projection.
    created: u64,
    /// Highest sequence id seen on the wire. Fragments without one (the
    /// legacy dialect) allocate `high_water + 1`, so mixed streams keep
    /// arrival order.
    high_water_seq: u64,
}

impl TurnRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            turns: HashMap::new(),
            active: HashMap::new(),
            created: 0,
            high_water_seq: 0,
        }
    }

    pub fn apply(&mut self, event: &ProtocolEvent, now: Instant) -> Applied {
        match event {
            ProtocolEvent::TranscriptionFragment {
                turn_id,
                sender_id,
                role,
                text,
                words,
                is_final,
                sequence_id,
            } => self.apply_fragment(
                turn_id,
                sender_id,
                *role,
                text,
                words,
                *is_final,
                *sequence_id,
                now,
            ),
            ProtocolEvent::AgentTurnUpdate {
                turn_id,
                sequence_id,
                status,
                quiet,
            } => self.apply_update(turn_id, *sequence_id, *status, *quiet, now),
            ProtocolEvent::InterruptSignal {
                turn_id,
                at_offset_ms,
            } => self.apply_interrupt(turn_id, *at_offset_ms, now),
        }
    }

    pub fn get(&self, turn_id: &str) -> Option<&Turn> {
        self.turns.get(turn_id)
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.values()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.active.clear();
        self.created = 0;
        self.high_water_seq = 0;
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_fragment(
        &mut self,
        turn_id: &str,
        sender_id: &str,
        role: SenderRole,
        text: &str,
        words: &[WordToken],
        is_final: bool,
        sequence_id: Option<u64>,
        now: Instant,
    ) -> Applied {
        if let Some(seq) = sequence_id {
            self.high_water_seq = self.high_water_seq.max(seq);
        }

        if self.turns.contains_key(turn_id) {
            self.merge_fragment(turn_id, text, words, is_final, now)
        } else {
            self.open_turn(turn_id, sender_id, role, text, words, is_final, sequence_id, now)
        }
    }

    fn merge_fragment(
        &mut self,
        turn_id: &str,
        text: &str,
        words: &[WordToken],
        is_final: bool,
        now: Instant,
    ) -> Applied {
        let mut ended = false;
        let outcome = {
            let Some(turn) = self.turns.get_mut(turn_id) else {
                return Applied::Rejected(RejectReason::UnknownTurn);
            };

            if turn.status.is_terminal() {
                if !self.config.accept_late_corrections {
                    return Applied::Rejected(RejectReason::TurnSettled);
                }
                let changed = match turn.granularity {
                    Granularity::Word => turn.apply_words(words, is_final),
                    Granularity::Block => turn.apply_block(text) == BlockMerge::Replaced,
                };
                if changed {
                    turn.finalize_pending();
                    turn.touch(now);
                    return Applied::Changed;
                }
                return Applied::Noop;
            }

            let content = match turn.granularity {
                Granularity::Word => {
                    if turn.apply_words(words, is_final) {
                        Applied::Changed
                    } else {
                        Applied::Noop
                    }
                }
                Granularity::Block => match turn.apply_block(text) {
                    BlockMerge::Replaced => Applied::Changed,
                    BlockMerge::Unchanged => Applied::Noop,
                    BlockMerge::Stale => return Applied::Rejected(RejectReason::StaleBlock),
                },
            };

            if is_final {
                turn.finalize_pending();
                turn.status = TurnStatus::End;
                turn.touch(now);
                ended = true;
                Applied::Changed
            } else {
                if content == Applied::Changed {
                    turn.touch(now);
                }
                content
            }
        };

        if ended {
            self.clear_active(turn_id);
        }
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    fn open_turn(
        &mut self,
        turn_id: &str,
        sender_id: &str,
        role: SenderRole,
        text: &str,
        words: &[WordToken],
        is_final: bool,
        sequence_id: Option<u64>,
        now: Instant,
    ) -> Applied {
        let sequence_id = match sequence_id {
            Some(seq) => seq,
            None => {
                self.high_water_seq += 1;
                self.high_water_seq
            }
        };

        // The recovery rule: a live turn for this role whose explicit end
        // never arrived is finalized by the successor's greater sequence id.
        // A successor that is not actually newer is opened already settled,
        // so the one-live-turn invariant holds either way.
        let mut open_settled = false;
        if self.config.implicit_finalize
            && let Some(prev_id) = self.active.get(&role).cloned()
            && let Some(prev_seq) = self.turns.get(&prev_id).map(|t| t.sequence_id)
        {
            if sequence_id > prev_seq {
                self.end_turn(&prev_id, now);
            } else {
                open_settled = true;
            }
        }

        let granularity = self.config.granularity.resolve(!words.is_empty());
        self.created += 1;
        let mut turn = Turn::new(
            turn_id,
            role,
            sender_id,
            sequence_id,
            granularity,
            self.created,
            now,
        );
        match granularity {
            Granularity::Word => {
                turn.apply_words(words, is_final);
            }
            Granularity::Block => {
                let _ = turn.apply_block(text);
            }
        }

        if is_final || open_settled {
            turn.finalize_pending();
            turn.status = TurnStatus::End;
        } else {
            self.active.insert(role, turn_id.to_string());
        }

        self.turns.insert(turn_id.to_string(), turn);
        Applied::Changed
    }

    fn apply_update(
        &mut self,
        turn_id: &str,
        sequence_id: u64,
        status: TurnStatus,
        quiet: bool,
        now: Instant,
    ) -> Applied {
        self.high_water_seq = self.high_water_seq.max(sequence_id);

        let mut ended = false;
        let outcome = {
            let Some(turn) = self.turns.get_mut(turn_id) else {
                return Applied::Rejected(RejectReason::UnknownTurn);
            };

            if turn.status.is_terminal() {
                if turn.status == status && turn.quiet == quiet {
                    Applied::Noop
                } else {
                    Applied::Rejected(RejectReason::TurnSettled)
                }
            } else {
                match status {
                    TurnStatus::InProgress => {
                        if turn.quiet != quiet {
                            turn.quiet = quiet;
                            turn.touch(now);
                            Applied::Changed
                        } else {
                            Applied::Noop
                        }
                    }
                    TurnStatus::End | TurnStatus::Interrupted => {
                        turn.finalize_pending();
                        turn.status = status;
                        turn.quiet = quiet;
                        turn.touch(now);
                        ended = true;
                        Applied::Changed
                    }
                }
            }
        };

        if ended {
            self.clear_active(turn_id);
        }
        outcome
    }

    fn apply_interrupt(
        &mut self,
        turn_id: &str,
        at_offset_ms: Option<u64>,
        now: Instant,
    ) -> Applied {
        let mut ended = false;
        let outcome = {
            let Some(turn) = self.turns.get_mut(turn_id) else {
                return Applied::Rejected(RejectReason::UnknownTurn);
            };

            match turn.status {
                TurnStatus::Interrupted => Applied::Noop,
                TurnStatus::End => Applied::Rejected(RejectReason::TurnSettled),
                TurnStatus::InProgress => {
                    match at_offset_ms {
                        Some(offset) if turn.granularity == Granularity::Word => {
                            turn.truncate_at(offset);
                        }
                        _ => turn.finalize_pending(),
                    }
                    turn.status = TurnStatus::Interrupted;
                    turn.touch(now);
                    ended = true;
                    Applied::Changed
                }
            }
        };

        if ended {
            self.clear_active(turn_id);
        }
        outcome
    }

    fn end_turn(&mut self, turn_id: &str, now: Instant) {
        if let Some(turn) = self.turns.get_mut(turn_id) {
            turn.finalize_pending();
            turn.status = TurnStatus::End;
            turn.touch(now);
        }
        self.clear_active(turn_id);
    }

    fn clear_active(&mut self, turn_id: &str) {
        self.active.retain(|_, id| id != turn_id);
    }
}
