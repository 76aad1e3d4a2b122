//! Derives the render-ready snapshot from registry state.
//!
//! Settled turns sort by `(sequence_id, created)`; the live slot holds the
//! most recently created in-progress turn. Quiet and empty turns never
//! surface, and a live turn whose text still echoes a settled turn is held
//! back until it diverges.

use crate::registry::TurnRegistry;
use crate::turn::Turn;
use crate::types::{MessageListItem, TranscriptSnapshot};

pub fn project(registry: &TurnRegistry) -> TranscriptSnapshot {
    let mut finalized: Vec<&Turn> = Vec::new();
    let mut live: Option<&Turn> = None;

    for turn in registry.turns() {
        if turn.quiet || turn.text().trim().is_empty() {
            continue;
        }
        if turn.status.is_terminal() {
            finalized.push(turn);
        } else {
            match live {
                Some(newest) if newest.created >= turn.created => {}
                _ => live = Some(turn),
            }
        }
    }

    finalized.sort_by_key(|turn| (turn.sequence_id, turn.created));

    let current = live
        .filter(|turn| !echoes_finalized(turn, &finalized))
        .map(item);

    TranscriptSnapshot {
        finalized: finalized.into_iter().map(item).collect(),
        current,
    }
}

/// True when the live text is contained in, or contains, a settled turn's
/// text. Happens when the agent's settled turn and a trailing live re-send
/// carry the same words.
fn echoes_finalized(live: &Turn, finalized: &[&Turn]) -> bool {
    let text = live.text().trim();
    finalized.iter().any(|settled| {
        let settled = settled.text().trim();
        settled.contains(text) || text.contains(settled)
    })
}

fn item(turn: &Turn) -> MessageListItem {
    MessageListItem {
        sender_id: turn.sender_id.clone(),
        turn_id: turn.id.clone(),
        role: turn.role,
        text: turn.text().trim().to_string(),
        status: turn.status,
    }
}
