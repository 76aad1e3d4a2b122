//! One engine instance per feed. Everything is synchronous; the caller owns
//! the order chunks arrive in, the engine owns the order turns display in.

use std::time::Instant;

use relay_interface::{
    AccumulateOutcome, Decoded, ProtocolEvent, RawChunk, ReassemblyBuffer, ReassemblyConfig,
    decode_chunk,
};

use crate::projection::project;
use crate::registry::{Applied, RegistryConfig, TurnRegistry};
use crate::types::TranscriptSnapshot;

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub turns: RegistryConfig,
    pub reassembly: ReassemblyConfig,
}

/// Counters for telemetry. None of these gate behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub chunks: u64,
    pub applied: u64,
    pub noops: u64,
    pub rejected: u64,
    pub decode_failures: u64,
    pub evicted_partials: u64,
}

pub struct TranscriptEngine {
    registry: TurnRegistry,
    reassembly: ReassemblyBuffer,
    stats: EngineStats,
}

impl TranscriptEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            registry: TurnRegistry::new(config.turns),
            reassembly: ReassemblyBuffer::new(config.reassembly),
            stats: EngineStats::default(),
        }
    }

    /// Evicts reassembly entries past their idle window. Runs implicitly on
    /// every chunk; the feed layer also calls it on a timer so buffers stay
    /// bounded through silence.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let evicted = self.reassembly.sweep(now);
        for key in &evicted {
            self.stats.evicted_partials += 1;
            tracing::warn!(%key, "partial_evicted");
        }
        evicted.len()
    }

    /// Runs one chunk through decode, reassembly, and the turn registry.
    /// Returns a snapshot only when state actually changed; dropped chunks
    /// and redundant events return `None`.
    pub fn apply_chunk(&mut self, chunk: &RawChunk, now: Instant) -> Option<TranscriptSnapshot> {
        self.sweep(now);
        self.stats.chunks += 1;

        match decode_chunk(chunk) {
            Ok(Decoded::Event(event)) => self.apply_event(&event, now),
            Ok(Decoded::Partial { key, text }) => {
                match self.reassembly.accumulate(&key, &text, now) {
                    AccumulateOutcome::Complete(payload) => {
                        let event = payload.into_event(&key, &chunk.sender);
                        self.apply_event(&event, now)
                    }
                    AccumulateOutcome::Buffered => {
                        tracing::debug!(%key, "partial_buffered");
                        None
                    }
                    AccumulateOutcome::Discarded => {
                        self.stats.evicted_partials += 1;
                        tracing::warn!(%key, "partial_discarded");
                        None
                    }
                }
            }
            Err(error) => {
                self.stats.decode_failures += 1;
                tracing::warn!(sender = %chunk.sender, %error, "chunk_dropped");
                None
            }
        }
    }

    /// Entry point for callers that already hold a typed event.
    pub fn apply_event(&mut self, event: &ProtocolEvent, now: Instant) -> Option<TranscriptSnapshot> {
        match self.registry.apply(event, now) {
            Applied::Changed => {
                self.stats.applied += 1;
                Some(project(&self.registry))
            }
            Applied::Noop => {
                self.stats.noops += 1;
                tracing::debug!(turn_id = %event.turn_id(), "event_noop");
                None
            }
            Applied::Rejected(reason) => {
                self.stats.rejected += 1;
                tracing::debug!(turn_id = %event.turn_id(), ?reason, "event_rejected");
                None
            }
        }
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        project(&self.registry)
    }

    pub fn registry(&self) -> &TurnRegistry {
        &self.registry
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Back to empty state. Pending partials, turns, and counters all go.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.reassembly.clear();
        self.stats = EngineStats::default();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use relay_interface::{
        RawChunk, SenderRole, TurnStatus, WordToken, encode_event, encode_legacy_chunk,
    };

    use super::*;

    fn engine() -> TranscriptEngine {
        TranscriptEngine::new(EngineConfig::default())
    }

    fn binary_chunk(sender: &str, event: &ProtocolEvent) -> RawChunk {
        RawChunk::new(sender, encode_event(event).expect("encodable event"))
    }

    fn word_fragment(turn_id: &str, seq: u64, tokens: &[(&str, u64, u64)], is_final: bool) -> ProtocolEvent {
        ProtocolEvent::TranscriptionFragment {
            turn_id: turn_id.to_string(),
            sender_id: "assistant".to_string(),
            role: SenderRole::Agent,
            text: tokens.iter().map(|(text, _, _)| *text).collect(),
            words: tokens
                .iter()
                .map(|(text, start_ms, end_ms)| WordToken {
                    text: text.to_string(),
                    is_final: false,
                    start_ms: *start_ms,
                    end_ms: *end_ms,
                })
                .collect(),
            is_final,
            sequence_id: Some(seq),
        }
    }

    #[test]
    fn two_binary_fragments_build_one_finalized_turn() {
        let mut engine = engine();
        let now = Instant::now();

        let first = binary_chunk(
            "agent-7",
            &word_fragment("1", 5, &[("Hel", 0, 200), ("lo", 200, 400)], false),
        );
        let second = binary_chunk(
            "agent-7",
            &word_fragment(
                "1",
                5,
                &[("Hel", 0, 200), ("lo", 200, 400), (" world", 480, 900)],
                true,
            ),
        );

        let snapshot = engine.apply_chunk(&first, now).expect("live snapshot");
        assert_eq!(snapshot.current.expect("live turn").text, "Hello");

        let snapshot = engine.apply_chunk(&second, now).expect("final snapshot");
        assert!(snapshot.current.is_none());
        assert_eq!(snapshot.finalized.len(), 1);
        assert_eq!(snapshot.finalized[0].text, "Hello world");
        assert_eq!(snapshot.finalized[0].status, TurnStatus::End);
    }

    #[test]
    fn a_split_legacy_payload_matches_the_single_chunk_delivery() {
        let json = r#"{"text":"counting to ten","is_final":true}"#;
        let now = Instant::now();

        let mut whole = engine();
        let one = RawChunk::new("u-77", encode_legacy_chunk("m1", 0, json).into_bytes());
        let expected = whole.apply_chunk(&one, now).expect("single-chunk snapshot");

        let (head, tail) = json.split_at(14);
        let mut split = engine();
        let first = RawChunk::new("u-77", encode_legacy_chunk("m1", 0, head).into_bytes());
        let second = RawChunk::new("u-77", encode_legacy_chunk("m1", 1, tail).into_bytes());

        assert!(split.apply_chunk(&first, now).is_none());
        let snapshot = split.apply_chunk(&second, now).expect("reassembled snapshot");

        assert_eq!(snapshot, expected);
        assert_eq!(snapshot.finalized[0].text, "counting to ten");
        assert_eq!(snapshot.finalized[0].sender_id, "u-77");
    }

    #[test]
    fn duplicate_delivery_of_a_final_chunk_emits_nothing_new() {
        let mut engine = engine();
        let now = Instant::now();
        let chunk = binary_chunk(
            "agent-7",
            &word_fragment("1", 5, &[("Done", 0, 300)], true),
        );

        assert!(engine.apply_chunk(&chunk, now).is_some());
        assert!(engine.apply_chunk(&chunk, now).is_none());

        let stats = engine.stats();
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.rejected, 1);
    }

    #[test]
    fn redelivery_of_a_chunk_with_jumbled_timings_emits_nothing_new() {
        let mut engine = engine();
        let now = Instant::now();

        // the second token runs backwards in time; only the first survives
        let event = ProtocolEvent::TranscriptionFragment {
            turn_id: "1".to_string(),
            sender_id: "assistant".to_string(),
            role: SenderRole::Agent,
            text: "Right, uh".to_string(),
            words: vec![
                WordToken {
                    text: "Right,".to_string(),
                    is_final: true,
                    start_ms: 500,
                    end_ms: 700,
                },
                WordToken {
                    text: " uh".to_string(),
                    is_final: true,
                    start_ms: 100,
                    end_ms: 200,
                },
            ],
            is_final: false,
            sequence_id: Some(5),
        };
        let chunk = binary_chunk("agent-7", &event);

        let snapshot = engine.apply_chunk(&chunk, now).expect("first delivery lands");
        assert_eq!(snapshot.current.expect("live turn").text, "Right,");

        assert!(engine.apply_chunk(&chunk, now).is_none());
        assert_eq!(engine.stats().noops, 1);
    }

    #[test]
    fn an_interrupt_chunk_settles_the_live_turn() {
        let mut engine = engine();
        let now = Instant::now();

        engine.apply_chunk(
            &binary_chunk(
                "agent-7",
                &word_fragment("2", 8, &[("I think", 0, 500), (" the answer", 550, 1100)], false),
            ),
            now,
        );

        let interrupt = ProtocolEvent::InterruptSignal {
            turn_id: "2".to_string(),
            at_offset_ms: None,
        };
        let snapshot = engine
            .apply_chunk(&binary_chunk("client", &interrupt), now)
            .expect("interrupt snapshot");

        assert_eq!(snapshot.finalized[0].status, TurnStatus::Interrupted);
        assert_eq!(snapshot.finalized[0].text, "I think the answer");

        let late = binary_chunk(
            "agent-7",
            &word_fragment("2", 8, &[(" is twelve", 1150, 1600)], false),
        );
        assert!(engine.apply_chunk(&late, now).is_none());
        assert_eq!(engine.stats().rejected, 1);
    }

    #[test]
    fn garbage_chunks_are_dropped_and_counted() {
        let mut engine = engine();

        let chunk = RawChunk::new("u-77", vec![0x00, 0x01, 0x02]);
        assert!(engine.apply_chunk(&chunk, Instant::now()).is_none());

        let stats = engine.stats();
        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.chunks, 1);
        assert!(engine.snapshot().is_empty());
    }

    #[test]
    fn idle_partials_are_evicted_and_do_not_bleed_into_reuse_of_the_key() {
        let mut engine = engine();
        let start = Instant::now();

        let json = r#"{"text":"never finished","is_final":false}"#;
        let (head, tail) = json.split_at(10);
        let first = RawChunk::new("u-77", encode_legacy_chunk("m1", 0, head).into_bytes());
        assert!(engine.apply_chunk(&first, start).is_none());

        // any later chunk past the idle window triggers the sweep
        let later = start + Duration::from_secs(6);
        let unrelated = binary_chunk("agent-7", &word_fragment("9", 1, &[("hi", 0, 90)], true));
        assert!(engine.apply_chunk(&unrelated, later).is_some());
        assert_eq!(engine.stats().evicted_partials, 1);

        // the remainder alone no longer completes anything
        let second = RawChunk::new("u-77", encode_legacy_chunk("m1", 1, tail).into_bytes());
        assert!(engine.apply_chunk(&second, later).is_none());
    }

    #[test]
    fn reset_returns_to_empty_state() {
        let mut engine = engine();
        let now = Instant::now();
        engine.apply_chunk(
            &binary_chunk("agent-7", &word_fragment("1", 5, &[("hi", 0, 90)], true)),
            now,
        );

        engine.reset();

        assert!(engine.snapshot().is_empty());
        assert_eq!(engine.stats(), EngineStats::default());
        let replay = binary_chunk("agent-7", &word_fragment("1", 5, &[("hi", 0, 90)], true));
        assert!(engine.apply_chunk(&replay, now).is_some());
    }
}
