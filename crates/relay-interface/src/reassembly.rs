use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::legacy::LegacyPayload;

#[derive(Debug, Clone)]
pub struct ReassemblyConfig {
    /// Entries untouched for this long are evicted by [`ReassemblyBuffer::sweep`].
    pub idle_timeout: Duration,
    /// A key that fails to parse after this many accumulations is dropped.
    pub max_attempts: u32,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(5),
            max_attempts: 8,
        }
    }
}

#[derive(Debug)]
struct PendingMessage {
    text: String,
    last_touched: Instant,
    attempts: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccumulateOutcome {
    /// The buffered text became parseable JSON; the entry is gone.
    Complete(LegacyPayload),
    Buffered,
    /// Attempt budget exhausted without a parse; the entry is gone.
    Discarded,
}

/// Accumulates split legacy payloads keyed by message id until the buffered
/// text parses as JSON. Callers pass `now` explicitly, so eviction is
/// deterministic and the buffer never reads a clock.
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    entries: HashMap<String, PendingMessage>,
    config: ReassemblyConfig,
}

impl ReassemblyBuffer {
    pub fn new(config: ReassemblyConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
        }
    }

    pub fn accumulate(&mut self, key: &str, fragment: &str, now: Instant) -> AccumulateOutcome {
        let (parsed, exhausted) = {
            let entry = self
                .entries
                .entry(key.to_string())
                .or_insert_with(|| PendingMessage {
                    text: String::new(),
                    last_touched: now,
                    attempts: 0,
                });
            entry.text.push_str(fragment);
            entry.attempts += 1;
            entry.last_touched = now;

            (
                serde_json::from_str::<LegacyPayload>(&entry.text).ok(),
                entry.attempts >= self.config.max_attempts,
            )
        };

        match parsed {
            Some(payload) => {
                self.entries.remove(key);
                AccumulateOutcome::Complete(payload)
            }
            None if exhausted => {
                self.entries.remove(key);
                AccumulateOutcome::Discarded
            }
            None => AccumulateOutcome::Buffered,
        }
    }

    /// Evicts entries idle past the timeout and returns their keys.
    pub fn sweep(&mut self, now: Instant) -> Vec<String> {
        let timeout = self.config.idle_timeout;
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, pending)| now.saturating_duration_since(pending.last_touched) >= timeout)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHOLE: &str = r#"{"text":"hello there","is_final":true,"user_id":"mara"}"#;

    fn buffer() -> ReassemblyBuffer {
        ReassemblyBuffer::new(ReassemblyConfig {
            idle_timeout: Duration::from_secs(5),
            max_attempts: 3,
        })
    }

    #[test]
    fn two_halves_complete_one_payload() {
        let mut buf = buffer();
        let now = Instant::now();
        let (head, tail) = WHOLE.split_at(WHOLE.len() / 2);

        assert_eq!(buf.accumulate("m1", head, now), AccumulateOutcome::Buffered);
        match buf.accumulate("m1", tail, now) {
            AccumulateOutcome::Complete(payload) => {
                assert_eq!(payload.text, "hello there");
                assert!(payload.is_final);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn attempt_budget_discards_a_hopeless_key() {
        let mut buf = buffer();
        let now = Instant::now();

        assert_eq!(buf.accumulate("m1", "{", now), AccumulateOutcome::Buffered);
        assert_eq!(buf.accumulate("m1", "{", now), AccumulateOutcome::Buffered);
        assert_eq!(buf.accumulate("m1", "{", now), AccumulateOutcome::Discarded);
        assert!(buf.is_empty());
    }

    #[test]
    fn sweep_evicts_only_idle_entries() {
        let mut buf = buffer();
        let start = Instant::now();

        buf.accumulate("stale", "{", start);
        buf.accumulate("fresh", "{", start + Duration::from_secs(4));

        let evicted = buf.sweep(start + Duration::from_secs(6));
        assert_eq!(evicted, vec!["stale".to_string()]);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn a_key_starts_fresh_after_eviction() {
        let mut buf = buffer();
        let start = Instant::now();

        buf.accumulate("m1", r#"{"text":"orphan"#, start);
        buf.sweep(start + Duration::from_secs(10));
        assert!(buf.is_empty());

        let (head, tail) = WHOLE.split_at(10);
        let later = start + Duration::from_secs(11);
        assert_eq!(buf.accumulate("m1", head, later), AccumulateOutcome::Buffered);
        assert!(matches!(
            buf.accumulate("m1", tail, later),
            AccumulateOutcome::Complete(_)
        ));
    }

    #[test]
    fn clear_drops_everything() {
        let mut buf = buffer();
        buf.accumulate("m1", "{", Instant::now());
        buf.clear();
        assert!(buf.is_empty());
    }
}
