use std::time::Instant;

use relay_interface::{SenderRole, TurnStatus, WordToken};

use crate::granularity::Granularity;

/// One entry of a turn's word timeline. Text carries its own spacing, so the
/// turn text is the plain concatenation of word texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnWord {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// What a block-granularity merge did with the incoming text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockMerge {
    Replaced,
    Unchanged,
    Stale,
}

/// One conversation turn. Content only grows forward: committed words are
/// never removed or reordered, and the tentative tail is the only region a
/// later fragment may rewrite.
#[derive(Debug, Clone)]
pub struct Turn {
    pub id: String,
    pub role: SenderRole,
    pub sender_id: String,
    pub sequence_id: u64,
    pub status: TurnStatus,
    pub granularity: Granularity,
    /// Suppressed from projection while set.
    pub quiet: bool,
    pub(crate) created: u64,
    text: String,
    /// Committed words first, then the tentative tail.
    words: Vec<TurnWord>,
    committed_len: usize,
    last_updated_at: Instant,
}

impl Turn {
    pub(crate) fn new(
        id: &str,
        role: SenderRole,
        sender_id: &str,
        sequence_id: u64,
        granularity: Granularity,
        created: u64,
        now: Instant,
    ) -> Self {
        Self {
            id: id.to_string(),
            role,
            sender_id: sender_id.to_string(),
            sequence_id,
            status: TurnStatus::InProgress,
            granularity,
            quiet: false,
            created,
            text: String::new(),
            words: Vec::new(),
            committed_len: 0,
            last_updated_at: now,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn words(&self) -> &[TurnWord] {
        &self.words
    }

    pub fn last_updated_at(&self) -> Instant {
        self.last_updated_at
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_updated_at = now;
    }

    /// End of the last committed word, if any. Words at or below this line
    /// are settled; re-deliveries of them are skipped.
    fn watermark(&self) -> Option<u64> {
        self.words[..self.committed_len].last().map(|w| w.end_ms)
    }

    /// Word-granularity merge. Tokens sealed as final (or everything, when
    /// the fragment itself is final) extend the committed timeline; unsealed
    /// tokens wholesale-replace the tentative tail. The watermark advances
    /// with each accepted token, which keeps timings non-decreasing and makes
    /// byte-identical re-delivery a no-op. Returns whether anything changed.
    pub(crate) fn apply_words(&mut self, tokens: &[WordToken], seal_all: bool) -> bool {
        let mut watermark = self.watermark();

        let mut sealed: Vec<TurnWord> = Vec::new();
        let mut tentative: Vec<TurnWord> = Vec::new();
        for token in tokens {
            if !past_watermark(token, watermark) {
                continue;
            }
            watermark = Some(token.end_ms);
            let word = TurnWord {
                text: token.text.clone(),
                start_ms: token.start_ms,
                end_ms: token.end_ms,
            };
            if seal_all || token.is_final {
                sealed.push(word);
            } else {
                tentative.push(word);
            }
        }

        if sealed.is_empty() && tentative.is_empty() {
            return false;
        }

        let old_pending = &self.words[self.committed_len..];
        if sealed.is_empty() && tentative.as_slice() == old_pending {
            return false;
        }

        self.words.truncate(self.committed_len);
        self.words.extend(sealed);
        self.committed_len = self.words.len();
        self.words.extend(tentative);
        self.rebuild_text();
        true
    }

    /// Block-granularity merge: monotonic length growth. Shorter text is a
    /// stale re-send; identical text is a no-op.
    pub(crate) fn apply_block(&mut self, text: &str) -> BlockMerge {
        if text == self.text {
            BlockMerge::Unchanged
        } else if text.len() >= self.text.len() {
            self.text = text.to_string();
            BlockMerge::Replaced
        } else {
            BlockMerge::Stale
        }
    }

    /// Promotes the tentative tail into the committed timeline. Called when a
    /// turn reaches a terminal status.
    pub(crate) fn finalize_pending(&mut self) {
        self.committed_len = self.words.len();
    }

    /// Keeps only words ending strictly before `offset_ms` and rebuilds the
    /// text. Only meaningful for word-granularity turns.
    pub(crate) fn truncate_at(&mut self, offset_ms: u64) {
        self.words.retain(|w| w.end_ms < offset_ms);
        self.committed_len = self.words.len();
        self.rebuild_text();
    }

    fn rebuild_text(&mut self) {
        self.text = self.words.iter().map(|w| w.text.as_str()).collect();
    }
}

fn past_watermark(token: &WordToken, watermark: Option<u64>) -> bool {
    match watermark {
        None => true,
        Some(line) => token.start_ms >= line && token.end_ms > line,
    }
}
