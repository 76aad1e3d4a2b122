/// How a turn's content is merged: whole-text replacement or a timed word
/// timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Block,
    Word,
}

/// Selection policy. The decision is made once per turn, from its first
/// fragment, and never revisited; a mid-turn change of update style would
/// make merges ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GranularityMode {
    #[default]
    Auto,
    Pinned(Granularity),
}

impl GranularityMode {
    pub fn resolve(&self, has_word_timings: bool) -> Granularity {
        match self {
            GranularityMode::Pinned(granularity) => *granularity,
            GranularityMode::Auto if has_word_timings => Granularity::Word,
            GranularityMode::Auto => Granularity::Block,
        }
    }
}
