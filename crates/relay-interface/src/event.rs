use crate::common_derives;

common_derives! {
    #[derive(Copy, Eq, Hash)]
    #[serde(rename_all = "snake_case")]
    pub enum SenderRole {
        User,
        Agent,
    }
}

common_derives! {
    #[derive(Copy, Eq)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum TurnStatus {
        InProgress,
        End,
        Interrupted,
    }
}

impl TurnStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnStatus::End | TurnStatus::Interrupted)
    }
}

common_derives! {
    /// One recognized word. `text` carries its own spacing, so concatenating
    /// word texts reproduces the spoken phrase exactly.
    pub struct WordToken {
        pub text: String,
        pub is_final: bool,
        pub start_ms: u64,
        pub end_ms: u64,
    }
}

common_derives! {
    #[serde(tag = "type")]
    pub enum ProtocolEvent {
        TranscriptionFragment {
            turn_id: String,
            sender_id: String,
            role: SenderRole,
            text: String,
            /// Non-empty exactly when per-word timing metadata was on the wire.
            #[serde(default)]
            words: Vec<WordToken>,
            is_final: bool,
            #[serde(default)]
            sequence_id: Option<u64>,
        },
        AgentTurnUpdate {
            turn_id: String,
            sequence_id: u64,
            status: TurnStatus,
            #[serde(default)]
            quiet: bool,
        },
        InterruptSignal {
            turn_id: String,
            #[serde(default)]
            at_offset_ms: Option<u64>,
        },
    }
}

impl ProtocolEvent {
    pub fn turn_id(&self) -> &str {
        match self {
            ProtocolEvent::TranscriptionFragment { turn_id, .. }
            | ProtocolEvent::AgentTurnUpdate { turn_id, .. }
            | ProtocolEvent::InterruptSignal { turn_id, .. } => turn_id,
        }
    }

    pub fn sequence_id(&self) -> Option<u64> {
        match self {
            ProtocolEvent::TranscriptionFragment { sequence_id, .. } => *sequence_id,
            ProtocolEvent::AgentTurnUpdate { sequence_id, .. } => Some(*sequence_id),
            ProtocolEvent::InterruptSignal { .. } => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ProtocolEvent::TranscriptionFragment { text, .. } => Some(text),
            _ => None,
        }
    }
}
