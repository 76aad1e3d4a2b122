use relay_interface::{SenderRole, TurnStatus, common_derives};

common_derives! {
    /// One rendered transcript entry. `text` is trimmed accumulated content;
    /// everything else mirrors the owning turn.
    pub struct MessageListItem {
        pub sender_id: String,
        pub turn_id: String,
        pub role: SenderRole,
        pub text: String,
        pub status: TurnStatus,
    }
}

common_derives! {
    /// What a consumer renders: settled turns in conversation order, plus at
    /// most one live turn for distinct styling. Snapshots are plain values;
    /// holding an old one never observes later mutations.
    pub struct TranscriptSnapshot {
        pub finalized: Vec<MessageListItem>,
        pub current: Option<MessageListItem>,
    }
}

impl TranscriptSnapshot {
    pub fn is_empty(&self) -> bool {
        self.finalized.is_empty() && self.current.is_none()
    }
}
