use palaver_transcript::TranscriptSnapshot;
use tokio::sync::mpsc;

/// Where snapshots go. Delivery happens on the feed task, in event order, so
/// implementations should hand off rather than block.
pub trait SnapshotSink: Send + 'static {
    fn deliver(&mut self, snapshot: TranscriptSnapshot);
}

impl<F> SnapshotSink for F
where
    F: FnMut(TranscriptSnapshot) + Send + 'static,
{
    fn deliver(&mut self, snapshot: TranscriptSnapshot) {
        self(snapshot)
    }
}

/// Sink backed by an unbounded channel. Dropped receivers are tolerated; the
/// feed keeps consuming its source either way.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TranscriptSnapshot>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TranscriptSnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SnapshotSink for ChannelSink {
    fn deliver(&mut self, snapshot: TranscriptSnapshot) {
        let _ = self.tx.send(snapshot);
    }
}
