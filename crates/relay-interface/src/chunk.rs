/// One opaque unit of data as delivered by the transport. Ownership ends at
/// the decoder; nothing downstream holds onto chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChunk {
    /// Transport-level identity of the publishing participant.
    pub sender: String,
    pub payload: bytes::Bytes,
}

impl RawChunk {
    pub fn new(sender: impl Into<String>, payload: impl Into<bytes::Bytes>) -> Self {
        Self {
            sender: sender.into(),
            payload: payload.into(),
        }
    }
}
