//! Fallback text format: `messageId|version|partIndex|base64(JSON)`.
//!
//! The payload JSON is `{ "text": string, "is_final": bool, "user_id"?: string }`.
//! An empty `user_id` denotes the agent; the delimited header may carry extra
//! fields after the payload, which are ignored.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::common_derives;
use crate::event::{ProtocolEvent, SenderRole};

pub const LEGACY_DELIMITER: char = '|';

common_derives! {
    pub struct LegacyPayload {
        pub text: String,
        pub is_final: bool,
        #[serde(default)]
        pub user_id: Option<String>,
    }
}

/// A structurally valid legacy chunk whose payload text has been base64-decoded
/// but not yet parsed as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyChunk {
    pub message_id: String,
    pub version: u32,
    pub part_index: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LegacyError {
    #[error("chunk is not valid utf-8 text")]
    NonUtf8,
    #[error("expected at least 4 delimited fields, found {0}")]
    FieldCount(usize),
    #[error("empty message id")]
    EmptyMessageId,
    #[error("version is not a number: {0:?}")]
    BadVersion(String),
    #[error("part index is not a number: {0:?}")]
    BadPartIndex(String),
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decoded payload is not valid utf-8 text")]
    PayloadUtf8,
}

pub fn parse_legacy(payload: &[u8]) -> Result<LegacyChunk, LegacyError> {
    let text = std::str::from_utf8(payload).map_err(|_| LegacyError::NonUtf8)?;

    let fields: Vec<&str> = text.split(LEGACY_DELIMITER).collect();
    if fields.len() < 4 {
        return Err(LegacyError::FieldCount(fields.len()));
    }
    if fields[0].is_empty() {
        return Err(LegacyError::EmptyMessageId);
    }

    let version = fields[1]
        .parse::<u32>()
        .map_err(|_| LegacyError::BadVersion(fields[1].to_string()))?;
    let part_index = fields[2]
        .parse::<u32>()
        .map_err(|_| LegacyError::BadPartIndex(fields[2].to_string()))?;

    let raw = BASE64.decode(fields[3])?;
    let text = String::from_utf8(raw).map_err(|_| LegacyError::PayloadUtf8)?;

    Ok(LegacyChunk {
        message_id: fields[0].to_string(),
        version,
        part_index,
        text,
    })
}

impl LegacyPayload {
    /// The legacy format has no turn ids of its own, so the message id becomes
    /// the turn id. `user_id` empty means the agent wrote this; absent means an
    /// anonymous user fragment attributed to the transport sender.
    pub fn into_event(self, message_id: &str, transport_sender: &str) -> ProtocolEvent {
        let (role, sender_id) = match self.user_id.as_deref() {
            Some("") => (SenderRole::Agent, transport_sender.to_string()),
            Some(name) => (SenderRole::User, name.to_string()),
            None => (SenderRole::User, transport_sender.to_string()),
        };

        ProtocolEvent::TranscriptionFragment {
            turn_id: message_id.to_string(),
            sender_id,
            role,
            text: self.text,
            words: Vec::new(),
            is_final: self.is_final,
            sequence_id: None,
        }
    }
}

pub fn encode_legacy_chunk(message_id: &str, part_index: u32, payload_json: &str) -> String {
    format!(
        "{message_id}|1|{part_index}|{}",
        BASE64.encode(payload_json)
    )
}
