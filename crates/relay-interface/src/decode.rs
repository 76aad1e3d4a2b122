use crate::chunk::RawChunk;
use crate::event::ProtocolEvent;
use crate::frame::{self, FrameError};
use crate::legacy::{self, LegacyError, LegacyPayload};

/// What a chunk decoded into. `Partial` is the hand-off to the reassembly
/// buffer: a structurally valid legacy chunk whose payload is not yet
/// parseable JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Event(ProtocolEvent),
    Partial { key: String, text: String },
}

/// Neither wire format applied. The chunk is unrecoverable and should be
/// dropped; both causes are kept for the diagnostic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("chunk is neither a binary frame ({binary}) nor a legacy message ({legacy})")]
pub struct DecodeError {
    pub binary: FrameError,
    pub legacy: LegacyError,
}

/// Binary first, legacy second. Any structural failure of the binary schema
/// falls through to the legacy parser.
pub fn decode_chunk(chunk: &RawChunk) -> Result<Decoded, DecodeError> {
    let binary = match frame::decode_frame(&chunk.payload) {
        Ok(event) => return Ok(Decoded::Event(event)),
        Err(error) => error,
    };

    match legacy::parse_legacy(&chunk.payload) {
        Ok(parsed) => match serde_json::from_str::<LegacyPayload>(&parsed.text) {
            Ok(payload) => Ok(Decoded::Event(
                payload.into_event(&parsed.message_id, &chunk.sender),
            )),
            Err(_) => Ok(Decoded::Partial {
                key: parsed.message_id,
                text: parsed.text,
            }),
        },
        Err(legacy) => Err(DecodeError { binary, legacy }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{SenderRole, TurnStatus};
    use crate::{encode_event, encode_legacy_chunk};

    #[test]
    fn binary_frames_win_the_first_attempt() {
        let event = ProtocolEvent::AgentTurnUpdate {
            turn_id: "t1".to_string(),
            sequence_id: 4,
            status: TurnStatus::End,
            quiet: false,
        };
        let chunk = RawChunk::new("agent-1", encode_event(&event).unwrap());

        assert_eq!(decode_chunk(&chunk).unwrap(), Decoded::Event(event));
    }

    #[test]
    fn legacy_text_is_the_fallback() {
        let raw = encode_legacy_chunk("m7", 0, r#"{"text":"hi there","is_final":false,"user_id":"mara"}"#);
        let chunk = RawChunk::new("rtc-2", raw.into_bytes());

        match decode_chunk(&chunk).unwrap() {
            Decoded::Event(ProtocolEvent::TranscriptionFragment {
                turn_id,
                sender_id,
                role,
                text,
                is_final,
                ..
            }) => {
                assert_eq!(turn_id, "m7");
                assert_eq!(sender_id, "mara");
                assert_eq!(role, SenderRole::User);
                assert_eq!(text, "hi there");
                assert!(!is_final);
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn split_payload_hands_off_to_reassembly() {
        let json = r#"{"text":"long answer","is_final":true,"user_id":""}"#;
        let (head, _) = json.split_at(json.len() / 2);
        let chunk = RawChunk::new("agent-1", encode_legacy_chunk("m9", 0, head).into_bytes());

        match decode_chunk(&chunk).unwrap() {
            Decoded::Partial { key, text } => {
                assert_eq!(key, "m9");
                assert_eq!(text, head);
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn garbage_reports_both_causes() {
        let chunk = RawChunk::new("rtc-2", bytes::Bytes::from_static(b"\x00\x01\x02"));
        let error = decode_chunk(&chunk).unwrap_err();

        assert_eq!(error.binary, FrameError::BadMagic);
        assert_eq!(error.legacy, LegacyError::FieldCount(1));
    }
}
