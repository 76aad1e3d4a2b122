//! Binary frame codec. Layout, all integers big-endian, strings
//! length-prefixed u16 UTF-8:
//!
//! ```text
//! magic "VT" | version u8 | kind u8 | body
//!
//! kind 0, fragment:
//!   flags u8 (1 FINAL, 2 AGENT, 4 HAS_SEQ)
//!   turn_id str | sender_id str | [sequence_id u64] | text str
//!   token_count u16, per token: text str | flags u8 (1 FINAL) | start_ms u32 | end_ms u32
//! kind 1, turn update:
//!   turn_id str | sequence_id u64 | status u8 | flags u8 (1 QUIET)
//! kind 2, interrupt:
//!   turn_id str | flags u8 (1 HAS_OFFSET) | [offset_ms u32]
//! ```
//!
//! A frame must consume its payload exactly.

use bytes::{BufMut, Bytes, BytesMut};

use crate::event::{ProtocolEvent, SenderRole, TurnStatus, WordToken};

pub const FRAME_MAGIC: [u8; 2] = *b"VT";
pub const FRAME_VERSION: u8 = 1;

const KIND_FRAGMENT: u8 = 0;
const KIND_TURN_UPDATE: u8 = 1;
const KIND_INTERRUPT: u8 = 2;

const FRAG_FINAL: u8 = 1 << 0;
const FRAG_AGENT: u8 = 1 << 1;
const FRAG_HAS_SEQ: u8 = 1 << 2;
const TOKEN_FINAL: u8 = 1 << 0;
const UPDATE_QUIET: u8 = 1 << 0;
const INTERRUPT_HAS_OFFSET: u8 = 1 << 0;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame truncated")]
    Truncated,
    #[error("bad magic bytes")]
    BadMagic,
    #[error("unsupported frame version {0}")]
    UnsupportedVersion(u8),
    #[error("unknown frame kind {0}")]
    UnknownKind(u8),
    #[error("unknown turn status byte {0}")]
    UnknownStatus(u8),
    #[error("string field is not valid utf-8")]
    NonUtf8,
    #[error("string field longer than the u16 length prefix allows")]
    FieldTooLong,
    #[error("timestamp exceeds the u32 wire range")]
    TimestampOutOfRange,
    #[error("trailing bytes after frame body")]
    TrailingBytes,
}

struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], FrameError> {
        if self.buf.len() < len {
            return Err(FrameError::Truncated);
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, FrameError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, FrameError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, FrameError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, FrameError> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_be_bytes(raw))
    }

    fn str16(&mut self) -> Result<String, FrameError> {
        let len = self.u16()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| FrameError::NonUtf8)
    }
}

pub fn decode_frame(payload: &[u8]) -> Result<ProtocolEvent, FrameError> {
    let mut cur = Cursor::new(payload);

    if cur.take(2)? != FRAME_MAGIC.as_slice() {
        return Err(FrameError::BadMagic);
    }
    match cur.u8()? {
        FRAME_VERSION => {}
        other => return Err(FrameError::UnsupportedVersion(other)),
    }

    let event = match cur.u8()? {
        KIND_FRAGMENT => decode_fragment(&mut cur)?,
        KIND_TURN_UPDATE => decode_turn_update(&mut cur)?,
        KIND_INTERRUPT => decode_interrupt(&mut cur)?,
        kind => return Err(FrameError::UnknownKind(kind)),
    };

    if !cur.is_empty() {
        return Err(FrameError::TrailingBytes);
    }
    Ok(event)
}

fn decode_fragment(cur: &mut Cursor) -> Result<ProtocolEvent, FrameError> {
    let flags = cur.u8()?;
    let turn_id = cur.str16()?;
    let sender_id = cur.str16()?;
    let sequence_id = if flags & FRAG_HAS_SEQ != 0 {
        Some(cur.u64()?)
    } else {
        None
    };
    let text = cur.str16()?;

    let token_count = cur.u16()?;
    let mut words = Vec::new();
    for _ in 0..token_count {
        let text = cur.str16()?;
        let token_flags = cur.u8()?;
        let start_ms = cur.u32()? as u64;
        let end_ms = cur.u32()? as u64;
        words.push(WordToken {
            text,
            is_final: token_flags & TOKEN_FINAL != 0,
            start_ms,
            end_ms,
        });
    }

    Ok(ProtocolEvent::TranscriptionFragment {
        turn_id,
        sender_id,
        role: if flags & FRAG_AGENT != 0 {
            SenderRole::Agent
        } else {
            SenderRole::User
        },
        text,
        words,
        is_final: flags & FRAG_FINAL != 0,
        sequence_id,
    })
}

fn decode_turn_update(cur: &mut Cursor) -> Result<ProtocolEvent, FrameError> {
    let turn_id = cur.str16()?;
    let sequence_id = cur.u64()?;
    let status = match cur.u8()? {
        0 => TurnStatus::InProgress,
        1 => TurnStatus::End,
        2 => TurnStatus::Interrupted,
        byte => return Err(FrameError::UnknownStatus(byte)),
    };
    let flags = cur.u8()?;

    Ok(ProtocolEvent::AgentTurnUpdate {
        turn_id,
        sequence_id,
        status,
        quiet: flags & UPDATE_QUIET != 0,
    })
}

fn decode_interrupt(cur: &mut Cursor) -> Result<ProtocolEvent, FrameError> {
    let turn_id = cur.str16()?;
    let flags = cur.u8()?;
    let at_offset_ms = if flags & INTERRUPT_HAS_OFFSET != 0 {
        Some(cur.u32()? as u64)
    } else {
        None
    };

    Ok(ProtocolEvent::InterruptSignal {
        turn_id,
        at_offset_ms,
    })
}

pub fn encode_event(event: &ProtocolEvent) -> Result<Bytes, FrameError> {
    let mut buf = BytesMut::new();
    buf.put_slice(&FRAME_MAGIC);
    buf.put_u8(FRAME_VERSION);

    match event {
        ProtocolEvent::TranscriptionFragment {
            turn_id,
            sender_id,
            role,
            text,
            words,
            is_final,
            sequence_id,
        } => {
            buf.put_u8(KIND_FRAGMENT);
            let mut flags = 0u8;
            if *is_final {
                flags |= FRAG_FINAL;
            }
            if *role == SenderRole::Agent {
                flags |= FRAG_AGENT;
            }
            if sequence_id.is_some() {
                flags |= FRAG_HAS_SEQ;
            }
            buf.put_u8(flags);
            put_str16(&mut buf, turn_id)?;
            put_str16(&mut buf, sender_id)?;
            if let Some(seq) = sequence_id {
                buf.put_u64(*seq);
            }
            put_str16(&mut buf, text)?;

            if words.len() > u16::MAX as usize {
                return Err(FrameError::FieldTooLong);
            }
            buf.put_u16(words.len() as u16);
            for word in words {
                put_str16(&mut buf, &word.text)?;
                buf.put_u8(if word.is_final { TOKEN_FINAL } else { 0 });
                put_ms32(&mut buf, word.start_ms)?;
                put_ms32(&mut buf, word.end_ms)?;
            }
        }
        ProtocolEvent::AgentTurnUpdate {
            turn_id,
            sequence_id,
            status,
            quiet,
        } => {
            buf.put_u8(KIND_TURN_UPDATE);
            put_str16(&mut buf, turn_id)?;
            buf.put_u64(*sequence_id);
            buf.put_u8(match status {
                TurnStatus::InProgress => 0,
                TurnStatus::End => 1,
                TurnStatus::Interrupted => 2,
            });
            buf.put_u8(if *quiet { UPDATE_QUIET } else { 0 });
        }
        ProtocolEvent::InterruptSignal {
            turn_id,
            at_offset_ms,
        } => {
            buf.put_u8(KIND_INTERRUPT);
            put_str16(&mut buf, turn_id)?;
            match at_offset_ms {
                Some(ms) => {
                    buf.put_u8(INTERRUPT_HAS_OFFSET);
                    put_ms32(&mut buf, *ms)?;
                }
                None => buf.put_u8(0),
            }
        }
    }

    Ok(buf.freeze())
}

fn put_str16(buf: &mut BytesMut, s: &str) -> Result<(), FrameError> {
    let raw = s.as_bytes();
    if raw.len() > u16::MAX as usize {
        return Err(FrameError::FieldTooLong);
    }
    buf.put_u16(raw.len() as u16);
    buf.put_slice(raw);
    Ok(())
}

fn put_ms32(buf: &mut BytesMut, ms: u64) -> Result<(), FrameError> {
    let value = u32::try_from(ms).map_err(|_| FrameError::TimestampOutOfRange)?;
    buf.put_u32(value);
    Ok(())
}
