//! Wire-level schema for the realtime transcript feed.
//!
//! A transport delivers opaque byte chunks. This crate turns them into typed
//! [`ProtocolEvent`]s: the binary frame codec is tried first, the legacy
//! delimited text format second, and legacy payloads that arrive split across
//! chunks are completed by the [`ReassemblyBuffer`].

#[macro_export]
macro_rules! common_derives {
    ($item:item) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            serde::Serialize,
            serde::Deserialize,
            specta::Type,
        )]
        $item
    };
}

mod chunk;
mod decode;
mod event;
mod frame;
mod legacy;
mod reassembly;

pub use chunk::RawChunk;
pub use decode::{DecodeError, Decoded, decode_chunk};
pub use event::{ProtocolEvent, SenderRole, TurnStatus, WordToken};
pub use frame::{FRAME_MAGIC, FRAME_VERSION, FrameError, decode_frame, encode_event};
pub use legacy::{LegacyChunk, LegacyError, LegacyPayload, encode_legacy_chunk, parse_legacy};
pub use reassembly::{AccumulateOutcome, ReassemblyBuffer, ReassemblyConfig};
