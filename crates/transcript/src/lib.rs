//! Turns a noisy stream of relay events into a transcript of conversation
//! turns that only ever grows forward.
//!
//! [`TurnRegistry`] owns the per-turn state machine, [`project`] renders it
//! into a [`TranscriptSnapshot`], and [`TranscriptEngine`] wires both to the
//! wire decoder and the reassembly buffer so a caller can feed raw chunks and
//! receive one snapshot per accepted mutation.

mod engine;
mod granularity;
mod projection;
mod registry;
mod turn;
mod types;

pub use engine::{EngineConfig, EngineStats, TranscriptEngine};
pub use granularity::{Granularity, GranularityMode};
pub use projection::project;
pub use registry::{Applied, RegistryConfig, RejectReason, TurnRegistry};
pub use turn::{Turn, TurnWord};
pub use types::{MessageListItem, TranscriptSnapshot};
