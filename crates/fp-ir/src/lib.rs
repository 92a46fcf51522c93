//! Composition model for the famiplay playback engine.
//!
//! This crate defines the read-only view of a project that the playback
//! core consumes: songs, patterns, notes, the closed set of channel types
//! and the expansion-audio selector. The editor owns and mutates these
//! types; playback only ever reads a snapshot.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod channel;
pub mod demo;
mod pattern;
mod position;
mod project;
mod song;

pub use channel::{ChannelType, ExpansionAudio};
pub use pattern::{Note, Pattern, NOTE_MAX, NOTE_STOP};
pub use position::{LoopMode, PlaybackPosition};
pub use project::{DpcmSample, Project, DPCM_BASE_ADDRESS};
pub use song::{ChannelTrack, Song};

/// Errors raised when raw identifiers from outside the model do not map
/// onto one of its closed enumerations.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrError {
    /// Channel type identifier outside the supported set.
    #[error("unknown channel type identifier {0}")]
    UnknownChannelType(u8),

    /// Expansion audio selector outside the supported set.
    #[error("unknown expansion audio selector {0}")]
    UnknownExpansion(u8),
}
