//! Frame-level playback engine for the famiplay tracker.
//!
//! Advances musical time one video frame at a time, drives the per-channel
//! state machines and talks to the emulation core through the [`Apu`]
//! trait. Everything here runs on the producer thread and never blocks.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod apu;
mod channel;
mod chunk;
mod period;
mod soft_apu;
pub mod tempo;

pub use apu::{
    nes_apu_expansion, nes_apu_expansion_raw, Apu, ApuExpansion, DmcReadFn, CPU_CLOCK_NTSC,
    FRAME_RATE_NTSC,
};
pub use channel::{
    create_channel_state, create_channel_states, ChannelKind, ChannelState, ChannelStates,
    DpcmSlot, MAX_DPCM_SAMPLES,
};
pub use chunk::SampleChunk;
pub use period::{note_frequency, note_to_period};
pub use soft_apu::SoftApu;
pub use tempo::{advance_tempo, TempoTick};

use fp_ir::IrError;

/// Errors from building engine state out of project data.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// Channel type identifier outside the supported set.
    #[error("unsupported channel type identifier {0}")]
    UnknownChannelType(u8),

    /// Expansion audio selector with no emulation-core mapping.
    #[error("unsupported expansion audio selector {0}")]
    UnknownExpansion(u8),
}

impl From<IrError> for EngineError {
    fn from(err: IrError) -> Self {
        match err {
            IrError::UnknownChannelType(id) => EngineError::UnknownChannelType(id),
            IrError::UnknownExpansion(id) => EngineError::UnknownExpansion(id),
        }
    }
}
