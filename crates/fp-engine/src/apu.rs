//! Emulation core contract.
//!
//! The playback core treats the sound chip as a black box that accepts
//! register writes and hands back PCM once per frame. Any implementation
//! of [`Apu`] can be plugged into the player.

use alloc::boxed::Box;
use alloc::sync::Arc;

use fp_ir::ExpansionAudio;

use crate::EngineError;

/// NTSC 2A03 CPU clock in Hz.
pub const CPU_CLOCK_NTSC: f64 = 1_789_773.0;

/// NTSC video frame rate in Hz.
pub const FRAME_RATE_NTSC: f64 = 60.0988;

/// Callback the core uses to fetch DPCM sample bytes by CPU address.
pub type DmcReadFn = Arc<dyn Fn(u16) -> u8 + Send + Sync>;

/// Expansion chip flag understood by the emulation core.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ApuExpansion {
    #[default]
    None = 0,
    Vrc6 = 1,
}

/// Project expansion selector -> core flag, indexed by the selector value.
const EXPANSION_TABLE: [ApuExpansion; 2] = [ApuExpansion::None, ApuExpansion::Vrc6];

/// Resolve a project's expansion selection to the core's flag.
pub fn nes_apu_expansion(expansion: ExpansionAudio) -> ApuExpansion {
    EXPANSION_TABLE[expansion as usize]
}

/// Resolve a raw expansion selector (as stored in project data).
pub fn nes_apu_expansion_raw(selector: u8) -> Result<ApuExpansion, EngineError> {
    EXPANSION_TABLE
        .get(selector as usize)
        .copied()
        .ok_or(EngineError::UnknownExpansion(selector))
}

/// A sound chip emulator driven one video frame at a time.
///
/// Call order per frame: any number of `write_register`, then `end_frame`,
/// then `samples_available` / `read_samples` for that frame's audio.
pub trait Apu: Send {
    /// Prepare the core for output at `sample_rate`.
    fn init(&mut self, sample_rate: u32, dmc_read: DmcReadFn);

    /// Return every channel to its power-on state and select the expansion chip.
    fn reset(&mut self, expansion: ApuExpansion);

    /// Write a CPU-mapped sound register.
    fn write_register(&mut self, addr: u16, value: u8);

    /// Run the chip to the end of the current frame.
    fn end_frame(&mut self);

    /// Samples produced by the last `end_frame` and not yet read.
    fn samples_available(&self) -> usize;

    /// Copy up to `dest.len()` pending samples, returning the count copied.
    fn read_samples(&mut self, dest: &mut [i16]) -> usize;
}

impl<A: Apu + ?Sized> Apu for Box<A> {
    fn init(&mut self, sample_rate: u32, dmc_read: DmcReadFn) {
        (**self).init(sample_rate, dmc_read)
    }

    fn reset(&mut self, expansion: ApuExpansion) {
        (**self).reset(expansion)
    }

    fn write_register(&mut self, addr: u16, value: u8) {
        (**self).write_register(addr, value)
    }

    fn end_frame(&mut self) {
        (**self).end_frame()
    }

    fn samples_available(&self) -> usize {
        (**self).samples_available()
    }

    fn read_samples(&mut self, dest: &mut [i16]) -> usize {
        (**self).read_samples(dest)
    }
}
