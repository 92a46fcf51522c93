//! Per-channel playback state.
//!
//! Every active channel gets one [`ChannelState`] for the lifetime of a
//! playback session. The shared part (identity, current note, volume) is
//! common to all channels; the hardware-specific part is a closed
//! [`ChannelKind`] resolved once when the state is built, so the per-frame
//! dispatch is a plain `match`.

use fp_ir::{ChannelType, Project, Song, DPCM_BASE_ADDRESS};

use crate::apu::Apu;
use crate::period::note_to_period;
use crate::EngineError;

/// Most DPCM samples a DPCM channel can map notes onto.
pub const MAX_DPCM_SAMPLES: usize = 16;

const PERIOD_MAX_2A03: u16 = 0x7FF;
const PERIOD_MAX_VRC6: u16 = 0xFFF;

/// Largest saw accumulator rate that does not wrap (and distort).
const SAW_RATE_MAX: u8 = 42;

/// All channel states of a session, in canonical channel order.
pub type ChannelStates = heapless::Vec<ChannelState, { ChannelType::COUNT }>;

/// Location of a DPCM sample as DMC register values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DpcmSlot {
    /// `$4012`: (address - $C000) / 64
    pub address_reg: u8,
    /// `$4013`: (length - 1) / 16
    pub length_reg: u8,
}

/// Hardware-specific channel behavior.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    /// Plain 2A03 channel: pulse duty/volume/period writes. Also drives the
    /// noise and DPCM channels through their own register groups.
    ApuSquare {
        duty: u8,
        /// Last value written to the period high register; rewriting it
        /// restarts the pulse sequencer and clicks.
        period_hi: Option<u8>,
        dpcm: heapless::Vec<DpcmSlot, MAX_DPCM_SAMPLES>,
    },
    /// 2A03 triangle: no volume control, linear counter gates the output.
    ApuTriangle,
    /// VRC6 pulse with 3-bit duty.
    Vrc6Square { duty: u8 },
    /// VRC6 sawtooth, volume expressed as accumulator rate.
    Vrc6Saw,
}

/// Playback state of one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelState {
    apu_index: usize,
    channel_type: ChannelType,
    kind: ChannelKind,
    /// Current musical note value (0 = none yet)
    note: u8,
    /// Current volume (0-15)
    volume: u8,
    /// Is the channel sounding?
    playing: bool,
    /// A note or stop arrived since the last register update
    triggered: bool,
}

impl ChannelState {
    /// Build the state matching `channel_type` for emulation core `apu_index`.
    pub fn new(apu_index: usize, channel_type: ChannelType) -> Self {
        let kind = match channel_type {
            ChannelType::Square1
            | ChannelType::Square2
            | ChannelType::Noise
            | ChannelType::Dpcm => ChannelKind::ApuSquare {
                duty: 2,
                period_hi: None,
                dpcm: heapless::Vec::new(),
            },
            ChannelType::Triangle => ChannelKind::ApuTriangle,
            ChannelType::Vrc6Square1 | ChannelType::Vrc6Square2 => {
                ChannelKind::Vrc6Square { duty: 7 }
            }
            ChannelType::Vrc6Saw => ChannelKind::Vrc6Saw,
        };

        Self {
            apu_index,
            channel_type,
            kind,
            note: 0,
            volume: 15,
            playing: false,
            triggered: false,
        }
    }

    pub fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    /// Index of the emulation core this channel writes to.
    pub fn apu_index(&self) -> usize {
        self.apu_index
    }

    pub fn kind(&self) -> &ChannelKind {
        &self.kind
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Map DPCM notes onto the project's samples. Ignored for other channels.
    pub fn load_dpcm_samples(&mut self, project: &Project) {
        if self.channel_type != ChannelType::Dpcm {
            return;
        }
        if let ChannelKind::ApuSquare { dpcm, .. } = &mut self.kind {
            dpcm.clear();
            for index in 0..project.dpcm_samples.len().min(MAX_DPCM_SAMPLES) {
                let Some((address, len)) = project.dpcm_sample_location(index) else {
                    break;
                };
                let slot = DpcmSlot {
                    address_reg: ((address - DPCM_BASE_ADDRESS) / 64) as u8,
                    length_reg: (len.saturating_sub(1) / 16).min(0xFF) as u8,
                };
                let _ = dpcm.push(slot);
            }
        }
    }

    /// Return to the silent power-on state, keeping identity and DPCM map.
    pub fn reset(&mut self) {
        self.note = 0;
        self.volume = 15;
        self.playing = false;
        self.triggered = false;
        if let ChannelKind::ApuSquare { period_hi, .. } = &mut self.kind {
            *period_hi = None;
        }
    }

    /// Apply the note at song position (`pattern`, `note`).
    ///
    /// Returns the new speed if the note carries a speed effect.
    pub fn advance(&mut self, song: &Song, pattern: u16, note: u16) -> Option<u8> {
        let slot = song.note_at(self.channel_type, pattern, note);

        if let Some(volume) = slot.volume {
            self.volume = volume.min(15);
        }

        if slot.is_musical() {
            self.note = slot.value;
            self.playing = true;
            self.triggered = true;
        } else if slot.is_stop() {
            self.playing = false;
            self.triggered = true;
        }

        slot.speed.filter(|&s| s > 0)
    }

    /// Write this channel's registers for the current frame.
    pub fn update_apu<A: Apu + ?Sized>(&mut self, apu: &mut A) {
        let triggered = core::mem::take(&mut self.triggered);

        match self.channel_type {
            ChannelType::Square1 => self.write_square(apu, 0x4000),
            ChannelType::Square2 => self.write_square(apu, 0x4004),
            ChannelType::Triangle => self.write_triangle(apu),
            ChannelType::Noise => self.write_noise(apu),
            ChannelType::Dpcm => self.write_dpcm(apu, triggered),
            ChannelType::Vrc6Square1 => self.write_vrc6_square(apu, 0x9000),
            ChannelType::Vrc6Square2 => self.write_vrc6_square(apu, 0xA000),
            ChannelType::Vrc6Saw => self.write_vrc6_saw(apu),
        }
    }

    fn write_square<A: Apu + ?Sized>(&mut self, apu: &mut A, base: u16) {
        let ChannelKind::ApuSquare { duty, period_hi, .. } = &mut self.kind else {
            return;
        };
        if !self.playing {
            apu.write_register(base, 0x30);
            return;
        }

        let period = note_to_period(self.note, 16, PERIOD_MAX_2A03);
        let hi = (period >> 8) as u8 & 0x07;

        apu.write_register(base, (*duty << 6) | 0x30 | self.volume);
        apu.write_register(base + 2, period as u8);
        if *period_hi != Some(hi) {
            apu.write_register(base + 3, hi | 0xF8);
            *period_hi = Some(hi);
        }
    }

    fn write_triangle<A: Apu + ?Sized>(&self, apu: &mut A) {
        if !self.playing {
            apu.write_register(0x4008, 0x80);
            return;
        }

        let period = note_to_period(self.note, 32, PERIOD_MAX_2A03);
        apu.write_register(0x4008, 0xFF);
        apu.write_register(0x400A, period as u8);
        apu.write_register(0x400B, (period >> 8) as u8 & 0x07);
    }

    fn write_noise<A: Apu + ?Sized>(&self, apu: &mut A) {
        if !self.playing {
            apu.write_register(0x400C, 0x30);
            return;
        }

        // Higher notes select shorter LFSR periods.
        let index = (self.note.wrapping_sub(1)) & 0x0F;
        apu.write_register(0x400C, 0x30 | self.volume);
        apu.write_register(0x400E, 0x0F - index);
        apu.write_register(0x400F, 0xF8);
    }

    fn write_dpcm<A: Apu + ?Sized>(&self, apu: &mut A, triggered: bool) {
        if !triggered {
            return;
        }
        let ChannelKind::ApuSquare { dpcm, .. } = &self.kind else {
            return;
        };

        // Disable DMC, keep the other channels enabled.
        apu.write_register(0x4015, 0x0F);
        if !self.playing || dpcm.is_empty() {
            return;
        }

        let slot = dpcm[self.note.saturating_sub(1) as usize % dpcm.len()];
        apu.write_register(0x4010, 0x0F);
        apu.write_register(0x4012, slot.address_reg);
        apu.write_register(0x4013, slot.length_reg);
        apu.write_register(0x4015, 0x1F);
    }

    fn write_vrc6_square<A: Apu + ?Sized>(&self, apu: &mut A, base: u16) {
        let ChannelKind::Vrc6Square { duty } = self.kind else {
            return;
        };
        if !self.playing {
            apu.write_register(base, 0x00);
            apu.write_register(base + 2, 0x00);
            return;
        }

        let period = note_to_period(self.note, 16, PERIOD_MAX_VRC6);
        apu.write_register(base, (duty << 4) | self.volume);
        apu.write_register(base + 1, period as u8);
        apu.write_register(base + 2, 0x80 | ((period >> 8) as u8 & 0x0F));
    }

    fn write_vrc6_saw<A: Apu + ?Sized>(&self, apu: &mut A) {
        if !self.playing {
            apu.write_register(0xB002, 0x00);
            return;
        }

        let period = note_to_period(self.note, 14, PERIOD_MAX_VRC6);
        let rate = (self.volume as u16 * SAW_RATE_MAX as u16 / 15) as u8;
        apu.write_register(0xB000, rate);
        apu.write_register(0xB001, period as u8);
        apu.write_register(0xB002, 0x80 | ((period >> 8) as u8 & 0x0F));
    }
}

/// Build the channel state for a raw channel type identifier.
pub fn create_channel_state(apu_index: usize, channel_type: u8) -> Result<ChannelState, EngineError> {
    let channel_type = ChannelType::try_from(channel_type)?;
    Ok(ChannelState::new(apu_index, channel_type))
}

/// Build states for every channel the project has active, in canonical order.
pub fn create_channel_states(project: &Project, apu_index: usize) -> ChannelStates {
    let mut states = ChannelStates::new();
    for channel_type in ChannelType::ALL {
        if !project.is_channel_active(channel_type) {
            continue;
        }
        let mut state = ChannelState::new(apu_index, channel_type);
        state.load_dpcm_samples(project);
        // Capacity equals the number of channel types.
        let _ = states.push(state);
    }
    states
}
