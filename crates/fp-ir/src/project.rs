//! Project-level data: songs, expansion selection and DPCM samples.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::channel::{ChannelType, ExpansionAudio};
use crate::song::Song;

/// CPU address where DPCM sample memory begins.
pub const DPCM_BASE_ADDRESS: u16 = 0xC000;

/// Size of the DPCM address window ($C000-$FFFF).
const DPCM_MEMORY_SIZE: usize = 0x4000;

/// DPCM samples start on 64-byte boundaries.
const DPCM_ALIGNMENT: usize = 64;

/// A 1-bit delta encoded sample.
#[derive(Clone, Debug, Default)]
pub struct DpcmSample {
    pub name: ArrayString<32>,
    pub data: Vec<u8>,
}

impl DpcmSample {
    pub fn new(name: &str, data: Vec<u8>) -> Self {
        let mut title = ArrayString::new();
        let _ = title.try_push_str(name);
        Self { name: title, data }
    }
}

/// A project: the songs and the chip configuration they share.
#[derive(Clone, Debug, Default)]
pub struct Project {
    pub expansion_audio: ExpansionAudio,
    pub songs: Vec<Song>,
    pub dpcm_samples: Vec<DpcmSample>,
}

impl Project {
    pub fn new(expansion_audio: ExpansionAudio) -> Self {
        Self { expansion_audio, ..Default::default() }
    }

    /// Whether a channel produces sound under the selected expansion.
    pub fn is_channel_active(&self, channel: ChannelType) -> bool {
        match channel.expansion() {
            ExpansionAudio::None => true,
            expansion => expansion == self.expansion_audio,
        }
    }

    /// Number of active channels.
    pub fn active_channel_count(&self) -> usize {
        ChannelType::ALL
            .iter()
            .filter(|&&ty| self.is_channel_active(ty))
            .count()
    }

    /// Flat image of DPCM memory starting at `DPCM_BASE_ADDRESS`.
    ///
    /// Samples that do not fit in the 16 KiB window are left out.
    pub fn dpcm_memory(&self) -> Vec<u8> {
        let mut memory = Vec::new();
        for sample in &self.dpcm_samples {
            let start = align_up(memory.len());
            if start + sample.data.len() > DPCM_MEMORY_SIZE {
                break;
            }
            memory.resize(start, 0x55);
            memory.extend_from_slice(&sample.data);
        }
        memory
    }

    /// CPU address and byte length of a DPCM sample inside `dpcm_memory()`.
    pub fn dpcm_sample_location(&self, index: usize) -> Option<(u16, usize)> {
        let mut offset = 0usize;
        for (i, sample) in self.dpcm_samples.iter().enumerate() {
            let start = align_up(offset);
            if start + sample.data.len() > DPCM_MEMORY_SIZE {
                return None;
            }
            if i == index {
                return Some((DPCM_BASE_ADDRESS + start as u16, sample.data.len()));
            }
            offset = start + sample.data.len();
        }
        None
    }
}

fn align_up(offset: usize) -> usize {
    offset.div_ceil(DPCM_ALIGNMENT) * DPCM_ALIGNMENT
}
