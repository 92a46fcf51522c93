//! PCM chunk type.

use alloc::vec::Vec;
use core::ops::Deref;

/// One emulation frame of mono 16-bit PCM.
///
/// The length is whatever the emulation core produced for that frame; it
/// is never padded or truncated to a nominal size. Chunks are immutable
/// once built and are moved, not copied, through the pipeline.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleChunk {
    samples: Vec<i16>,
}

impl SampleChunk {
    /// Wrap samples read back from the emulation core.
    pub fn from_vec(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// A chunk of `len` zero samples.
    pub fn silence(len: usize) -> Self {
        Self { samples: alloc::vec![0; len] }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Take the samples back out.
    pub fn into_vec(self) -> Vec<i16> {
        self.samples
    }

    /// Peak absolute amplitude.
    pub fn peak(&self) -> u16 {
        self.samples
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}

impl Deref for SampleChunk {
    type Target = [i16];

    fn deref(&self) -> &[i16] {
        &self.samples
    }
}

impl From<Vec<i16>> for SampleChunk {
    fn from(samples: Vec<i16>) -> Self {
        Self::from_vec(samples)
    }
}
