//! Channel type and expansion audio enumerations.

use core::fmt;

use crate::IrError;

/// A sound-generating channel, in canonical enumeration order.
///
/// The discriminant is the identifier stored in project data and the
/// position used when ordering per-channel state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ChannelType {
    Square1 = 0,
    Square2 = 1,
    Triangle = 2,
    Noise = 3,
    Dpcm = 4,
    Vrc6Square1 = 5,
    Vrc6Square2 = 6,
    Vrc6Saw = 7,
}

impl ChannelType {
    /// Number of supported channel types.
    pub const COUNT: usize = 8;

    /// All channel types in canonical order.
    pub const ALL: [ChannelType; Self::COUNT] = [
        ChannelType::Square1,
        ChannelType::Square2,
        ChannelType::Triangle,
        ChannelType::Noise,
        ChannelType::Dpcm,
        ChannelType::Vrc6Square1,
        ChannelType::Vrc6Square2,
        ChannelType::Vrc6Saw,
    ];

    /// Raw identifier of this channel type.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Expansion chip this channel belongs to (`None` for the 2A03 channels).
    pub const fn expansion(self) -> ExpansionAudio {
        match self {
            ChannelType::Vrc6Square1 | ChannelType::Vrc6Square2 | ChannelType::Vrc6Saw => {
                ExpansionAudio::Vrc6
            }
            _ => ExpansionAudio::None,
        }
    }

    /// Short display name.
    pub const fn name(self) -> &'static str {
        match self {
            ChannelType::Square1 => "Square 1",
            ChannelType::Square2 => "Square 2",
            ChannelType::Triangle => "Triangle",
            ChannelType::Noise => "Noise",
            ChannelType::Dpcm => "DPCM",
            ChannelType::Vrc6Square1 => "VRC6 Square 1",
            ChannelType::Vrc6Square2 => "VRC6 Square 2",
            ChannelType::Vrc6Saw => "VRC6 Saw",
        }
    }
}

impl TryFrom<u8> for ChannelType {
    type Error = IrError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ChannelType::ALL
            .get(value as usize)
            .copied()
            .ok_or(IrError::UnknownChannelType(value))
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Optional secondary sound chip selected by a project.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExpansionAudio {
    #[default]
    None = 0,
    Vrc6 = 1,
}

impl TryFrom<u8> for ExpansionAudio {
    type Error = IrError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ExpansionAudio::None),
            1 => Ok(ExpansionAudio::Vrc6),
            other => Err(IrError::UnknownExpansion(other)),
        }
    }
}
