use serde::{Deserialize, Serialize};

/// Sample encoding of an audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleEncoding {
    PcmF32Le,
    PcmS16Le,
    PcmS24Le,
    PcmS32Le,
}

impl SampleEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PcmF32Le => "pcm_f32le",
            Self::PcmS16Le => "pcm_s16le",
            Self::PcmS24Le => "pcm_s24le",
            Self::PcmS32Le => "pcm_s32le",
        }
    }

    /// Infer the encoding from a native sample layout.
    pub fn from_layout(bits_per_channel: u16, is_float: bool) -> Option<Self> {
        match (bits_per_channel, is_float) {
            (32, true) => Some(Self::PcmF32Le),
            (16, false) => Some(Self::PcmS16Le),
            (24, false) => Some(Self::PcmS24Le),
            (32, false) => Some(Self::PcmS32Le),
            _ => None,
        }
    }
}

/// Describes the layout of an audio stream.
///
/// The native descriptor comes from the negotiated source. The output
/// descriptor is always 32-bit float, little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFormatDescriptor {
    pub sample_rate: f64,
    pub channel_count: u16,
    pub bits_per_channel: u16,
    pub is_float: bool,
    pub encoding: SampleEncoding,
}

impl AudioFormatDescriptor {
    /// Canonical output format: f32 PCM at `sample_rate` with `channel_count` channels.
    pub fn output(sample_rate: f64, channel_count: u16) -> Self {
        Self {
            sample_rate,
            channel_count,
            bits_per_channel: 32,
            is_float: true,
            encoding: SampleEncoding::PcmF32Le,
        }
    }
}

/// An audio endpoint reported by the device catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDeviceInfo {
    pub id: String,
    pub name: String,
    pub manufacturer: Option<String>,
    pub is_default: bool,
    pub is_input: bool,
    pub is_output: bool,
    pub sample_rate: f64,
    pub channel_count: u32,
}

/// Authorization state for a capture kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum PermissionStatus {
    Unknown = 0,
    Denied = 1,
    Authorized = 2,
}

impl PermissionStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_authorized(self) -> bool {
        matches!(self, Self::Authorized)
    }
}
