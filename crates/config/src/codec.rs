//! Output codec selection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Video codec the transcoding tool is asked to produce.
///
/// Serialized with the encoder selector passed to the tool (`-c:v`), so a
/// settings file written by hand can use the same names ffmpeg does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Codec {
    #[serde(rename = "libx264", alias = "h264", alias = "x264")]
    H264,
    #[default]
    #[serde(rename = "libx265", alias = "h265", alias = "hevc", alias = "x265")]
    H265,
    #[serde(rename = "vp9")]
    Vp9,
    #[serde(rename = "av1")]
    Av1,
}

impl Codec {
    /// All codecs, in the order a front end should offer them
    pub const ALL: [Codec; 4] = [Codec::H264, Codec::H265, Codec::Vp9, Codec::Av1];

    /// Encoder selector handed to the tool after `-c:v`
    pub fn encoder_name(&self) -> &'static str {
        match self {
            Codec::H264 => "libx264",
            Codec::H265 => "libx265",
            Codec::Vp9 => "vp9",
            Codec::Av1 => "av1",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoder_name())
    }
}

/// Returned when a codec name is not recognised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCodecError(pub String);

impl fmt::Display for ParseCodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown codec '{}' (expected one of libx264, libx265, vp9, av1)",
            self.0
        )
    }
}

impl std::error::Error for ParseCodecError {}

impl FromStr for Codec {
    type Err = ParseCodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "libx264" | "h264" | "x264" | "avc" => Ok(Codec::H264),
            "libx265" | "h265" | "x265" | "hevc" => Ok(Codec::H265),
            "vp9" | "libvpx-vp9" => Ok(Codec::Vp9),
            "av1" | "libaom-av1" => Ok(Codec::Av1),
            _ => Err(ParseCodecError(s.to_string())),
        }
    }
}
