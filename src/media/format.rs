//! Supported image container formats

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Image format carried by the upstream byte stream
///
/// The set is closed: anything else is rejected when the configuration is
/// parsed, before ingestion starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    /// Baseline JPEG frames, delimited by SOI/EOI markers (MJPEG pipe)
    #[default]
    Jpeg,
    /// PNG frames, delimited by the signature and the IEND chunk
    Png,
}

impl ImageFormat {
    /// Short name, as accepted on the command line
    pub fn name(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }

    /// MIME type of a single frame
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }

    /// Bytes every frame of this format starts with
    pub fn signature(&self) -> &'static [u8] {
        match self {
            ImageFormat::Jpeg => &super::jpeg::SOI,
            ImageFormat::Png => &super::png::SIGNATURE,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Jpeg => f.write_str("JPEG"),
            ImageFormat::Png => f.write_str("PNG"),
        }
    }
}

impl FromStr for ImageFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "mjpeg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            _ => Err(ConfigError::UnknownFormat(s.to_string())),
        }
    }
}
