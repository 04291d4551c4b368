//! Error types
//!
//! Component errors (demuxing, configuration, relay) are separate enums so
//! callers can match on exactly what went wrong. They all lift into the
//! crate-level [`Error`] through `From`, which keeps `?` usable across layers.

use std::fmt;
use std::io;

use crate::media::ImageFormat;
use crate::relay::RelayError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error
#[derive(Debug)]
pub enum Error {
    /// I/O failure outside of frame demuxing (bind, accept, ...)
    Io(io::Error),
    /// Upstream byte stream could not be split into frames
    Demux(DemuxError),
    /// Invalid configuration, detected at startup
    Config(ConfigError),
    /// Relay plumbing failure
    Relay(RelayError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Demux(e) => write!(f, "Demux error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Relay(e) => write!(f, "Relay error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Demux(e) => Some(e),
            Error::Config(e) => Some(e),
            Error::Relay(e) => Some(e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<DemuxError> for Error {
    fn from(e: DemuxError) -> Self {
        Error::Demux(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<RelayError> for Error {
    fn from(e: RelayError) -> Self {
        Error::Relay(e)
    }
}

/// Errors raised while locating frame boundaries
#[derive(Debug)]
pub enum DemuxError {
    /// The frame does not start with the format's signature
    FormatMismatch {
        format: ImageFormat,
        expected: &'static [u8],
        found: Vec<u8>,
    },
    /// The reader could not supply a required field completely
    Truncated {
        format: ImageFormat,
        /// Bytes of the current frame accumulated before the stream gave out
        offset: usize,
        /// Underlying read error, `None` on a plain end of stream
        source: Option<io::Error>,
    },
    /// The frame does not fit in the scratch buffer
    FrameTooLarge {
        format: ImageFormat,
        limit: usize,
        required: usize,
    },
    /// A PNG chunk's stored CRC does not match its contents
    ChecksumMismatch {
        chunk_type: [u8; 4],
        expected: u32,
        actual: u32,
    },
}

impl DemuxError {
    /// True when the stream ended cleanly between two frames
    pub fn is_clean_eof(&self) -> bool {
        matches!(
            self,
            DemuxError::Truncated {
                offset: 0,
                source: None,
                ..
            }
        )
    }
}

impl fmt::Display for DemuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemuxError::FormatMismatch {
                format,
                expected,
                found,
            } => write!(
                f,
                "Not a {} image: expected signature {:02X?}, found {:02X?}",
                format, expected, found
            ),
            DemuxError::Truncated {
                format,
                offset,
                source: Some(e),
            } => write!(f, "{} frame truncated at byte {}: {}", format, offset, e),
            DemuxError::Truncated {
                format,
                offset,
                source: None,
            } => write!(f, "{} frame truncated at byte {}: end of stream", format, offset),
            DemuxError::FrameTooLarge {
                format,
                limit,
                required,
            } => write!(
                f,
                "{} frame needs at least {} bytes, buffer holds {}",
                format, required, limit
            ),
            DemuxError::ChecksumMismatch {
                chunk_type,
                expected,
                actual,
            } => write!(
                f,
                "CRC mismatch in {} chunk: stored {:08X}, computed {:08X}",
                String::from_utf8_lossy(chunk_type),
                expected,
                actual
            ),
        }
    }
}

impl std::error::Error for DemuxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DemuxError::Truncated {
                source: Some(e), ..
            } => Some(e),
            _ => None,
        }
    }
}

/// Configuration rejected at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Image format name not recognized
    UnknownFormat(String),
    /// Mailbox capacity must be at least 1
    InvalidMailboxCapacity(usize),
    /// Registration queue capacity must be at least 1
    InvalidRegistrationCapacity(usize),
    /// Frame buffer size must be non-zero
    InvalidMaxFrameSize(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownFormat(name) => {
                write!(f, "Unknown image format {:?} (expected jpg or png)", name)
            }
            ConfigError::InvalidMailboxCapacity(n) => {
                write!(f, "Mailbox capacity must be at least 1, got {}", n)
            }
            ConfigError::InvalidRegistrationCapacity(n) => {
                write!(f, "Registration queue capacity must be at least 1, got {}", n)
            }
            ConfigError::InvalidMaxFrameSize(n) => {
                write!(f, "Maximum frame size must be non-zero, got {}", n)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_eof() {
        let err = DemuxError::Truncated {
            format: ImageFormat::Jpeg,
            offset: 0,
            source: None,
        };
        assert!(err.is_clean_eof());

        let err = DemuxError::Truncated {
            format: ImageFormat::Jpeg,
            offset: 12,
            source: None,
        };
        assert!(!err.is_clean_eof());

        let err = DemuxError::Truncated {
            format: ImageFormat::Png,
            offset: 0,
            source: Some(io::Error::new(io::ErrorKind::BrokenPipe, "pipe")),
        };
        assert!(!err.is_clean_eof());
    }

    #[test]
    fn test_error_display() {
        let err = DemuxError::FrameTooLarge {
            format: ImageFormat::Png,
            limit: 16,
            required: 40,
        };
        assert_eq!(err.to_string(), "PNG frame needs at least 40 bytes, buffer holds 16");

        let err = ConfigError::UnknownFormat("gif".into());
        assert!(err.to_string().contains("\"gif\""));
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = ConfigError::InvalidMailboxCapacity(0).into();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidMailboxCapacity(0))
        ));

        let err: Error = io::Error::new(io::ErrorKind::AddrInUse, "busy").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
