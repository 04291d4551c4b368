//! Frame demuxing for piped image streams
//!
//! An encoder such as `ffmpeg -f image2pipe` writes complete images back to
//! back with no outer framing. This module finds the boundaries again:
//! - JPEG: scan from the SOI marker to the EOI marker
//! - PNG: walk chunk headers from the signature to the IEND chunk
//!
//! Both demuxers write the frame into a caller-owned scratch buffer and return
//! its length. A frame that would overflow the buffer is reported as
//! [`DemuxError::FrameTooLarge`] before any byte past the end is touched.

pub mod format;
pub mod jpeg;
pub mod png;

use tokio::io::{AsyncBufRead, AsyncRead, AsyncReadExt};

use crate::error::DemuxError;

pub use format::ImageFormat;

/// Frame boundary detector for one configured format
#[derive(Debug, Clone, Copy)]
pub struct Demuxer {
    format: ImageFormat,
    verify_checksums: bool,
}

impl Demuxer {
    /// Create a demuxer for the given format
    pub fn new(format: ImageFormat) -> Self {
        Self {
            format,
            verify_checksums: false,
        }
    }

    /// Validate per-chunk checksums (PNG only; JPEG has none)
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Get the configured format
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Read exactly one frame from `reader` into `scratch`
    ///
    /// Returns the frame length; the frame is `scratch[..len]`. On error the
    /// reader position is unspecified and the stream should be abandoned.
    pub async fn decode<R>(&self, reader: &mut R, scratch: &mut [u8]) -> Result<usize, DemuxError>
    where
        R: AsyncBufRead + Unpin,
    {
        match self.format {
            ImageFormat::Jpeg => jpeg::read_frame(reader, scratch).await,
            ImageFormat::Png => png::read_frame(reader, scratch, self.verify_checksums).await,
        }
    }
}

/// Fail with `FrameTooLarge` unless `required` bytes fit in `buf`
pub(crate) fn ensure_capacity(
    format: ImageFormat,
    buf: &[u8],
    required: usize,
) -> Result<(), DemuxError> {
    if required > buf.len() {
        return Err(DemuxError::FrameTooLarge {
            format,
            limit: buf.len(),
            required,
        });
    }
    Ok(())
}

/// Fill `buf[offset..offset + len]` from the reader
///
/// A short read reports `Truncated` with the number of frame bytes that were
/// actually accumulated, so an end of stream between frames has offset 0.
pub(crate) async fn read_exact_into<R>(
    reader: &mut R,
    format: ImageFormat,
    buf: &mut [u8],
    offset: usize,
    len: usize,
) -> Result<(), DemuxError>
where
    R: AsyncRead + Unpin,
{
    let end = offset.saturating_add(len);
    ensure_capacity(format, buf, end)?;

    let mut filled = offset;
    while filled < end {
        match reader.read(&mut buf[filled..end]).await {
            Ok(0) => {
                return Err(DemuxError::Truncated {
                    format,
                    offset: filled,
                    source: None,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(DemuxError::Truncated {
                    format,
                    offset: filled,
                    source: Some(e),
                })
            }
        }
    }

    Ok(())
}
