//! JPEG frame boundaries
//!
//! A JPEG image starts with the SOI marker and ends with the EOI marker:
//!
//! ```text
//! +-------+----------------------------------------+-------+
//! | FF D8 | segments / entropy-coded data ...      | FF D9 |
//! +-------+----------------------------------------+-------+
//!   SOI                                              EOI
//! ```
//!
//! The demuxer does not walk segments. It scans for the byte `D9` and checks
//! whether the two accumulated bytes before the cut are `FF D9`. Inside
//! entropy-coded data a literal `FF` is always stuffed as `FF 00`, so encoder
//! output that follows the standard never produces a premature match.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::DemuxError;

use super::{ensure_capacity, read_exact_into, ImageFormat};

/// Start-of-image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// End-of-image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Read one JPEG frame into `buf`, returning its length
pub async fn read_frame<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize, DemuxError>
where
    R: AsyncBufRead + Unpin,
{
    read_exact_into(reader, ImageFormat::Jpeg, buf, 0, SOI.len()).await?;
    if buf[..SOI.len()] != SOI {
        return Err(DemuxError::FormatMismatch {
            format: ImageFormat::Jpeg,
            expected: &SOI,
            found: buf[..SOI.len()].to_vec(),
        });
    }

    let mut offset = SOI.len();
    loop {
        offset = read_through(reader, buf, offset, EOI[1]).await?;
        if buf[..offset].ends_with(&EOI) {
            return Ok(offset);
        }
    }
}

/// Append bytes up to and including `delim` at `buf[offset..]`
///
/// Returns the new offset. Works directly on the reader's internal buffer so
/// a frame is copied exactly once.
async fn read_through<R>(
    reader: &mut R,
    buf: &mut [u8],
    mut offset: usize,
    delim: u8,
) -> Result<usize, DemuxError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = match reader.fill_buf().await {
            Ok(available) => available,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(DemuxError::Truncated {
                    format: ImageFormat::Jpeg,
                    offset,
                    source: Some(e),
                })
            }
        };
        if available.is_empty() {
            return Err(DemuxError::Truncated {
                format: ImageFormat::Jpeg,
                offset,
                source: None,
            });
        }

        let (take, found) = match available.iter().position(|&b| b == delim) {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };

        ensure_capacity(ImageFormat::Jpeg, buf, offset + take)?;
        buf[offset..offset + take].copy_from_slice(&available[..take]);
        reader.consume(take);
        offset += take;

        if found {
            return Ok(offset);
        }
    }
}
