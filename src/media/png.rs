//! PNG frame boundaries
//!
//! A PNG file is an 8-byte signature followed by chunks:
//!
//! ```text
//! +-----------+-----------+----------------+-----------+
//! | Length(4) | Type(4)   | Data(Length)   | CRC(4)    |
//! +-----------+-----------+----------------+-----------+
//! ```
//!
//! Length is big-endian and counts only the data field. The image ends with
//! the `IEND` chunk. The CRC covers type and data; it is carried through
//! unchecked unless verification is requested.

use tokio::io::AsyncBufRead;

use crate::error::DemuxError;

use super::{ensure_capacity, read_exact_into, ImageFormat};

/// PNG file signature
pub const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Type tag of the terminal chunk
pub const IEND: [u8; 4] = *b"IEND";

/// Length and type fields
const CHUNK_HEADER_SIZE: usize = 8;

/// Trailing CRC field
const CHUNK_CRC_SIZE: usize = 4;

/// Read one PNG frame into `buf`, returning its length
pub async fn read_frame<R>(
    reader: &mut R,
    buf: &mut [u8],
    verify_checksums: bool,
) -> Result<usize, DemuxError>
where
    R: AsyncBufRead + Unpin,
{
    read_exact_into(reader, ImageFormat::Png, buf, 0, SIGNATURE.len()).await?;
    if buf[..SIGNATURE.len()] != SIGNATURE {
        return Err(DemuxError::FormatMismatch {
            format: ImageFormat::Png,
            expected: &SIGNATURE,
            found: buf[..SIGNATURE.len()].to_vec(),
        });
    }

    let mut offset = SIGNATURE.len();
    loop {
        let start = offset;
        let chunk_type = read_chunk(reader, buf, &mut offset).await?;

        if verify_checksums {
            verify_chunk(&buf[start..offset])?;
        }

        if chunk_type == IEND {
            return Ok(offset);
        }
    }
}

/// Read one chunk at `buf[*offset..]`, advancing the offset past it
async fn read_chunk<R>(
    reader: &mut R,
    buf: &mut [u8],
    offset: &mut usize,
) -> Result<[u8; 4], DemuxError>
where
    R: AsyncBufRead + Unpin,
{
    read_exact_into(reader, ImageFormat::Png, buf, *offset, CHUNK_HEADER_SIZE).await?;

    let header = &buf[*offset..*offset + CHUNK_HEADER_SIZE];
    let data_len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let chunk_type = [header[4], header[5], header[6], header[7]];
    *offset += CHUNK_HEADER_SIZE;

    // Checked up front so an oversized length never reads into the buffer
    let remaining = data_len.saturating_add(CHUNK_CRC_SIZE);
    ensure_capacity(ImageFormat::Png, buf, offset.saturating_add(remaining))?;

    read_exact_into(reader, ImageFormat::Png, buf, *offset, remaining).await?;
    *offset += remaining;

    Ok(chunk_type)
}

/// Check the stored CRC of a complete chunk (header, data and CRC)
fn verify_chunk(chunk: &[u8]) -> Result<(), DemuxError> {
    let crc_at = chunk.len() - CHUNK_CRC_SIZE;
    let stored = u32::from_be_bytes([
        chunk[crc_at],
        chunk[crc_at + 1],
        chunk[crc_at + 2],
        chunk[crc_at + 3],
    ]);
    let computed = crc32(&chunk[4..crc_at]);

    if stored != computed {
        return Err(DemuxError::ChecksumMismatch {
            chunk_type: [chunk[4], chunk[5], chunk[6], chunk[7]],
            expected: stored,
            actual: computed,
        });
    }
    Ok(())
}

/// CRC-32 (ISO 3309 / ITU-T V.42), as used by PNG
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc = CRC_TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8);
    }
    crc ^ 0xFFFF_FFFF
}

const CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                0xEDB8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}
