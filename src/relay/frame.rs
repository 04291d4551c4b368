//! Frames and subscriber identities

use bytes::Bytes;

use crate::media::ImageFormat;

/// Unique identifier for a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// One complete encoded image
///
/// Cheap to clone: `Bytes` is reference counted, so every mailbox and writer
/// holding the frame shares a single allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Ingest order, starting at 0
    pub sequence: u64,
    /// Container format of `data`
    pub format: ImageFormat,
    /// Complete image including its framing bytes
    pub data: Bytes,
}

impl Frame {
    /// Create a frame
    pub fn new(sequence: u64, format: ImageFormat, data: Bytes) -> Self {
        Self {
            sequence,
            format,
            data,
        }
    }

    /// Copy a frame out of a scratch buffer
    ///
    /// The copy detaches the frame from the scratch buffer, which the ingest
    /// loop overwrites on the next decode.
    pub fn copy_from_slice(sequence: u64, format: ImageFormat, scratch: &[u8]) -> Self {
        Self::new(sequence, format, Bytes::copy_from_slice(scratch))
    }

    /// Size of the encoded image in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_detaches_from_scratch() {
        let mut scratch = vec![1u8, 2, 3, 4];
        let frame = Frame::copy_from_slice(7, ImageFormat::Jpeg, &scratch[..3]);

        scratch.fill(0);

        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.len(), 3);
        assert_eq!(&frame.data[..], &[1, 2, 3]);
    }

    #[test]
    fn test_clone_shares_data() {
        let frame = Frame::new(0, ImageFormat::Png, Bytes::from_static(b"png"));
        let clone = frame.clone();

        assert_eq!(frame.data.as_ptr(), clone.data.as_ptr());
        assert!(!clone.is_empty());
    }

    #[test]
    fn test_subscriber_id_display() {
        assert_eq!(SubscriberId(42).to_string(), "sub-42");
    }
}
