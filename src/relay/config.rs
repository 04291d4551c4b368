//! Relay configuration

use crate::error::ConfigError;
use crate::media::ImageFormat;

/// Default frame buffer size (8MB), large enough for a 4K PNG
pub const DEFAULT_MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// Default registration queue depth
pub const DEFAULT_REGISTRATION_CAPACITY: usize = 16;

/// Configuration for the ingest/dispatch pipeline
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Format of the upstream byte stream
    pub format: ImageFormat,

    /// Per-subscriber queue depth (`-q`); a deposit always drains the pending
    /// frame first, so at most one frame ever waits
    pub mailbox_capacity: usize,

    /// Subscribers that may wait for admission by the dispatcher
    pub registration_capacity: usize,

    /// Size of the scratch buffer, i.e. the largest accepted frame
    pub max_frame_size: usize,

    /// Validate PNG chunk CRCs instead of passing them through
    pub verify_checksums: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            format: ImageFormat::Jpeg,
            mailbox_capacity: 1,
            registration_capacity: DEFAULT_REGISTRATION_CAPACITY,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            verify_checksums: false,
        }
    }
}

impl RelayConfig {
    /// Create a config for the given format
    pub fn with_format(format: ImageFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    /// Set the stream format
    pub fn format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the per-subscriber mailbox capacity
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Set the registration queue capacity
    pub fn registration_capacity(mut self, capacity: usize) -> Self {
        self.registration_capacity = capacity;
        self
    }

    /// Set the maximum frame size in bytes
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Enable PNG checksum verification
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mailbox_capacity == 0 {
            return Err(ConfigError::InvalidMailboxCapacity(self.mailbox_capacity));
        }
        if self.registration_capacity == 0 {
            return Err(ConfigError::InvalidRegistrationCapacity(
                self.registration_capacity,
            ));
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::InvalidMaxFrameSize(self.max_frame_size));
        }
        Ok(())
    }
}
