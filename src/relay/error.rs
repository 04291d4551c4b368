//! Relay error types

use super::frame::SubscriberId;

/// Error type for relay operations
#[derive(Debug)]
pub enum RelayError {
    /// The dispatcher has stopped and no longer admits subscribers
    DispatcherClosed,
    /// Writing a frame to a subscriber's transport failed
    SubscriberWriteFailed {
        id: SubscriberId,
        source: std::io::Error,
    },
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::DispatcherClosed => write!(f, "Dispatcher is not running"),
            RelayError::SubscriberWriteFailed { id, source } => {
                write!(f, "Write to subscriber {} failed: {}", id, source)
            }
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::SubscriberWriteFailed { source, .. } => Some(source),
            RelayError::DispatcherClosed => None,
        }
    }
}
