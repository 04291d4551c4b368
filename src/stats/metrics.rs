//! Statistics for the relay pipeline
//!
//! Counters are updated by the ingest and dispatcher tasks and read by
//! anyone holding the `Arc`. Relaxed ordering is enough: the numbers are
//! for reporting and never drive control flow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters shared between pipeline tasks
#[derive(Debug)]
pub struct RelayStats {
    started_at: Instant,
    frames_ingested: AtomicU64,
    bytes_ingested: AtomicU64,
    frames_delivered: AtomicU64,
    frames_dropped: AtomicU64,
    subscribers_added: AtomicU64,
    subscribers_removed: AtomicU64,
    live_subscribers: AtomicU64,
}

impl RelayStats {
    /// Create zeroed stats
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_ingested: AtomicU64::new(0),
            bytes_ingested: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            subscribers_added: AtomicU64::new(0),
            subscribers_removed: AtomicU64::new(0),
            live_subscribers: AtomicU64::new(0),
        }
    }

    /// A frame of `size` bytes left the demuxer
    pub fn record_ingested(&self, size: usize) {
        self.frames_ingested.fetch_add(1, Ordering::Relaxed);
        self.bytes_ingested.fetch_add(size as u64, Ordering::Relaxed);
    }

    /// A frame was deposited in a mailbox
    pub fn record_delivered(&self) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// An unsent frame was overwritten in a mailbox
    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// A subscriber joined the live set
    pub fn record_subscriber_added(&self) {
        self.subscribers_added.fetch_add(1, Ordering::Relaxed);
    }

    /// A subscriber left the live set
    pub fn record_subscriber_removed(&self) {
        self.subscribers_removed.fetch_add(1, Ordering::Relaxed);
    }

    /// Publish the current size of the live set
    pub fn set_live_subscribers(&self, count: usize) {
        self.live_subscribers.store(count as u64, Ordering::Relaxed);
    }

    /// Current size of the live set
    pub fn live_subscribers(&self) -> u64 {
        self.live_subscribers.load(Ordering::Relaxed)
    }

    /// Take a consistent-enough copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            frames_ingested: self.frames_ingested.load(Ordering::Relaxed),
            bytes_ingested: self.bytes_ingested.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            subscribers_added: self.subscribers_added.load(Ordering::Relaxed),
            subscribers_removed: self.subscribers_removed.load(Ordering::Relaxed),
            live_subscribers: self.live_subscribers.load(Ordering::Relaxed),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`RelayStats`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    /// Time since the stats were created
    pub uptime: Duration,
    /// Frames produced by the demuxer
    pub frames_ingested: u64,
    /// Total size of those frames
    pub bytes_ingested: u64,
    /// Mailbox deposits across all subscribers
    pub frames_delivered: u64,
    /// Deposits that overwrote an unsent frame
    pub frames_dropped: u64,
    /// Subscribers admitted since start
    pub subscribers_added: u64,
    /// Subscribers removed since start
    pub subscribers_removed: u64,
    /// Current live set size
    pub live_subscribers: u64,
}

impl StatsSnapshot {
    /// Average ingest rate in frames per second
    pub fn ingest_fps(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.frames_ingested as f64 / secs
        } else {
            0.0
        }
    }

    /// Average ingest bitrate in bits per second
    pub fn ingest_bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes_ingested * 8) / secs
        } else {
            0
        }
    }
}
