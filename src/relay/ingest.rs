//! Ingest loop
//!
//! Pulls frames out of the upstream byte stream and feeds them to the
//! dispatcher. The scratch buffer is reused for every decode; each frame is
//! copied out of it before being queued, so the dispatcher and writers can
//! keep it while the next frame is being read.
//!
//! The intake queue holds a single frame. If the dispatcher has not taken the
//! previous one yet, the loop waits, which paces reading to dispatching. Any
//! demux error ends the loop: a broken or finished stream is not retried.

use std::sync::Arc;

use tokio::io::AsyncBufRead;

use crate::error::{DemuxError, Error, Result};
use crate::media::Demuxer;
use crate::stats::RelayStats;

use super::config::RelayConfig;
use super::error::RelayError;
use super::frame::Frame;
use super::hub::FrameSender;

/// Frame producer reading from one upstream stream
pub struct Ingest<R> {
    reader: R,
    demuxer: Demuxer,
    scratch: Vec<u8>,
    intake: FrameSender,
    stats: Arc<RelayStats>,
    next_sequence: u64,
}

impl<R> Ingest<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Create an ingest loop over `reader`
    ///
    /// Allocates the scratch buffer (`config.max_frame_size` bytes) up front.
    pub fn new(reader: R, config: &RelayConfig, intake: FrameSender, stats: Arc<RelayStats>) -> Self {
        Self {
            reader,
            demuxer: Demuxer::new(config.format).verify_checksums(config.verify_checksums),
            scratch: vec![0u8; config.max_frame_size],
            intake,
            stats,
            next_sequence: 0,
        }
    }

    /// Decode the next frame into a freshly allocated buffer
    pub async fn next_frame(&mut self) -> std::result::Result<Frame, DemuxError> {
        let len = self.demuxer.decode(&mut self.reader, &mut self.scratch).await?;

        let frame = Frame::copy_from_slice(
            self.next_sequence,
            self.demuxer.format(),
            &self.scratch[..len],
        );
        self.next_sequence += 1;
        self.stats.record_ingested(len);

        tracing::trace!(sequence = frame.sequence, size = len, "Frame ingested");
        Ok(frame)
    }

    /// Run until the stream fails, ends, or the dispatcher goes away
    ///
    /// Always returns the reason ingestion stopped. A stream that ended
    /// cleanly between frames yields a `Truncated` error at offset 0, see
    /// [`DemuxError::is_clean_eof`].
    pub async fn run(mut self) -> Error {
        let format = self.demuxer.format();
        tracing::info!(
            format = %format,
            max_frame_size = self.scratch.len(),
            "Ingest starting"
        );

        let error = loop {
            let frame = match self.next_frame().await {
                Ok(frame) => frame,
                Err(e) => break Error::Demux(e),
            };

            if self.intake.send(frame).await.is_err() {
                break Error::Relay(RelayError::DispatcherClosed);
            }
        };

        match &error {
            Error::Demux(e) if e.is_clean_eof() => tracing::info!(
                frames = self.next_sequence,
                "Ingest stopped: upstream closed"
            ),
            e => tracing::error!(
                frames = self.next_sequence,
                error = %e,
                "Ingest stopped"
            ),
        }

        error
    }
}

/// Run an ingest loop to completion, returning why it stopped
pub async fn run_ingest<R>(
    reader: R,
    config: &RelayConfig,
    intake: FrameSender,
    stats: Arc<RelayStats>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    match Ingest::new(reader, config, intake, stats).run().await {
        Error::Demux(e) if e.is_clean_eof() => Ok(()),
        e => Err(e),
    }
}
