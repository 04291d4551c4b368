//! In-memory transports for relay tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Semaphore;

use super::subscriber::Transport;

/// Poll `condition` until it holds, failing the test after 5 seconds
pub(crate) async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[derive(Default)]
struct Recorded {
    frames: Mutex<Vec<Bytes>>,
    writes: AtomicUsize,
    closes: AtomicUsize,
}

impl Recorded {
    fn frames(&self) -> Vec<Bytes> {
        self.frames.lock().unwrap().clone()
    }
}

/// Transport that records every frame written to it
#[derive(Clone, Default)]
pub(crate) struct RecordingTransport {
    inner: Arc<Recorded>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn frames(&self) -> Vec<Bytes> {
        self.inner.frames()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }
}

impl Transport for RecordingTransport {
    async fn write(&mut self, data: Bytes) -> std::io::Result<()> {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.frames.lock().unwrap().push(data);
        Ok(())
    }

    async fn close(&mut self) {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Transport whose every write fails
#[derive(Clone, Default)]
pub(crate) struct FailingTransport {
    inner: Arc<Recorded>,
}

impl FailingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn write_attempts(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn close_count(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }
}

impl Transport for FailingTransport {
    async fn write(&mut self, _data: Bytes) -> std::io::Result<()> {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Err(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "peer went away",
        ))
    }

    async fn close(&mut self) {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Transport whose writes hang until released, like a stalled socket
#[derive(Clone)]
pub(crate) struct GatedTransport {
    inner: Arc<Recorded>,
    gate: Arc<Semaphore>,
}

impl GatedTransport {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::default(),
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// Let `n` blocked or future writes complete
    pub(crate) fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Writes started but not yet completed
    pub(crate) fn pending_writes(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst) - self.inner.frames().len()
    }

    pub(crate) fn frames(&self) -> Vec<Bytes> {
        self.inner.frames()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }
}

impl Transport for GatedTransport {
    async fn write(&mut self, data: Bytes) -> std::io::Result<()> {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        permit.forget();
        self.inner.frames.lock().unwrap().push(data);
        Ok(())
    }

    async fn close(&mut self) {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
    }
}
