//! Latest-frame-wins mailbox
//!
//! The hand-off between the dispatcher and one subscriber's writer task,
//! built on a `tokio::sync::watch` channel holding a single slot. `send`
//! never waits: it first drains whatever frame the writer has not picked up
//! yet, then deposits the new one, so a slow writer always wakes up to the
//! newest frame and never works through a backlog.
//!
//! ```text
//!  dispatcher                          writer task
//!      │ send(F1)   ┌──────┐
//!      ├──────────► │  F1  │
//!      │ send(F2)   ├──────┤
//!      ├──────────► │  F2  │  F1 dropped
//!      │            └──┬───┘
//!      │               └─────────────► recv() == F2
//! ```
//!
//! Closing the mailbox marks the subscriber dead: the pending frame is
//! dropped, further `send` calls fail and the writer's `recv` returns `None`.

use tokio::sync::watch;

use super::frame::Frame;

/// Returned by [`Mailbox::send`] once the subscriber is dead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxClosed;

impl std::fmt::Display for MailboxClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Mailbox closed")
    }
}

impl std::error::Error for MailboxClosed {}

/// Outcome of a successful [`Mailbox::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The slot was empty
    Queued,
    /// The frame replaced an older frame the writer had not picked up
    Replaced,
}

#[derive(Debug, Default)]
struct Slot {
    pending: Option<Frame>,
    closed: bool,
}

/// Single-slot overwrite hand-off with a single consumer
#[derive(Debug)]
pub struct Mailbox {
    slot: watch::Sender<Slot>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    /// Create an empty mailbox
    pub fn new() -> Self {
        let (slot, _) = watch::channel(Slot::default());
        Self { slot }
    }

    /// Deposit a frame, discarding the pending one if the writer is behind
    pub fn send(&self, frame: Frame) -> Result<Delivery, MailboxClosed> {
        let mut outcome = Err(MailboxClosed);

        self.slot.send_if_modified(|slot| {
            if slot.closed {
                return false;
            }
            outcome = Ok(match slot.pending.replace(frame) {
                Some(_) => Delivery::Replaced,
                None => Delivery::Queued,
            });
            true
        });

        outcome
    }

    /// Wait for the next frame
    ///
    /// Returns `None` once the mailbox is closed. Meant for a single consumer.
    pub async fn recv(&self) -> Option<Frame> {
        // Subscribed before the first look, so a deposit made after it
        // always marks the receiver changed
        let mut changes = self.slot.subscribe();

        loop {
            let (frame, closed) = self.take();
            if closed {
                return None;
            }
            if frame.is_some() {
                return frame;
            }
            if changes.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Take the pending frame without waiting
    pub fn try_recv(&self) -> Option<Frame> {
        self.take().0
    }

    /// Mark the subscriber dead and wake the writer
    ///
    /// Returns `true` if this call closed the mailbox.
    pub fn close(&self) -> bool {
        let mut newly_closed = false;

        self.slot.send_if_modified(|slot| {
            newly_closed = !slot.closed;
            slot.closed = true;
            slot.pending = None;
            newly_closed
        });

        newly_closed
    }

    /// Whether the mailbox has been closed
    pub fn is_closed(&self) -> bool {
        self.slot.borrow().closed
    }

    /// Number of frames waiting for the writer (0 or 1)
    pub fn len(&self) -> usize {
        usize::from(self.slot.borrow().pending.is_some())
    }

    /// Whether no frame is waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take(&self) -> (Option<Frame>, bool) {
        let mut taken = None;
        let mut closed = false;

        // Emptying the slot is not news for anyone: no notification
        self.slot.send_if_modified(|slot| {
            closed = slot.closed;
            taken = slot.pending.take();
            false
        });

        (taken, closed)
    }
}
