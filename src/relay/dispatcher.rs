//! Broadcast dispatcher
//!
//! The dispatcher is the single owner of the live subscriber set. It runs in
//! one task and processes frames sequentially, so the set needs no lock:
//! nothing else can see it. New subscribers reach it only through the
//! registration queue; dead ones are removed by the dispatcher itself.
//!
//! Per frame:
//! 1. hand the frame to every live subscriber's mailbox (never waits)
//! 2. remove the subscribers whose mailbox reported them dead
//! 3. admit everything waiting in the registration queue
//!
//! A subscriber admitted in step 3 first sees the *next* frame.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::stats::RelayStats;

use super::frame::{Frame, SubscriberId};
use super::mailbox::Delivery;
use super::subscriber::SubscriberHandle;

/// Fan-out task owning the live subscriber set
pub struct Dispatcher {
    /// Frames from the ingest loop
    intake: mpsc::Receiver<Frame>,

    /// Subscribers waiting for admission
    registrations: mpsc::Receiver<SubscriberHandle>,

    /// Live set, only ever touched by this task
    live: HashMap<SubscriberId, SubscriberHandle>,

    stats: Arc<RelayStats>,
}

impl Dispatcher {
    /// Create a dispatcher over the given queues
    pub fn new(
        intake: mpsc::Receiver<Frame>,
        registrations: mpsc::Receiver<SubscriberHandle>,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            intake,
            registrations,
            live: HashMap::new(),
            stats,
        }
    }

    /// Run until the intake queue closes
    ///
    /// Call this in a spawned task. When the ingest side goes away every
    /// live subscriber is disconnected so its writer can shut down.
    pub async fn run(mut self) {
        tracing::info!("Dispatcher starting");

        while let Some(frame) = self.intake.recv().await {
            self.dispatch(&frame);
            self.admit_pending();
        }

        self.shutdown();
    }

    /// Offer one frame to every live subscriber
    ///
    /// Returns the number of mailboxes the frame was deposited in. Dead
    /// subscribers are removed after the pass.
    pub fn dispatch(&mut self, frame: &Frame) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();

        for (id, subscriber) in &self.live {
            match subscriber.send(frame.clone()) {
                Ok(delivery) => {
                    delivered += 1;
                    self.stats.record_delivered();
                    if delivery == Delivery::Replaced {
                        self.stats.record_dropped();
                    }
                }
                Err(_) => dead.push(*id),
            }
        }

        for id in dead {
            if let Some(subscriber) = self.live.remove(&id) {
                self.stats.record_subscriber_removed();
                tracing::info!(
                    subscriber = %id,
                    peer = ?subscriber.peer(),
                    subscribers = self.live.len(),
                    "Subscriber removed"
                );
            }
        }

        self.stats.set_live_subscribers(self.live.len());

        tracing::trace!(
            sequence = frame.sequence,
            size = frame.len(),
            delivered,
            "Frame dispatched"
        );

        delivered
    }

    /// Move every queued registration into the live set without waiting
    ///
    /// Returns the number of subscribers admitted.
    pub fn admit_pending(&mut self) -> usize {
        let mut admitted = 0;

        while let Ok(subscriber) = self.registrations.try_recv() {
            if self.admit(subscriber) {
                admitted += 1;
            }
        }

        self.stats.set_live_subscribers(self.live.len());
        admitted
    }

    fn admit(&mut self, subscriber: SubscriberHandle) -> bool {
        let id = subscriber.id();

        if subscriber.is_dead() {
            tracing::debug!(subscriber = %id, "Subscriber gone before admission");
            return false;
        }

        if self.live.contains_key(&id) {
            tracing::warn!(subscriber = %id, "Duplicate registration ignored");
            return false;
        }

        let peer = subscriber.peer();
        self.live.insert(id, subscriber);
        self.stats.record_subscriber_added();

        tracing::info!(
            subscriber = %id,
            peer = ?peer,
            subscribers = self.live.len(),
            "Subscriber added"
        );
        true
    }

    /// Number of live subscribers
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Whether a subscriber is in the live set
    pub fn is_live(&self, id: SubscriberId) -> bool {
        self.live.contains_key(&id)
    }

    /// IDs of all live subscribers
    pub fn live_ids(&self) -> Vec<SubscriberId> {
        self.live.keys().copied().collect()
    }

    fn shutdown(&mut self) {
        // Refuse new registrations, then kill everyone already known
        self.registrations.close();
        while let Ok(subscriber) = self.registrations.try_recv() {
            subscriber.disconnect();
        }

        let count = self.live.len();
        for (_, subscriber) in self.live.drain() {
            subscriber.disconnect();
            self.stats.record_subscriber_removed();
        }
        self.stats.set_live_subscribers(0);

        tracing::info!(disconnected = count, "Dispatcher stopped: intake closed");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::media::ImageFormat;
    use crate::relay::testing::{wait_until, FailingTransport, GatedTransport, RecordingTransport};

    struct Harness {
        dispatcher: Dispatcher,
        intake: mpsc::Sender<Frame>,
        registrations: mpsc::Sender<SubscriberHandle>,
        stats: Arc<RelayStats>,
    }

    fn harness() -> Harness {
        let (intake, intake_rx) = mpsc::channel(1);
        let (registrations, registrations_rx) = mpsc::channel(16);
        let stats = Arc::new(RelayStats::new());
        Harness {
            dispatcher: Dispatcher::new(intake_rx, registrations_rx, Arc::clone(&stats)),
            intake,
            registrations,
            stats,
        }
    }

    fn frame(sequence: u64) -> Frame {
        Frame::new(
            sequence,
            ImageFormat::Jpeg,
            Bytes::from(format!("F{sequence}")),
        )
    }

    #[tokio::test]
    async fn test_admitted_subscriber_gets_next_frame_only() {
        let mut h = harness();
        let sub = SubscriberHandle::new(SubscriberId(1), None);

        h.registrations.send(sub.clone()).await.unwrap();

        // Registered but not yet admitted: frame 0 is not delivered
        assert_eq!(h.dispatcher.dispatch(&frame(0)), 0);
        assert_eq!(h.dispatcher.admit_pending(), 1);
        assert!(h.dispatcher.is_live(SubscriberId(1)));
        assert!(sub.mailbox().is_empty());

        assert_eq!(h.dispatcher.dispatch(&frame(1)), 1);
        assert_eq!(sub.mailbox().try_recv().map(|f| f.sequence), Some(1));
    }

    #[tokio::test]
    async fn test_burst_to_idle_writer_delivers_only_last() {
        let mut h = harness();
        let sub = SubscriberHandle::new(SubscriberId(1), None);
        h.registrations.send(sub.clone()).await.unwrap();
        h.dispatcher.admit_pending();

        let transport = RecordingTransport::new();
        let writer = sub.spawn_writer(transport.clone());

        // No await between dispatches: the writer task has not run yet
        for seq in 1..=3 {
            h.dispatcher.dispatch(&frame(seq));
        }

        wait_until(|| !transport.frames().is_empty()).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.frames(), vec![Bytes::from("F3")]);

        let snapshot = h.stats.snapshot();
        assert_eq!(snapshot.frames_delivered, 3);
        assert_eq!(snapshot.frames_dropped, 2);

        sub.disconnect();
        writer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_failing_subscriber_removed_after_one_attempt() {
        let mut h = harness();
        let sub = SubscriberHandle::new(SubscriberId(7), None);
        h.registrations.send(sub.clone()).await.unwrap();
        h.dispatcher.admit_pending();

        let transport = FailingTransport::new();
        let writer = sub.spawn_writer(transport.clone());

        assert_eq!(h.dispatcher.dispatch(&frame(0)), 1);
        assert!(writer.await.unwrap().is_err());
        assert!(sub.is_dead());

        // Next pass sees the dead mailbox and drops the subscriber
        assert_eq!(h.dispatcher.dispatch(&frame(1)), 0);
        assert!(!h.dispatcher.is_live(SubscriberId(7)));
        assert_eq!(h.dispatcher.live_count(), 0);

        h.dispatcher.dispatch(&frame(2));
        assert_eq!(transport.write_attempts(), 1);
        assert_eq!(transport.close_count(), 1);
        assert!(sub.mailbox().is_empty());

        let snapshot = h.stats.snapshot();
        assert_eq!(snapshot.subscribers_added, 1);
        assert_eq!(snapshot.subscribers_removed, 1);
        assert_eq!(snapshot.live_subscribers, 0);
    }

    #[tokio::test]
    async fn test_stalled_subscriber_does_not_block_others() {
        let mut h = harness();
        let slow = SubscriberHandle::new(SubscriberId(1), None);
        let fast = SubscriberHandle::new(SubscriberId(2), None);
        h.registrations.send(slow.clone()).await.unwrap();
        h.registrations.send(fast.clone()).await.unwrap();
        assert_eq!(h.dispatcher.admit_pending(), 2);

        let stalled = GatedTransport::new();
        let recording = RecordingTransport::new();
        let slow_writer = slow.spawn_writer(stalled.clone());
        let fast_writer = fast.spawn_writer(recording.clone());

        for seq in 0..10 {
            assert_eq!(h.dispatcher.dispatch(&frame(seq)), 2);
            let expected = seq as usize + 1;
            wait_until(|| recording.frames().len() == expected).await;
        }

        // The slow writer is stuck on its first frame and holds only the newest
        assert_eq!(stalled.pending_writes(), 1);
        assert_eq!(slow.mailbox().try_recv().map(|f| f.sequence), Some(9));

        slow.disconnect();
        fast.disconnect();
        stalled.release(1);
        slow_writer.await.unwrap().unwrap();
        fast_writer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_dead_before_admission_is_skipped() {
        let mut h = harness();
        let sub = SubscriberHandle::new(SubscriberId(3), None);
        h.registrations.send(sub.clone()).await.unwrap();
        sub.disconnect();

        assert_eq!(h.dispatcher.admit_pending(), 0);
        assert_eq!(h.dispatcher.live_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_registration_admitted_once() {
        let mut h = harness();
        let sub = SubscriberHandle::new(SubscriberId(5), None);
        h.registrations.send(sub.clone()).await.unwrap();
        h.registrations.send(sub.clone()).await.unwrap();

        assert_eq!(h.dispatcher.admit_pending(), 1);
        assert_eq!(h.dispatcher.live_ids(), vec![SubscriberId(5)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registration_during_broadcast() {
        const SUBSCRIBERS: u64 = 64;
        const FRAMES: u64 = 200;

        let h = harness();
        let stats = Arc::clone(&h.stats);
        let dispatcher = tokio::spawn(h.dispatcher.run());

        let registrars: Vec<_> = (0..SUBSCRIBERS)
            .map(|i| {
                let registrations = h.registrations.clone();
                tokio::spawn(async move {
                    let sub = SubscriberHandle::new(SubscriberId(i), None);
                    registrations.send(sub.clone()).await.unwrap();
                    sub
                })
            })
            .collect();

        for seq in 0..FRAMES {
            h.intake.send(frame(seq)).await.unwrap();
        }

        // Keep the dispatcher cycling until every registration is drained
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        let mut seq = FRAMES;
        while stats.live_subscribers() < SUBSCRIBERS {
            assert!(tokio::time::Instant::now() < deadline, "registrations were lost");
            h.intake.send(frame(seq)).await.unwrap();
            seq += 1;
            tokio::task::yield_now().await;
        }

        let mut subs = Vec::new();
        for registrar in registrars {
            subs.push(registrar.await.unwrap());
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.subscribers_added, SUBSCRIBERS);
        assert_eq!(snapshot.live_subscribers, SUBSCRIBERS);
        let ids: HashSet<_> = subs.iter().map(|s| s.id()).collect();
        assert_eq!(ids.len(), SUBSCRIBERS as usize);

        // A final frame reaches every subscriber
        let last = seq;
        h.intake.send(frame(last)).await.unwrap();
        for sub in &subs {
            let received = tokio::time::timeout(Duration::from_secs(5), async {
                while let Some(frame) = sub.mailbox().recv().await {
                    if frame.sequence == last {
                        return true;
                    }
                }
                false
            })
            .await;
            assert_eq!(received.ok(), Some(true), "{} missed the final frame", sub.id());
        }

        drop(h.intake);
        dispatcher.await.unwrap();
        assert!(subs.iter().all(|s| s.is_dead()));
        assert_eq!(stats.live_subscribers(), 0);
    }
}
