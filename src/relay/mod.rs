//! Frame fan-out to live subscribers
//!
//! The relay moves frames from one producer (the ingest loop) to any number
//! of subscribers without letting a slow subscriber hold anyone else back.
//!
//! # Architecture
//!
//! ```text
//!   stdin ──► Ingest ──► intake (cap 1) ──► Dispatcher ──┬──► Mailbox ──► writer ──► WebSocket
//!             (demux)                        owns live   ├──► Mailbox ──► writer ──► WebSocket
//!                                            set         └──► Mailbox ──► writer ──► WebSocket
//!                                              ▲
//!   connection handlers ──► registration queue ┘
//! ```
//!
//! - The intake queue is the only place backpressure flows upstream: the
//!   ingest loop waits while the dispatcher is busy.
//! - Mailboxes never block the dispatcher. A deposit replaces any frame the
//!   writer has not picked up, so each subscriber only ever catches up to the
//!   newest frame.
//! - Frames are `bytes::Bytes`: every mailbox shares the same allocation.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod hub;
pub mod ingest;
pub mod mailbox;
pub mod subscriber;

#[cfg(test)]
pub(crate) mod testing;

pub use config::RelayConfig;
pub use dispatcher::Dispatcher;
pub use error::RelayError;
pub use frame::{Frame, SubscriberId};
pub use hub::{FrameSender, Relay};
pub use ingest::{run_ingest, Ingest};
pub use mailbox::{Delivery, Mailbox, MailboxClosed};
pub use subscriber::{SubscriberHandle, Transport};
