//! frame-relay: live image-stream relay
//!
//! Splits a continuous stream of concatenated JPEG or PNG images (for
//! example `ffmpeg -f image2pipe` output on stdin) into whole frames and
//! broadcasts each frame to every connected WebSocket viewer. Slow viewers
//! never hold back fast ones: each viewer has a one-frame mailbox that always
//! holds the newest frame it has not sent yet.
//!
//! # Example
//!
//! ```no_run
//! use frame_relay::{run_ingest, ImageFormat, Relay, RelayConfig, RelayServer, ServerConfig};
//! use tokio::io::BufReader;
//!
//! #[tokio::main]
//! async fn main() -> frame_relay::Result<()> {
//!     let relay_config = RelayConfig::with_format(ImageFormat::Jpeg);
//!     let (relay, dispatcher, intake) = Relay::new(relay_config.clone())?;
//!     let stats = relay.stats().clone();
//!
//!     tokio::spawn(dispatcher.run());
//!     tokio::spawn(async move {
//!         let stdin = BufReader::new(tokio::io::stdin());
//!         run_ingest(stdin, &relay_config, intake, stats).await
//!     });
//!
//!     RelayServer::new(ServerConfig::default(), relay).run().await
//! }
//! ```

pub mod error;
pub mod media;
pub mod relay;
pub mod server;
pub mod stats;

pub use error::{ConfigError, DemuxError, Error, Result};
pub use media::{Demuxer, ImageFormat};
pub use relay::{run_ingest, Frame, Relay, RelayConfig, SubscriberHandle, Transport};
pub use server::{RelayServer, ServerConfig};
pub use stats::{RelayStats, StatsSnapshot};
