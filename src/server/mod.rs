//! HTTP and WebSocket front end
//!
//! Upgrades `ws_path` requests into relay subscribers and serves a static
//! directory (typically a viewer page) on every other path.

pub mod config;
pub mod connection;
pub mod listener;

pub use config::{parse_listen_addr, ServerConfig};
pub use connection::WsTransport;
pub use listener::RelayServer;
