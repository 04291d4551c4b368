//! Pipeline statistics

pub mod metrics;

pub use metrics::{RelayStats, StatsSnapshot};
