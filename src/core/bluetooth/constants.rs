//! Constant values used by the Bluetooth plumbing.

/// Capacity of the inbound adapter event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// How often the liveness watcher polls the link after a connect, in
/// milliseconds.
pub const LINK_POLL_INTERVAL_MS: u64 = 1000;
