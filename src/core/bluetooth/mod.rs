//! Platform Bluetooth plumbing for the session core.
//! This module holds the gateway boundary the session drives, the opaque
//! handle types passed across it, and the bluest-backed implementation.

pub mod adapter;
pub mod connection;
pub mod constants;
pub mod gateway;
pub mod scanner;
pub mod types;

// Re-export types that should be publicly accessible
pub use adapter::BluestGateway;
pub use connection::ConnectionDriver;
pub use constants::*; // Re-export all constants
pub use gateway::AdapterGateway;
pub use scanner::PeripheralScanner;
pub use types::{
    CharacteristicInfo, CharacteristicProps, CharacteristicRef, PeripheralId, ServiceRef,
};
