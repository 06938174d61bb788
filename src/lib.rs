//! BLE payload courier library
//! Scans for nearby peripherals, keeps a deduplicated registry of what it
//! finds, connects to a selected peripheral, and writes short text payloads
//! to the first writable characteristic it discovers.

// Module declarations
pub mod config;
pub mod core;
pub mod error;

// Re-export the public surface
pub use config::SessionConfig;
pub use crate::core::bluetooth::{
    AdapterGateway, BluestGateway, CharacteristicInfo, CharacteristicProps, CharacteristicRef,
    PeripheralId, ServiceRef,
};
pub use crate::core::session::{
    AdapterEvent, OutgoingPayload, PeripheralRecord, PeripheralRegistry, PeripheralSession,
    SessionPhase, SessionSnapshot, SessionState, WriteCoordinator, drive,
};
pub use error::SessionError;
