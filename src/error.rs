//! Typed failures surfaced to the presentation layer.

use thiserror::Error;

use crate::core::bluetooth::types::PeripheralId;

/// Everything the session can fail with. All variants are recoverable: the
/// session returns to Scanning or Ready and keeps accepting intents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The selected identity does not resolve in the registry.
    #[error("no peripheral known with id {0}")]
    DeviceNotFound(PeripheralId),

    /// An operation is already outstanding; cancel or wait before retrying.
    #[error("session is busy with an outstanding operation")]
    SessionBusy,

    /// The adapter could not establish or keep the connection.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Discovery finished without finding a characteristic that accepts writes.
    #[error("peripheral exposes no writable characteristic")]
    NoWritableCharacteristic,

    /// A second submit arrived while a write was still in flight.
    #[error("a write is already in flight")]
    WriteInProgress,

    /// The adapter rejected or lost the write.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// The payload is empty or cannot be encoded for transmission.
    #[error("payload is empty or not encodable")]
    InvalidPayload,
}
