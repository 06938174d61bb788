//! Defines shared handle types for the Bluetooth module.
//!
//! The session machine never touches platform objects directly; it holds the
//! opaque handles defined here and passes them back to the adapter gateway,
//! which resolves them against its own tables.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Platform-specific unique identifier for a peripheral (especially important
/// on macOS, where the MAC address is hidden behind an opaque device ID).
///
/// Stable for a given physical device within one process run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PeripheralId(String);

impl PeripheralId {
    /// Creates an identity from the platform's device ID string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to a service enumerated on the connected peripheral.
///
/// Minted by the gateway when it reports service discovery results; the slot
/// disambiguates services that advertise the same UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceRef {
    slot: usize,
    uuid: Uuid,
}

impl ServiceRef {
    pub fn new(slot: usize, uuid: Uuid) -> Self {
        Self { slot, uuid }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.uuid, self.slot)
    }
}

/// Opaque handle to a characteristic enumerated on the connected peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicRef {
    slot: usize,
    uuid: Uuid,
}

impl CharacteristicRef {
    pub fn new(slot: usize, uuid: Uuid) -> Self {
        Self { slot, uuid }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot
    }
}

impl fmt::Display for CharacteristicRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.uuid, self.slot)
    }
}

/// Capability flags reported for a characteristic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicProps {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
    pub notify: bool,
}

/// One characteristic as reported by a discovery result, in platform order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub reference: CharacteristicRef,
    pub props: CharacteristicProps,
}
