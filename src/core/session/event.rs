//! Inbound adapter events.
//!
//! The platform stack reports everything through callbacks: power changes,
//! advertisements, connection outcomes, discovery results, write outcomes.
//! All of them funnel into this single tagged enum and arrive on one channel,
//! consumed by the session in arrival order.

use crate::core::bluetooth::types::{CharacteristicInfo, PeripheralId, ServiceRef};

/// One platform callback, as seen by the session machine.
#[derive(Debug, Clone)]
pub enum AdapterEvent {
    /// The host adapter is powered and ready to scan.
    PoweredOn,
    /// The host adapter powered off or became unavailable.
    PoweredOff,
    /// One advertisement. The same peripheral may be reported many times.
    Discovered {
        id: PeripheralId,
        name: Option<String>,
    },
    /// The requested connection is established.
    Connected { id: PeripheralId },
    /// The requested connection could not be established.
    ConnectFailed { id: PeripheralId, reason: String },
    /// The link to the peripheral dropped, whether requested or not.
    Disconnected { id: PeripheralId },
    /// Service enumeration results for the connected peripheral.
    ServicesDiscovered {
        id: PeripheralId,
        services: Vec<ServiceRef>,
    },
    /// Characteristic enumeration results for one service, in platform order.
    CharacteristicsDiscovered {
        id: PeripheralId,
        service: ServiceRef,
        characteristics: Vec<CharacteristicInfo>,
    },
    /// The peripheral acknowledged the in-flight write.
    WriteCompleted { id: PeripheralId },
    /// The in-flight write was rejected or lost.
    WriteFailed { id: PeripheralId, reason: String },
}
