//! The boundary between the session machine and the host Bluetooth stack.

use anyhow::Result;

use crate::core::bluetooth::types::{CharacteristicRef, PeripheralId, ServiceRef};

/// Requests the session issues against the host Bluetooth stack.
///
/// Every call is a non-blocking request: it returns once the request is
/// accepted, and the outcome arrives later as an
/// [`AdapterEvent`](crate::core::session::event::AdapterEvent) on the
/// session's inbound channel. Implementations must never make the caller wait
/// for the platform to finish the operation.
#[async_trait::async_trait]
pub trait AdapterGateway: Send + Sync {
    /// Starts (or restarts) the advertisement scan.
    async fn start_scan(&mut self) -> Result<()>;

    /// Stops the advertisement scan.
    async fn stop_scan(&mut self) -> Result<()>;

    /// Requests a connection to a previously discovered peripheral.
    async fn connect(&mut self, id: &PeripheralId) -> Result<()>;

    /// Requests disconnection of a peripheral.
    async fn disconnect(&mut self, id: &PeripheralId) -> Result<()>;

    /// Requests service enumeration on a connected peripheral.
    async fn discover_services(&mut self, id: &PeripheralId) -> Result<()>;

    /// Requests characteristic enumeration for one discovered service.
    async fn discover_characteristics(
        &mut self,
        id: &PeripheralId,
        service: ServiceRef,
    ) -> Result<()>;

    /// Requests a responded write of `payload` to a discovered characteristic.
    async fn write(
        &mut self,
        id: &PeripheralId,
        characteristic: CharacteristicRef,
        payload: Vec<u8>,
    ) -> Result<()>;
}
