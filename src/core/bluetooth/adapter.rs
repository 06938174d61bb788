//! The bluest-backed adapter gateway.
//!
//! Resolves identities to platform device handles, delegates scanning and
//! connection work to the scanner and the connection driver, and spawns a
//! task per request so the session never waits on the platform.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use bluest::{Adapter, Device};
use log::{error, info, warn};
use tokio::sync::mpsc;

use crate::config::SessionConfig;
use crate::core::bluetooth::connection::ConnectionDriver;
use crate::core::bluetooth::gateway::AdapterGateway;
use crate::core::bluetooth::scanner::PeripheralScanner;
use crate::core::bluetooth::types::{CharacteristicRef, PeripheralId, ServiceRef};
use crate::core::session::event::AdapterEvent;

/// Host Bluetooth stack gateway backed by bluest.
pub struct BluestGateway {
    devices: Arc<Mutex<HashMap<PeripheralId, Device>>>,
    scanner: PeripheralScanner,
    driver: ConnectionDriver,
}

impl BluestGateway {
    /// Acquires the default platform adapter and wires all event reporting to
    /// `events`. A power watcher reports once the adapter is usable.
    pub async fn new(config: &SessionConfig, events: mpsc::Sender<AdapterEvent>) -> Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;

        let devices = Arc::new(Mutex::new(HashMap::new()));
        let scanner = PeripheralScanner::new(adapter.clone(), devices.clone(), events.clone());
        let driver = ConnectionDriver::new(
            adapter.clone(),
            events.clone(),
            config.connect_max_retries,
            config.connect_retry_delay_ms,
        );
        Self::spawn_power_watch(adapter, events);

        Ok(Self {
            devices,
            scanner,
            driver,
        })
    }

    fn spawn_power_watch(adapter: Adapter, events: mpsc::Sender<AdapterEvent>) {
        tokio::spawn(async move {
            match adapter.wait_available().await {
                Ok(()) => {
                    info!("Bluetooth adapter is available.");
                    let _ = events.send(AdapterEvent::PoweredOn).await;
                }
                Err(e) => {
                    error!("Bluetooth adapter never became available: {}", e);
                    let _ = events.send(AdapterEvent::PoweredOff).await;
                }
            }
        });
    }

    fn device(&self, id: &PeripheralId) -> Result<Device> {
        self.devices
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("Device not found with ID: {}", id))
    }
}

#[async_trait::async_trait]
impl AdapterGateway for BluestGateway {
    async fn start_scan(&mut self) -> Result<()> {
        self.scanner.start().await
    }

    async fn stop_scan(&mut self) -> Result<()> {
        self.scanner.stop().await
    }

    async fn connect(&mut self, id: &PeripheralId) -> Result<()> {
        let device = self.device(id)?;
        let driver = self.driver.clone();
        let id = id.clone();
        tokio::spawn(async move { driver.connect(id, device).await });
        Ok(())
    }

    async fn disconnect(&mut self, id: &PeripheralId) -> Result<()> {
        let device = self.device(id)?;
        let driver = self.driver.clone();
        let id = id.clone();
        tokio::spawn(async move {
            if let Err(e) = driver.disconnect(id.clone(), device).await {
                warn!("Disconnect of {} failed: {}", id, e);
            }
        });
        Ok(())
    }

    async fn discover_services(&mut self, id: &PeripheralId) -> Result<()> {
        let device = self.device(id)?;
        let driver = self.driver.clone();
        let id = id.clone();
        tokio::spawn(async move { driver.discover_services(id, device).await });
        Ok(())
    }

    async fn discover_characteristics(
        &mut self,
        id: &PeripheralId,
        service: ServiceRef,
    ) -> Result<()> {
        let driver = self.driver.clone();
        let id = id.clone();
        tokio::spawn(async move { driver.discover_characteristics(id, service).await });
        Ok(())
    }

    async fn write(
        &mut self,
        id: &PeripheralId,
        characteristic: CharacteristicRef,
        payload: Vec<u8>,
    ) -> Result<()> {
        let driver = self.driver.clone();
        let id = id.clone();
        tokio::spawn(async move { driver.write(id, characteristic, payload).await });
        Ok(())
    }
}
