//! Connection, discovery, and write plumbing against the platform stack.
//!
//! Every method here runs inside a gateway-spawned task and reports its
//! outcome as an adapter event; nothing returns results to the session
//! directly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use bluest::{Adapter, Characteristic, Device, Service};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::core::bluetooth::constants::LINK_POLL_INTERVAL_MS;
use crate::core::bluetooth::types::{
    CharacteristicInfo, CharacteristicProps, CharacteristicRef, PeripheralId, ServiceRef,
};
use crate::core::session::event::AdapterEvent;

/// Drives connect/discover/write requests and reports outcomes as events.
///
/// Holds the slot tables that back [`ServiceRef`] and [`CharacteristicRef`];
/// the tables belong to the active connection and are reset on each connect.
#[derive(Clone)]
pub struct ConnectionDriver {
    adapter: Adapter,
    events: mpsc::Sender<AdapterEvent>,
    services: Arc<Mutex<Vec<Service>>>,
    characteristics: Arc<Mutex<Vec<Characteristic>>>,
    max_retries: u32,
    retry_delay: Duration,
}

impl ConnectionDriver {
    pub fn new(
        adapter: Adapter,
        events: mpsc::Sender<AdapterEvent>,
        max_retries: u32,
        retry_delay_ms: u64,
    ) -> Self {
        Self {
            adapter,
            events,
            services: Arc::new(Mutex::new(Vec::new())),
            characteristics: Arc::new(Mutex::new(Vec::new())),
            max_retries: max_retries.max(1),
            retry_delay: Duration::from_millis(retry_delay_ms),
        }
    }

    /// Connects with retries, then reports `Connected` or `ConnectFailed`.
    /// A successful connect also starts the link liveness watcher.
    pub async fn connect(&self, id: PeripheralId, device: Device) {
        self.services.lock().unwrap().clear();
        self.characteristics.lock().unwrap().clear();

        let mut last_error = None;
        for attempt in 0..self.max_retries {
            if device.is_connected().await {
                break;
            }
            match self.adapter.connect_device(&device).await {
                Ok(()) => break,
                Err(e) => {
                    warn!("Connection attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                    if attempt + 1 < self.max_retries {
                        info!("Retrying connection in {:?}...", self.retry_delay);
                        sleep(self.retry_delay).await;
                    }
                }
            }
        }

        if device.is_connected().await {
            info!("Successfully connected to {}", id);
            self.spawn_liveness_watch(id.clone(), device);
            let _ = self.events.send(AdapterEvent::Connected { id }).await;
        } else {
            let reason = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| format!("gave up after {} attempts", self.max_retries));
            let _ = self
                .events
                .send(AdapterEvent::ConnectFailed { id, reason })
                .await;
        }
    }

    /// Emits `Disconnected` once the link drops, however that happens. This is
    /// the single source of disconnect events, so an explicit disconnect and a
    /// radio dropout look the same to the session.
    fn spawn_liveness_watch(&self, id: PeripheralId, device: Device) {
        let events = self.events.clone();
        tokio::spawn(async move {
            loop {
                sleep(Duration::from_millis(LINK_POLL_INTERVAL_MS)).await;
                if !device.is_connected().await {
                    info!("Peripheral {} lost its connection", id);
                    let _ = events.send(AdapterEvent::Disconnected { id }).await;
                    break;
                }
            }
        });
    }

    /// Enumerates services, parks them in the slot table, and reports them.
    pub async fn discover_services(&self, id: PeripheralId, device: Device) {
        match device.services().await {
            Ok(found) => {
                let refs: Vec<ServiceRef> = found
                    .iter()
                    .enumerate()
                    .map(|(slot, service)| ServiceRef::new(slot, service.uuid()))
                    .collect();
                *self.services.lock().unwrap() = found;
                let _ = self
                    .events
                    .send(AdapterEvent::ServicesDiscovered { id, services: refs })
                    .await;
            }
            Err(e) => {
                warn!("Service discovery on {} failed: {}", id, e);
                let _ = self
                    .events
                    .send(AdapterEvent::ConnectFailed {
                        id,
                        reason: e.to_string(),
                    })
                    .await;
            }
        }
    }

    /// Enumerates the characteristics of one service with their capability
    /// flags, in the order the platform reports them.
    pub async fn discover_characteristics(&self, id: PeripheralId, service_ref: ServiceRef) {
        let service = self.services.lock().unwrap().get(service_ref.slot()).cloned();
        let Some(service) = service else {
            warn!("Unknown service reference {} on {}", service_ref, id);
            return;
        };

        match service.characteristics().await {
            Ok(found) => {
                let mut discovered = Vec::with_capacity(found.len());
                for characteristic in found {
                    match characteristic.properties().await {
                        Ok(props) => discovered.push((characteristic, props)),
                        Err(e) => {
                            debug!(
                                "Skipping characteristic {} on {}: {}",
                                characteristic.uuid(),
                                id,
                                e
                            );
                        }
                    }
                }

                let infos = {
                    let mut table = self.characteristics.lock().unwrap();
                    discovered
                        .into_iter()
                        .map(|(characteristic, props)| {
                            let reference =
                                CharacteristicRef::new(table.len(), characteristic.uuid());
                            table.push(characteristic);
                            CharacteristicInfo {
                                reference,
                                props: CharacteristicProps {
                                    read: props.read,
                                    write: props.write,
                                    write_without_response: props.write_without_response,
                                    notify: props.notify,
                                },
                            }
                        })
                        .collect()
                };

                let _ = self
                    .events
                    .send(AdapterEvent::CharacteristicsDiscovered {
                        id,
                        service: service_ref,
                        characteristics: infos,
                    })
                    .await;
            }
            Err(e) => {
                warn!("Characteristic discovery on {} failed: {}", id, e);
                let _ = self
                    .events
                    .send(AdapterEvent::ConnectFailed {
                        id,
                        reason: e.to_string(),
                    })
                    .await;
            }
        }
    }

    /// Performs a responded write and reports the outcome.
    pub async fn write(&self, id: PeripheralId, char_ref: CharacteristicRef, payload: Vec<u8>) {
        let characteristic = self
            .characteristics
            .lock()
            .unwrap()
            .get(char_ref.slot())
            .cloned();
        let Some(characteristic) = characteristic else {
            let _ = self
                .events
                .send(AdapterEvent::WriteFailed {
                    id,
                    reason: format!("unknown characteristic reference {}", char_ref),
                })
                .await;
            return;
        };

        debug!("Writing {} bytes to {} on {}", payload.len(), char_ref, id);
        match characteristic.write(&payload).await {
            Ok(()) => {
                let _ = self.events.send(AdapterEvent::WriteCompleted { id }).await;
            }
            Err(e) => {
                let _ = self
                    .events
                    .send(AdapterEvent::WriteFailed {
                        id,
                        reason: e.to_string(),
                    })
                    .await;
            }
        }
    }

    /// Disconnects the device if it is still connected. The liveness watcher
    /// reports the resulting state change.
    pub async fn disconnect(&self, id: PeripheralId, device: Device) -> Result<()> {
        if device.is_connected().await {
            info!("Disconnecting from peripheral {}", id);
            self.adapter.disconnect_device(&device).await?;
        } else {
            info!("Peripheral {} not connected", id);
        }
        Ok(())
    }
}
