//! Advertisement scanning against the platform adapter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use bluest::{Adapter, Device};
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::types::PeripheralId;
use crate::core::session::event::AdapterEvent;

/// Runs the scan task and reports every advertisement as a discovery event.
///
/// Discovered platform device handles are parked in the shared table so the
/// gateway can resolve identities back to devices on connect.
pub struct PeripheralScanner {
    adapter: Adapter,
    devices: Arc<Mutex<HashMap<PeripheralId, Device>>>,
    events: mpsc::Sender<AdapterEvent>,
    cancel_token: CancellationToken,
    scan_task_handle: Option<JoinHandle<Result<()>>>,
}

impl PeripheralScanner {
    pub fn new(
        adapter: Adapter,
        devices: Arc<Mutex<HashMap<PeripheralId, Device>>>,
        events: mpsc::Sender<AdapterEvent>,
    ) -> Self {
        Self {
            adapter,
            devices,
            events,
            cancel_token: CancellationToken::new(),
            scan_task_handle: None,
        }
    }

    /// Starts the scan task; an already running scan is stopped first.
    pub async fn start(&mut self) -> Result<()> {
        if self.scan_task_handle.is_some() {
            self.stop().await?;
        }

        self.cancel_token = CancellationToken::new();
        let cancel_token_for_task = self.cancel_token.clone();
        let adapter_for_task = self.adapter.clone();
        let devices_for_task = self.devices.clone();
        let events_for_task = self.events.clone();

        let handle = tokio::spawn(async move {
            Self::scan_task(
                adapter_for_task,
                devices_for_task,
                events_for_task,
                cancel_token_for_task,
            )
            .await
        });

        self.scan_task_handle = Some(handle);
        info!("Peripheral scan task started.");
        Ok(())
    }

    async fn scan_task(
        adapter: Adapter,
        devices: Arc<Mutex<HashMap<PeripheralId, Device>>>,
        events: mpsc::Sender<AdapterEvent>,
        cancel_token: CancellationToken,
    ) -> Result<()> {
        info!("Starting bluetooth scan");
        let mut scan_stream = adapter.scan(&[]).await?;

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered) => {
                            let device = discovered.device;
                            let id = PeripheralId::new(device.id().to_string());
                            let name = device.name().ok();
                            debug!("Advertisement from {} (RSSI: {:?})", id, discovered.rssi);

                            devices.lock().unwrap().insert(id.clone(), device);
                            if events.send(AdapterEvent::Discovered { id, name }).await.is_err() {
                                // Session is gone; nothing left to report to.
                                break;
                            }
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Cancels the scan task and waits for it to wind down.
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping Bluetooth scan.");
        self.cancel_token.cancel();

        if let Some(handle) = self.scan_task_handle.take() {
            match handle.await {
                Ok(task_result) => match task_result {
                    Ok(_) => info!("Scan task finished after cancellation."),
                    Err(e) => error!("Scan task finished with an error: {:?}", e),
                },
                Err(e) => {
                    if e.is_cancelled() {
                        info!("Scan task was cancelled.");
                    } else {
                        error!("Scan task finished with an unexpected join error: {:?}", e);
                    }
                }
            }
        }
        Ok(())
    }
}
