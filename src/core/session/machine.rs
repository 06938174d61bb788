//! Session lifecycle for a single peripheral connection.
//!
//! One machine owns the registry, the session state, and the gateway it
//! drives. All mutation happens on the event path: adapter events pumped from
//! the inbound channel, or user intents forwarded by the presentation layer.
//! Gateway calls only issue requests; their outcomes come back as events.

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::SessionConfig;
use crate::core::bluetooth::gateway::AdapterGateway;
use crate::core::bluetooth::types::{CharacteristicRef, PeripheralId};
use crate::core::session::event::AdapterEvent;
use crate::core::session::registry::{PeripheralRecord, PeripheralRegistry};
use crate::core::session::writer::{OutgoingPayload, WriteCoordinator};
use crate::error::SessionError;

/// Lifecycle of the active connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Adapter not powered, or no scan running.
    Idle,
    /// Discovering peripherals; selection is allowed.
    Scanning,
    /// A connection request is outstanding for `target`.
    Connecting { target: PeripheralId },
    /// Connected; services and characteristics are being enumerated.
    /// `outstanding` counts service probes whose results have not arrived.
    Discovering {
        target: PeripheralId,
        outstanding: usize,
    },
    /// A writable characteristic is selected; payloads may be submitted.
    Ready {
        target: PeripheralId,
        writable: CharacteristicRef,
    },
    /// A write is in flight.
    Sending {
        target: PeripheralId,
        writable: CharacteristicRef,
    },
    /// The last session attempt failed; selection is allowed again.
    Failed { reason: SessionError },
}

/// Read-only projection of the session for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub target: Option<PeripheralId>,
    pub last_fault: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Scanning,
    Connecting,
    Discovering,
    Ready,
    Sending,
    Failed,
}

/// Manages the connect-scan-discover-write flow against one adapter gateway.
pub struct PeripheralSession<G: AdapterGateway> {
    gateway: G,
    config: SessionConfig,
    registry: PeripheralRegistry,
    state: SessionState,
    writer: WriteCoordinator,
    last_fault: Option<SessionError>,
    powered: bool,
}

impl<G: AdapterGateway> PeripheralSession<G> {
    pub fn new(gateway: G, config: SessionConfig) -> Self {
        Self {
            gateway,
            config,
            registry: PeripheralRegistry::new(),
            state: SessionState::Idle,
            writer: WriteCoordinator::new(),
            last_fault: None,
            powered: false,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn registry(&self) -> &PeripheralRegistry {
        &self.registry
    }

    /// The most recent fault, kept for observability after the state moved on.
    pub fn last_fault(&self) -> Option<&SessionError> {
        self.last_fault.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            target: self.active_target().cloned(),
            last_fault: self.last_fault.as_ref().map(|fault| fault.to_string()),
        }
    }

    /// Discovered peripherals in arrival order, cloned for the caller.
    pub fn peripherals(&self) -> Vec<PeripheralRecord> {
        self.registry.iter().cloned().collect()
    }

    /// User intent: connect to a previously discovered peripheral.
    ///
    /// Only valid while Scanning (or after a failure). A selection while a
    /// connection attempt or session is outstanding is rejected; callers must
    /// disconnect first.
    pub async fn select_device(&mut self, id: &PeripheralId) -> Result<(), SessionError> {
        match self.state {
            SessionState::Scanning | SessionState::Failed { .. } => {}
            _ => return Err(SessionError::SessionBusy),
        }

        let record = self
            .registry
            .lookup(id)
            .ok_or_else(|| SessionError::DeviceNotFound(id.clone()))?;
        info!("Connecting to {} ({})", record.name, record.id);

        self.gateway.connect(id).await.map_err(|e| {
            let fault = SessionError::ConnectionFailed(e.to_string());
            self.last_fault = Some(fault.clone());
            fault
        })?;

        if self.config.stop_scan_on_connect {
            if let Err(e) = self.gateway.stop_scan().await {
                warn!("Failed to stop scanning: {}", e);
            }
        }

        self.state = SessionState::Connecting { target: id.clone() };
        Ok(())
    }

    /// User intent: send a text payload to the connected peripheral.
    ///
    /// The payload is validated before any state or adapter interaction, and
    /// at most one write is in flight; its completion event releases the slot.
    pub async fn submit_payload(&mut self, text: &str) -> Result<(), SessionError> {
        let payload = OutgoingPayload::encode(text)?;

        let (target, writable) = match &self.state {
            SessionState::Ready { target, writable } => (target.clone(), *writable),
            SessionState::Sending { .. } => return Err(SessionError::WriteInProgress),
            _ => return Err(SessionError::SessionBusy),
        };

        self.writer.begin()?;
        if let Err(e) = self
            .gateway
            .write(&target, writable, payload.into_bytes())
            .await
        {
            self.writer.finish();
            let fault = SessionError::WriteFailed(e.to_string());
            self.last_fault = Some(fault.clone());
            return Err(fault);
        }

        self.state = SessionState::Sending { target, writable };
        Ok(())
    }

    /// User intent: drop the active connection. The session moves to Idle
    /// once the adapter reports the disconnect.
    pub async fn disconnect(&mut self) -> Result<(), SessionError> {
        let target = self
            .active_target()
            .cloned()
            .ok_or(SessionError::SessionBusy)?;
        self.gateway
            .disconnect(&target)
            .await
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))
    }

    /// User intent: restart scanning after the session returned to Idle with
    /// the adapter still powered.
    pub async fn resume_scan(&mut self) -> Result<(), SessionError> {
        if !matches!(self.state, SessionState::Idle) || !self.powered {
            return Err(SessionError::SessionBusy);
        }
        self.begin_scanning().await
    }

    /// Feeds one adapter event through the machine.
    ///
    /// Events that reference a peripheral other than the current target, or
    /// that are not expected in the current state, are discarded. Faults are
    /// recorded and logged; none of them abort the session.
    pub async fn handle_event(&mut self, event: AdapterEvent) {
        match event {
            AdapterEvent::PoweredOn => {
                self.powered = true;
                if matches!(self.state, SessionState::Idle) {
                    if let Err(e) = self.begin_scanning().await {
                        warn!("Failed to start scanning: {}", e);
                    }
                }
            }
            AdapterEvent::PoweredOff => {
                info!("Adapter powered off");
                self.powered = false;
                self.writer.finish();
                self.state = SessionState::Idle;
            }
            AdapterEvent::Discovered { id, name } => {
                if self.registry.record(id.clone(), name.as_deref()) {
                    debug!("Discovered peripheral {}", id);
                }
            }
            AdapterEvent::Connected { id } => {
                if !matches!(&self.state, SessionState::Connecting { target } if *target == id) {
                    self.discard("connected", &id);
                    return;
                }
                info!("Connected to {}, discovering services", id);
                if let Err(e) = self.gateway.discover_services(&id).await {
                    self.revert_to_scanning(SessionError::ConnectionFailed(e.to_string()))
                        .await;
                    return;
                }
                self.state = SessionState::Discovering {
                    target: id,
                    outstanding: 0,
                };
            }
            AdapterEvent::ConnectFailed { id, reason } => {
                let relevant = matches!(
                    &self.state,
                    SessionState::Connecting { target }
                    | SessionState::Discovering { target, .. } if *target == id
                );
                if !relevant {
                    self.discard("connect-failed", &id);
                    return;
                }
                warn!("Connection to {} failed: {}", id, reason);
                self.revert_to_scanning(SessionError::ConnectionFailed(reason))
                    .await;
            }
            AdapterEvent::Disconnected { id } => {
                let relevant = self.active_target() == Some(&id)
                    || matches!(self.state, SessionState::Failed { .. });
                if !relevant {
                    self.discard("disconnected", &id);
                    return;
                }
                info!("Peripheral {} disconnected", id);
                self.writer.finish();
                self.state = SessionState::Idle;
            }
            AdapterEvent::ServicesDiscovered { id, services } => {
                let outstanding = match &self.state {
                    SessionState::Discovering { target, outstanding } if *target == id => {
                        *outstanding
                    }
                    _ => {
                        self.discard("services", &id);
                        return;
                    }
                };
                if services.is_empty() && outstanding == 0 {
                    warn!("Peripheral {} reported no services", id);
                    self.fail_discovery(id).await;
                    return;
                }
                for service in &services {
                    debug!("Probing service {} on {}", service, id);
                    if let Err(e) = self.gateway.discover_characteristics(&id, *service).await {
                        self.revert_to_scanning(SessionError::ConnectionFailed(e.to_string()))
                            .await;
                        return;
                    }
                }
                self.state = SessionState::Discovering {
                    target: id,
                    outstanding: outstanding + services.len(),
                };
            }
            AdapterEvent::CharacteristicsDiscovered {
                id,
                service,
                characteristics,
            } => {
                let outstanding = match &self.state {
                    SessionState::Discovering { target, outstanding } if *target == id => {
                        *outstanding
                    }
                    _ => {
                        self.discard("characteristics", &id);
                        return;
                    }
                };

                // First writable wins, in the order the platform reported.
                if let Some(writable) = characteristics.iter().find(|c| c.props.write) {
                    info!(
                        "Selected writable characteristic {} on {}",
                        writable.reference, id
                    );
                    self.last_fault = None;
                    self.state = SessionState::Ready {
                        target: id,
                        writable: writable.reference,
                    };
                    return;
                }

                debug!("Service {} has no writable characteristic", service);
                let outstanding = outstanding.saturating_sub(1);
                if outstanding == 0 {
                    warn!("Peripheral {} exposes no writable characteristic", id);
                    self.fail_discovery(id).await;
                } else {
                    self.state = SessionState::Discovering {
                        target: id,
                        outstanding,
                    };
                }
            }
            AdapterEvent::WriteCompleted { id } => {
                let writable = match &self.state {
                    SessionState::Sending { target, writable } if *target == id => *writable,
                    _ => {
                        self.discard("write-completed", &id);
                        return;
                    }
                };
                debug!("Write acknowledged by {}", id);
                self.writer.finish();
                self.state = SessionState::Ready {
                    target: id,
                    writable,
                };
            }
            AdapterEvent::WriteFailed { id, reason } => {
                let writable = match &self.state {
                    SessionState::Sending { target, writable } if *target == id => *writable,
                    _ => {
                        self.discard("write-failed", &id);
                        return;
                    }
                };
                // Not fatal: the session stays usable for another attempt.
                warn!("Write to {} failed: {}", id, reason);
                self.writer.finish();
                self.last_fault = Some(SessionError::WriteFailed(reason));
                self.state = SessionState::Ready {
                    target: id,
                    writable,
                };
            }
        }
    }

    fn phase(&self) -> SessionPhase {
        match self.state {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Scanning => SessionPhase::Scanning,
            SessionState::Connecting { .. } => SessionPhase::Connecting,
            SessionState::Discovering { .. } => SessionPhase::Discovering,
            SessionState::Ready { .. } => SessionPhase::Ready,
            SessionState::Sending { .. } => SessionPhase::Sending,
            SessionState::Failed { .. } => SessionPhase::Failed,
        }
    }

    fn active_target(&self) -> Option<&PeripheralId> {
        match &self.state {
            SessionState::Connecting { target }
            | SessionState::Discovering { target, .. }
            | SessionState::Ready { target, .. }
            | SessionState::Sending { target, .. } => Some(target),
            _ => None,
        }
    }

    async fn begin_scanning(&mut self) -> Result<(), SessionError> {
        if self.config.clear_registry_on_scan {
            self.registry.clear();
        }
        self.gateway
            .start_scan()
            .await
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;
        self.state = SessionState::Scanning;
        Ok(())
    }

    /// Discovery exhausted every service without a writable characteristic.
    /// The link is useless to this session, so it is released.
    async fn fail_discovery(&mut self, target: PeripheralId) {
        self.writer.finish();
        self.last_fault = Some(SessionError::NoWritableCharacteristic);
        if let Err(e) = self.gateway.disconnect(&target).await {
            warn!("Failed to release {}: {}", target, e);
        }
        self.state = SessionState::Failed {
            reason: SessionError::NoWritableCharacteristic,
        };
    }

    /// Records the fault and reverts to Scanning so the user can re-select.
    async fn revert_to_scanning(&mut self, fault: SessionError) {
        self.writer.finish();
        self.last_fault = Some(fault);
        self.state = SessionState::Scanning;
        if self.config.stop_scan_on_connect {
            if let Err(e) = self.gateway.start_scan().await {
                warn!("Failed to resume scanning: {}", e);
            }
        }
    }

    fn discard(&self, kind: &str, id: &PeripheralId) {
        debug!(
            "Discarding stale {} event for {} in state {:?}",
            kind, id, self.state
        );
    }
}
