//! The device session: registry of discovered peripherals, the connection
//! lifecycle machine, and write sequencing.

pub mod event;
pub mod machine;
pub mod registry;
pub mod writer;

use std::sync::Arc;

use log::info;
use tokio::sync::{Mutex, mpsc};

pub use event::AdapterEvent;
pub use machine::{PeripheralSession, SessionPhase, SessionSnapshot, SessionState};
pub use registry::{PeripheralRecord, PeripheralRegistry};
pub use writer::{OutgoingPayload, WriteCoordinator};

use crate::core::bluetooth::gateway::AdapterGateway;

/// Pumps adapter events into the session, in arrival order, until the event
/// channel closes. This is the only task that feeds events to the machine.
pub async fn drive<G: AdapterGateway + 'static>(
    session: Arc<Mutex<PeripheralSession<G>>>,
    mut events: mpsc::Receiver<AdapterEvent>,
) {
    while let Some(event) = events.recv().await {
        session.lock().await.handle_event(event).await;
    }
    info!("Adapter event channel closed, session pump exiting.");
}
