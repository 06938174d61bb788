//! Integration tests driving the session machine through a scripted gateway.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use ble_courier::{
    AdapterEvent, AdapterGateway, CharacteristicInfo, CharacteristicProps, CharacteristicRef,
    PeripheralId, PeripheralSession, ServiceRef, SessionConfig, SessionError, SessionState,
};

/// What the machine asked the adapter to do.
#[derive(Debug, Clone, PartialEq)]
enum Request {
    StartScan,
    StopScan,
    Connect(PeripheralId),
    Disconnect(PeripheralId),
    DiscoverServices(PeripheralId),
    DiscoverCharacteristics(PeripheralId, ServiceRef),
    Write(PeripheralId, CharacteristicRef, Vec<u8>),
}

/// Gateway double that records requests and never completes them on its own;
/// tests feed the completion events by hand.
#[derive(Clone, Default)]
struct RecordingGateway {
    requests: Arc<Mutex<Vec<Request>>>,
}

impl RecordingGateway {
    fn push(&self, request: Request) -> anyhow::Result<()> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.requests.lock().unwrap().clear();
    }
}

#[async_trait]
impl AdapterGateway for RecordingGateway {
    async fn start_scan(&mut self) -> anyhow::Result<()> {
        self.push(Request::StartScan)
    }

    async fn stop_scan(&mut self) -> anyhow::Result<()> {
        self.push(Request::StopScan)
    }

    async fn connect(&mut self, id: &PeripheralId) -> anyhow::Result<()> {
        self.push(Request::Connect(id.clone()))
    }

    async fn disconnect(&mut self, id: &PeripheralId) -> anyhow::Result<()> {
        self.push(Request::Disconnect(id.clone()))
    }

    async fn discover_services(&mut self, id: &PeripheralId) -> anyhow::Result<()> {
        self.push(Request::DiscoverServices(id.clone()))
    }

    async fn discover_characteristics(
        &mut self,
        id: &PeripheralId,
        service: ServiceRef,
    ) -> anyhow::Result<()> {
        self.push(Request::DiscoverCharacteristics(id.clone(), service))
    }

    async fn write(
        &mut self,
        id: &PeripheralId,
        characteristic: CharacteristicRef,
        payload: Vec<u8>,
    ) -> anyhow::Result<()> {
        self.push(Request::Write(id.clone(), characteristic, payload))
    }
}

fn pid(raw: &str) -> PeripheralId {
    PeripheralId::new(raw)
}

fn svc(slot: usize) -> ServiceRef {
    ServiceRef::new(slot, Uuid::from_u128(0x1800 + slot as u128))
}

fn chr(slot: usize, write: bool) -> CharacteristicInfo {
    CharacteristicInfo {
        reference: CharacteristicRef::new(slot, Uuid::from_u128(0x2a00 + slot as u128)),
        props: CharacteristicProps {
            read: true,
            write,
            write_without_response: false,
            notify: false,
        },
    }
}

fn discovered(id: &str, name: &str) -> AdapterEvent {
    AdapterEvent::Discovered {
        id: pid(id),
        name: Some(name.to_string()),
    }
}

fn session_with_config(
    config: SessionConfig,
) -> (PeripheralSession<RecordingGateway>, RecordingGateway) {
    let gateway = RecordingGateway::default();
    (
        PeripheralSession::new(gateway.clone(), config),
        gateway,
    )
}

/// Powers on, discovers "widget-1", and takes it all the way to Ready with a
/// writable characteristic in slot 1 (slot 0 is read-only).
async fn ready_session() -> (
    PeripheralSession<RecordingGateway>,
    RecordingGateway,
    PeripheralId,
) {
    let (mut session, gateway) = session_with_config(SessionConfig::default());
    let id = pid("widget-1");

    session.handle_event(AdapterEvent::PoweredOn).await;
    session.handle_event(discovered("widget-1", "Widget")).await;
    session.select_device(&id).await.unwrap();
    session
        .handle_event(AdapterEvent::Connected { id: id.clone() })
        .await;
    session
        .handle_event(AdapterEvent::ServicesDiscovered {
            id: id.clone(),
            services: vec![svc(0)],
        })
        .await;
    session
        .handle_event(AdapterEvent::CharacteristicsDiscovered {
            id: id.clone(),
            service: svc(0),
            characteristics: vec![chr(0, false), chr(1, true)],
        })
        .await;

    assert!(matches!(session.state(), SessionState::Ready { .. }));
    gateway.clear();
    (session, gateway, id)
}

#[tokio::test]
async fn power_on_starts_scanning() {
    let (mut session, gateway) = session_with_config(SessionConfig::default());

    session.handle_event(AdapterEvent::PoweredOn).await;

    assert_eq!(*session.state(), SessionState::Scanning);
    assert_eq!(gateway.requests(), [Request::StartScan]);
}

#[tokio::test]
async fn duplicate_discoveries_register_once() {
    let (mut session, _gateway) = session_with_config(SessionConfig::default());
    session.handle_event(AdapterEvent::PoweredOn).await;

    session.handle_event(discovered("1", "Widget")).await;
    session.handle_event(discovered("1", "Widget")).await;

    let peripherals = session.peripherals();
    assert_eq!(peripherals.len(), 1);
    assert_eq!(peripherals[0].id, pid("1"));
    assert_eq!(peripherals[0].name, "Widget");
}

#[tokio::test]
async fn unnamed_advertisements_are_ignored() {
    let (mut session, _gateway) = session_with_config(SessionConfig::default());
    session.handle_event(AdapterEvent::PoweredOn).await;

    session
        .handle_event(AdapterEvent::Discovered {
            id: pid("1"),
            name: None,
        })
        .await;
    session.handle_event(discovered("2", "")).await;

    assert!(session.peripherals().is_empty());
}

#[tokio::test]
async fn listing_order_matches_arrival_order() {
    let (mut session, _gateway) = session_with_config(SessionConfig::default());
    session.handle_event(AdapterEvent::PoweredOn).await;

    session.handle_event(discovered("b", "Second")).await;
    session.handle_event(discovered("a", "First")).await;
    session.handle_event(discovered("c", "Third")).await;

    let names: Vec<_> = session.peripherals().into_iter().map(|r| r.name).collect();
    assert_eq!(names, ["Second", "First", "Third"]);
}

#[tokio::test]
async fn selecting_unknown_identity_fails_and_keeps_scanning() {
    let (mut session, gateway) = session_with_config(SessionConfig::default());
    session.handle_event(AdapterEvent::PoweredOn).await;
    gateway.clear();

    let result = session.select_device(&pid("1")).await;

    assert_eq!(result.unwrap_err(), SessionError::DeviceNotFound(pid("1")));
    assert_eq!(*session.state(), SessionState::Scanning);
    assert!(gateway.requests().is_empty());
}

#[tokio::test]
async fn selection_while_connecting_is_rejected() {
    let (mut session, _gateway) = session_with_config(SessionConfig::default());
    session.handle_event(AdapterEvent::PoweredOn).await;
    session.handle_event(discovered("1", "Widget")).await;
    session.handle_event(discovered("2", "Gadget")).await;

    session.select_device(&pid("1")).await.unwrap();

    let result = session.select_device(&pid("2")).await;
    assert_eq!(result.unwrap_err(), SessionError::SessionBusy);
    assert_eq!(
        *session.state(),
        SessionState::Connecting { target: pid("1") }
    );
}

#[tokio::test]
async fn connect_drives_service_and_characteristic_discovery() {
    let (mut session, gateway) = session_with_config(SessionConfig::default());
    let id = pid("1");
    session.handle_event(AdapterEvent::PoweredOn).await;
    session.handle_event(discovered("1", "Widget")).await;
    session.select_device(&id).await.unwrap();
    gateway.clear();

    session
        .handle_event(AdapterEvent::Connected { id: id.clone() })
        .await;
    assert_eq!(gateway.requests(), [Request::DiscoverServices(id.clone())]);
    gateway.clear();

    session
        .handle_event(AdapterEvent::ServicesDiscovered {
            id: id.clone(),
            services: vec![svc(0), svc(1)],
        })
        .await;
    assert_eq!(
        gateway.requests(),
        [
            Request::DiscoverCharacteristics(id.clone(), svc(0)),
            Request::DiscoverCharacteristics(id.clone(), svc(1)),
        ]
    );
}

#[tokio::test]
async fn first_writable_characteristic_wins() {
    let (session, _gateway, id) = ready_session().await;

    // Slot 0 was read-only; the session must have picked slot 1.
    match session.state() {
        SessionState::Ready { target, writable } => {
            assert_eq!(*target, id);
            assert_eq!(*writable, chr(1, true).reference);
        }
        state => panic!("expected Ready, got {:?}", state),
    }
}

#[tokio::test]
async fn empty_service_set_fails_instead_of_hanging() {
    let (mut session, gateway) = session_with_config(SessionConfig::default());
    let id = pid("1");
    session.handle_event(AdapterEvent::PoweredOn).await;
    session.handle_event(discovered("1", "Widget")).await;
    session.select_device(&id).await.unwrap();
    session
        .handle_event(AdapterEvent::Connected { id: id.clone() })
        .await;
    gateway.clear();

    session
        .handle_event(AdapterEvent::ServicesDiscovered {
            id: id.clone(),
            services: vec![],
        })
        .await;

    assert_eq!(
        *session.state(),
        SessionState::Failed {
            reason: SessionError::NoWritableCharacteristic
        }
    );
    // The useless link is released.
    assert_eq!(gateway.requests(), [Request::Disconnect(id)]);
}

#[tokio::test]
async fn exhausted_discovery_without_writable_characteristic_fails() {
    let (mut session, _gateway) = session_with_config(SessionConfig::default());
    let id = pid("1");
    session.handle_event(AdapterEvent::PoweredOn).await;
    session.handle_event(discovered("1", "Widget")).await;
    session.select_device(&id).await.unwrap();
    session
        .handle_event(AdapterEvent::Connected { id: id.clone() })
        .await;
    session
        .handle_event(AdapterEvent::ServicesDiscovered {
            id: id.clone(),
            services: vec![svc(0), svc(1)],
        })
        .await;

    session
        .handle_event(AdapterEvent::CharacteristicsDiscovered {
            id: id.clone(),
            service: svc(0),
            characteristics: vec![chr(0, false)],
        })
        .await;
    assert!(matches!(session.state(), SessionState::Discovering { .. }));

    session
        .handle_event(AdapterEvent::CharacteristicsDiscovered {
            id: id.clone(),
            service: svc(1),
            characteristics: vec![chr(1, false)],
        })
        .await;
    assert_eq!(
        *session.state(),
        SessionState::Failed {
            reason: SessionError::NoWritableCharacteristic
        }
    );
}

#[tokio::test]
async fn second_submit_while_sending_is_rejected() {
    let (mut session, gateway, id) = ready_session().await;

    session.submit_payload("abc").await.unwrap();
    assert!(matches!(session.state(), SessionState::Sending { .. }));
    assert_eq!(
        gateway.requests(),
        [Request::Write(
            id,
            chr(1, true).reference,
            b"abc".to_vec()
        )]
    );

    let result = session.submit_payload("def").await;
    assert_eq!(result.unwrap_err(), SessionError::WriteInProgress);
}

#[tokio::test]
async fn completed_write_returns_to_ready() {
    let (mut session, _gateway, id) = ready_session().await;

    session.submit_payload("42").await.unwrap();
    session
        .handle_event(AdapterEvent::WriteCompleted { id: id.clone() })
        .await;

    assert!(matches!(session.state(), SessionState::Ready { .. }));

    // The session is immediately usable for the next write.
    session.submit_payload("43").await.unwrap();
}

#[tokio::test]
async fn empty_payload_is_rejected_without_contacting_the_adapter() {
    let (mut session, gateway, _id) = ready_session().await;

    let result = session.submit_payload("").await;

    assert_eq!(result.unwrap_err(), SessionError::InvalidPayload);
    assert!(gateway.requests().is_empty());
    assert!(matches!(session.state(), SessionState::Ready { .. }));
}

#[tokio::test]
async fn failed_write_returns_to_ready_and_records_the_fault() {
    let (mut session, _gateway, id) = ready_session().await;

    session.submit_payload("abc").await.unwrap();
    session
        .handle_event(AdapterEvent::WriteFailed {
            id: id.clone(),
            reason: "peer rejected".into(),
        })
        .await;

    assert!(matches!(session.state(), SessionState::Ready { .. }));
    assert_eq!(
        session.last_fault(),
        Some(&SessionError::WriteFailed("peer rejected".into()))
    );

    // Not fatal: another submit goes through.
    session.submit_payload("again").await.unwrap();
}

#[tokio::test]
async fn connection_failure_reverts_to_scanning() {
    let (mut session, _gateway) = session_with_config(SessionConfig::default());
    let id = pid("1");
    session.handle_event(AdapterEvent::PoweredOn).await;
    session.handle_event(discovered("1", "Widget")).await;
    session.select_device(&id).await.unwrap();

    session
        .handle_event(AdapterEvent::ConnectFailed {
            id: id.clone(),
            reason: "timed out".into(),
        })
        .await;

    assert_eq!(*session.state(), SessionState::Scanning);
    assert_eq!(
        session.last_fault(),
        Some(&SessionError::ConnectionFailed("timed out".into()))
    );

    // Re-selection is allowed after the failure.
    session.select_device(&id).await.unwrap();
}

#[tokio::test]
async fn disconnect_returns_to_idle_and_keeps_the_registry() {
    let (mut session, _gateway, id) = ready_session().await;

    session
        .handle_event(AdapterEvent::Disconnected { id: id.clone() })
        .await;

    assert_eq!(*session.state(), SessionState::Idle);
    assert_eq!(session.peripherals().len(), 1);
}

#[tokio::test]
async fn stale_events_after_disconnect_are_discarded() {
    let (mut session, gateway, id) = ready_session().await;

    session
        .handle_event(AdapterEvent::Disconnected { id: id.clone() })
        .await;
    gateway.clear();

    // Late results for the dead session must not resurrect it.
    session
        .handle_event(AdapterEvent::CharacteristicsDiscovered {
            id: id.clone(),
            service: svc(0),
            characteristics: vec![chr(2, true)],
        })
        .await;
    session
        .handle_event(AdapterEvent::WriteCompleted { id })
        .await;

    assert_eq!(*session.state(), SessionState::Idle);
    assert!(gateway.requests().is_empty());
}

#[tokio::test]
async fn resume_scan_restarts_scanning_from_idle() {
    let (mut session, gateway, id) = ready_session().await;
    session.handle_event(AdapterEvent::Disconnected { id }).await;
    gateway.clear();

    session.resume_scan().await.unwrap();

    assert_eq!(*session.state(), SessionState::Scanning);
    assert_eq!(gateway.requests(), [Request::StartScan]);
    // The stale registry entries were dropped with the new scan cycle.
    assert!(session.peripherals().is_empty());
}

#[tokio::test]
async fn resume_scan_is_rejected_while_a_session_is_active() {
    let (mut session, _gateway, _id) = ready_session().await;

    assert_eq!(
        session.resume_scan().await.unwrap_err(),
        SessionError::SessionBusy
    );
}

#[tokio::test]
async fn stop_scan_on_connect_pauses_and_resumes_the_radio() {
    let mut config = SessionConfig::default();
    config.stop_scan_on_connect = true;
    let (mut session, gateway) = session_with_config(config);
    let id = pid("1");
    session.handle_event(AdapterEvent::PoweredOn).await;
    session.handle_event(discovered("1", "Widget")).await;
    gateway.clear();

    session.select_device(&id).await.unwrap();
    assert_eq!(
        gateway.requests(),
        [Request::Connect(id.clone()), Request::StopScan]
    );
    gateway.clear();

    // A failed attempt puts the radio back to work.
    session
        .handle_event(AdapterEvent::ConnectFailed {
            id,
            reason: "timed out".into(),
        })
        .await;
    assert_eq!(gateway.requests(), [Request::StartScan]);
}
