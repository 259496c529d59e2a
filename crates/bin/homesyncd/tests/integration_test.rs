//! End-to-end tests for the full synchronization loop.
//!
//! Each test wires a real session, reconciler and dispatcher to the
//! in-process virtual broker, so no network is involved.

use std::sync::Arc;
use std::time::Duration;

use homesync_adapter_virtual::VirtualBroker;
use homesync_app::dispatcher::{CommandDispatcher, Dispatch};
use homesync_app::ports::ConnectionState;
use homesync_app::reconciler::StateReconciler;
use homesync_app::registry::DeviceRegistry;
use homesync_app::session::{SessionConfig, TransportSession};
use homesync_domain::command::Action;
use homesync_domain::device::{Device, DeviceKind, DeviceStatus};
use homesync_domain::fleet::default_fleet;

type Session = TransportSession<Arc<VirtualBroker>>;

struct Stack {
    broker: Arc<VirtualBroker>,
    session: Arc<Session>,
    registry: Arc<DeviceRegistry>,
    dispatcher: CommandDispatcher<Arc<Session>>,
}

/// Build the stack with optimistic updates off, so every registry change
/// comes from a device report.
fn stack() -> Stack {
    let config = SessionConfig::default();
    let broker = Arc::new(VirtualBroker::default());
    let registry = Arc::new(DeviceRegistry::new(default_fleet()).unwrap());
    let session = Arc::new(TransportSession::new(Arc::clone(&broker), config.clone()));

    StateReconciler::new(Arc::clone(&registry), config.namespace.clone())
        .spawn(session.subscribe());

    let dispatcher = CommandDispatcher::new(
        Arc::clone(&session),
        Arc::clone(&registry),
        config.namespace,
    )
    .with_optimistic_updates(false);

    Stack {
        broker,
        session,
        registry,
        dispatcher,
    }
}

/// Poll the registry until `condition` holds for `device_id`.
async fn eventually(registry: &DeviceRegistry, device_id: &str, condition: impl Fn(&Device) -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if registry.get(device_id).is_some_and(|device| condition(&device)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("registry should converge");
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_sync_device_report_after_command() {
    let stack = stack();
    assert!(stack.session.connect().await);

    let outcome = stack
        .dispatcher
        .send_command("4", DeviceKind::Light, Action::SetState, "on")
        .await
        .unwrap();
    assert_eq!(outcome, Dispatch::Sent);

    eventually(&stack.registry, "4", |device| {
        device.status == DeviceStatus::On && device.brightness() == Some(80)
    })
    .await;
}

#[tokio::test]
async fn should_sync_fan_speed_change() {
    let stack = stack();
    assert!(stack.session.connect().await);

    stack
        .dispatcher
        .send_command("3", DeviceKind::Fan, Action::SetSpeed, 5)
        .await
        .unwrap();

    eventually(&stack.registry, "3", |device| device.speed() == Some(5)).await;
}

#[tokio::test]
async fn should_toggle_device_through_broker() {
    let stack = stack();
    assert!(stack.session.connect().await);

    assert_eq!(stack.dispatcher.toggle("1").await.unwrap(), Dispatch::Sent);

    eventually(&stack.registry, "1", |device| device.status == DeviceStatus::Off).await;
}

#[tokio::test]
async fn should_report_not_connected_when_broker_refuses() {
    let stack = stack();
    stack.broker.set_refuse_connections(true);

    assert!(!stack.session.connect().await);
    assert_eq!(stack.session.state(), ConnectionState::Disconnected);

    let outcome = stack
        .dispatcher
        .send_command("4", DeviceKind::Light, Action::SetState, "on")
        .await
        .unwrap();
    assert_eq!(outcome, Dispatch::NotConnected);
    assert_eq!(stack.registry.get("4").unwrap().status, DeviceStatus::Off);
}

// ---------------------------------------------------------------------------
// Connection lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_mark_last_seen_from_retained_status() {
    let stack = stack();
    assert!(stack.session.connect().await);

    eventually(&stack.registry, "2", |device| device.last_seen.is_some()).await;
    // The offline device is not simulated, so it never reports.
    assert!(stack.registry.get("10").unwrap().last_seen.is_none());
}

#[tokio::test]
async fn should_connect_to_household_larger_than_link_buffer() {
    let fleet: Vec<Device> = (1..=70)
        .map(|n| {
            Device::builder()
                .id(n.to_string())
                .name(format!("Light {n}"))
                .room("Hall")
                .status(DeviceStatus::On)
                .kind(DeviceKind::Light)
                .build()
                .unwrap()
        })
        .collect();
    let config = SessionConfig::default();
    let broker = Arc::new(VirtualBroker::new(config.namespace.clone(), &fleet));
    let registry = Arc::new(DeviceRegistry::new(fleet).unwrap());
    let session = TransportSession::new(Arc::clone(&broker), config.clone());
    StateReconciler::new(Arc::clone(&registry), config.namespace).spawn(session.subscribe());

    let connected = tokio::time::timeout(Duration::from_secs(10), session.connect())
        .await
        .expect("connect should resolve");

    assert!(connected);
    assert_eq!(session.state(), ConnectionState::Connected);
    eventually(&registry, "70", |device| device.last_seen.is_some()).await;
}

#[tokio::test]
async fn should_reconnect_after_connection_loss() {
    let stack = stack();
    assert!(stack.session.connect().await);

    let mut state = stack.session.watch_state();
    stack.broker.drop_connection(7, "link reset").await;
    tokio::time::timeout(
        Duration::from_secs(2),
        state.wait_for(|state| *state == ConnectionState::Disconnected),
    )
    .await
    .expect("loss should be observed")
    .unwrap();

    assert!(stack.session.connect().await);
    assert!(stack.broker.is_open());

    stack
        .dispatcher
        .send_command("5", DeviceKind::Ac, Action::SetTemperature, 20)
        .await
        .unwrap();
    eventually(&stack.registry, "5", |device| device.temperature() == Some(20)).await;
}

#[tokio::test]
async fn should_close_broker_connection_on_disconnect() {
    let stack = stack();
    assert!(stack.session.connect().await);

    stack.session.disconnect().await;

    assert_eq!(stack.session.state(), ConnectionState::Disconnected);
    assert!(!stack.broker.is_open());
}
