//! Device Tests (homie-device)
//!
//! Tests for the device lifecycle including:
//! - Transport setup, last will and subscriptions
//! - Attribute announcement on connect
//! - Configuration freezing
//! - Statistics scheduling
//! - Ending, going offline and relaying errors
//! - The async event loop

use homie_core::{ConnectionState, Error, PublishOptions};
use homie_device::prelude::*;
use homie_test_utils::{EventCollector, StubConnector, StubTransport, DEFAULT_TIMEOUT};
use homie_transport::{TransportError, TransportEvent};
use std::time::{Duration, Instant};
use tokio::time::timeout;

const DEVICE: &str = "test-device";

fn topic(path: &str) -> String {
    format!("homie/{}/{}", DEVICE, path)
}

fn device_with_nodes() -> Device {
    let mut device = Device::named(DEVICE);
    device.set_friendly_name("Test Device").unwrap();
    device.set_firmware("test-fw", "1.2.3").unwrap();

    let light = device.add_node(NodeConfig::new("light", "Light")).unwrap();
    light
        .add_property(PropertyConfig::new("power", "Power").retained(true))
        .unwrap();

    let strip = device
        .add_node(NodeConfig::new("strip", "LED strip").with_type("led").with_range(0, 3))
        .unwrap();
    strip
        .add_property(PropertyConfig::new("color", "Color").with_datatype(DataType::Color))
        .unwrap();

    device
}

fn connected(mut device: Device) -> (Device, StubTransport) {
    let connector = StubConnector::new();
    device.setup(&connector).unwrap();
    assert_eq!(device.poll_events().unwrap(), 1);
    (device, connector.transport())
}

fn topology_name(event: &TopologyEvent) -> &'static str {
    match event {
        TopologyEvent::Connect => "connect",
        TopologyEvent::Disconnect => "disconnect",
        TopologyEvent::Offline => "offline",
        TopologyEvent::Error(_) => "error",
        TopologyEvent::StatsInterval => "stats",
    }
}

// ============================================================================
// Setup Tests
// ============================================================================

#[test]
fn test_setup_registers_last_will() {
    let mut device = device_with_nodes();
    let connector = StubConnector::new();
    device.setup(&connector).unwrap();

    let options = connector.transport().connect_options().unwrap();
    let will = options.last_will.expect("no last will");
    assert_eq!(will.topic, topic("$state"));
    assert_eq!(will.payload, "lost");
    assert!(will.retain);
}

#[test]
fn test_setup_subscribes_device_and_broadcast() {
    let mut device = device_with_nodes();
    let connector = StubConnector::new();
    device.setup(&connector).unwrap();

    assert_eq!(
        connector.transport().subscriptions(),
        vec![topic("#"), "homie/$broadcast/#".to_string()]
    );
}

#[test]
fn test_setup_uses_custom_base_topic() {
    let mut device = Device::named(DEVICE);
    device.set_base_topic("devices").unwrap();
    let connector = StubConnector::new();
    device.setup(&connector).unwrap();
    device.poll_events().unwrap();

    let transport = connector.transport();
    assert_eq!(
        transport.subscriptions(),
        vec![
            "devices/test-device/#".to_string(),
            "devices/$broadcast/#".to_string()
        ]
    );
    assert!(transport.last_published("devices/test-device/$homie").is_some());
}

#[test]
fn test_setup_twice_fails() {
    let mut device = device_with_nodes();
    let connector = StubConnector::new();
    device.setup(&connector).unwrap();
    assert!(matches!(
        device.setup(&connector),
        Err(DeviceError::AlreadySetUp)
    ));
}

#[test]
fn test_not_connected_before_first_event() {
    let mut device = device_with_nodes();
    device.setup(&StubConnector::new()).unwrap();
    assert_eq!(device.connection_state(), ConnectionState::Disconnected);
    assert!(device.is_configurable());
}

// ============================================================================
// Connect Tests
// ============================================================================

#[test]
fn test_connect_announces_device() {
    let (device, transport) = connected(device_with_nodes());

    assert!(device.is_connected());
    assert_eq!(transport.payloads_for(&topic("$homie")), vec!["3.0.1"]);
    assert_eq!(transport.payloads_for(&topic("$name")), vec!["Test Device"]);
    assert_eq!(transport.payloads_for(&topic("$fw/name")), vec!["test-fw"]);
    assert_eq!(transport.payloads_for(&topic("$fw/version")), vec!["1.2.3"]);
    assert_eq!(
        transport.payloads_for(&topic("$implementation")),
        vec!["rust:homie-device"]
    );
    assert_eq!(
        transport.payloads_for(&topic("$implementation/version")),
        vec![env!("CARGO_PKG_VERSION")]
    );
    assert_eq!(transport.payloads_for(&topic("$nodes")), vec!["light,strip[]"]);
    assert_eq!(transport.payloads_for(&topic("$stats")), vec!["interval,uptime"]);
    assert_eq!(transport.payloads_for(&topic("$state")), vec!["init", "ready"]);
}

#[test]
fn test_connect_skips_absent_attributes() {
    let (_device, transport) = connected(device_with_nodes());
    assert!(transport.last_published(&topic("$localip")).is_none());
    assert!(transport.last_published(&topic("$mac")).is_none());
}

#[test]
fn test_connect_publishes_network_attributes() {
    let mut device = device_with_nodes();
    device
        .set_network(Some("10.0.0.7".to_string()), Some("AA:BB:CC:DD:EE:FF".to_string()))
        .unwrap();
    let (_device, transport) = connected(device);

    assert_eq!(transport.payloads_for(&topic("$localip")), vec!["10.0.0.7"]);
    assert_eq!(
        transport.payloads_for(&topic("$mac")),
        vec!["AA:BB:CC:DD:EE:FF"]
    );
}

#[test]
fn test_attributes_are_retained() {
    let (_device, transport) = connected(device_with_nodes());
    let homie = transport.last_published(&topic("$homie")).unwrap();
    assert_eq!(homie.options, PublishOptions::retained());
    let node_name = transport.last_published(&topic("light/$name")).unwrap();
    assert!(node_name.options.retain);
}

#[test]
fn test_nodes_announced_before_device() {
    let (_device, transport) = connected(device_with_nodes());

    let node = transport.position_of(&topic("light/$name")).unwrap();
    let property = transport.position_of(&topic("light/power/$name")).unwrap();
    let device_attr = transport.position_of(&topic("$homie")).unwrap();
    let ready = transport.published().len() - 1;

    assert!(node < property);
    assert!(property < device_attr);
    assert_eq!(transport.published()[ready].topic, topic("$state"));
    assert_eq!(transport.published()[ready].payload, "ready");
}

#[test]
fn test_stats_published_on_connect() {
    let (device, transport) = connected(device_with_nodes());

    assert_eq!(transport.payloads_for(&topic("$stats/interval")), vec!["60"]);
    assert_eq!(transport.payloads_for(&topic("$stats/uptime")), vec!["0"]);
    let uptime = transport.last_published(&topic("$stats/uptime")).unwrap();
    assert!(!uptime.options.retain);
    assert!(device.stats_scheduled());
}

#[test]
fn test_node_added_after_setup_is_announced() {
    let mut device = Device::named(DEVICE);
    let connector = StubConnector::new();
    device.setup(&connector).unwrap();

    device
        .add_node(NodeConfig::new("fan", "Fan"))
        .unwrap()
        .add_property(PropertyConfig::new("speed", "Speed"))
        .unwrap();
    device.poll_events().unwrap();

    let transport = connector.transport();
    assert_eq!(transport.payloads_for(&topic("$nodes")), vec!["fan"]);
    assert_eq!(transport.payloads_for(&topic("fan/speed/$name")), vec!["Speed"]);
}

#[test]
fn test_connect_emits_event() {
    let mut device = device_with_nodes();
    let events = EventCollector::<&'static str>::new();
    let mut sink = events.callback();
    device.on_event(move |event| sink(&topology_name(event)));

    let (_device, _transport) = connected(device);
    assert_eq!(events.values(), vec!["stats", "connect"]);
}

// ============================================================================
// Configuration Freezing Tests
// ============================================================================

#[test]
fn test_configuration_frozen_after_connect() {
    let (mut device, _transport) = connected(device_with_nodes());

    assert!(!device.is_configurable());
    let err = device.set_friendly_name("Renamed").unwrap_err();
    assert_eq!(err.topology(), Some(&Error::NotConfigurable { entity: "Device" }));
    assert_eq!(device.friendly_name(), "Test Device");

    let err = device.add_node(NodeConfig::new("late", "Late")).unwrap_err();
    assert_eq!(err.topology(), Some(&Error::NotConfigurable { entity: "Device" }));
    assert_eq!(device.nodes().len(), 2);
}

#[test]
fn test_children_frozen_after_connect() {
    let (mut device, _transport) = connected(device_with_nodes());
    let light = device.node_mut("light").unwrap();
    assert!(!light.is_configurable());
    assert!(light.set_node_type("dimmer").is_err());

    let power = light.property_mut("power").unwrap();
    assert!(!power.is_configurable());
    let err = power.set_unit(Some("W".to_string())).unwrap_err();
    assert_eq!(err.topology(), Some(&Error::NotConfigurable { entity: "Property" }));
}

#[test]
fn test_invalid_stats_interval_rejected() {
    let mut device = Device::named(DEVICE);
    let err = device.set_stats_interval(0).unwrap_err();
    assert_eq!(err.topology(), Some(&Error::InvalidStatsInterval));
    assert_eq!(device.stats_interval(), 60);
}

// ============================================================================
// Statistics Tests
// ============================================================================

#[test]
fn test_tick_publishes_stats_when_due() {
    let mut device = device_with_nodes();
    device.set_stats_interval(5).unwrap();
    let (mut device, transport) = connected(device);

    assert!(!device.tick(Instant::now()).unwrap());
    let due = device.next_stats_due().unwrap();
    assert!(device.tick(due).unwrap());

    assert_eq!(transport.payloads_for(&topic("$stats/interval")), vec!["5", "5"]);
    assert_eq!(transport.payloads_for(&topic("$stats/uptime")).len(), 2);
    assert_eq!(device.next_stats_due(), Some(due + Duration::from_secs(5)));
}

#[test]
fn test_repeated_stats_publication() {
    let mut device = device_with_nodes();
    device.set_stats_interval(5).unwrap();
    let (mut device, transport) = connected(device);

    for _ in 0..3 {
        device.on_stats_interval().unwrap();
    }

    let intervals = transport.payloads_for(&topic("$stats/interval"));
    assert_eq!(intervals, vec!["5"; 4]);

    let uptimes: Vec<u64> = transport
        .payloads_for(&topic("$stats/uptime"))
        .iter()
        .map(|p| p.parse().unwrap())
        .collect();
    assert_eq!(uptimes.len(), 4);
    assert!(uptimes.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(transport
        .published()
        .iter()
        .filter(|p| p.topic.contains("$stats/"))
        .all(|p| !p.options.retain));
}

#[test]
fn test_stats_interval_reaches_children() {
    let mut device = device_with_nodes();
    let events = EventCollector::<&'static str>::new();
    let mut sink = events.callback();
    device
        .node_mut("strip")
        .unwrap()
        .property_mut("color")
        .unwrap()
        .on_event(move |event| sink(&topology_name(event)));

    let (mut device, _transport) = connected(device);
    let due = device.next_stats_due().unwrap();
    device.tick(due).unwrap();

    assert_eq!(events.values(), vec!["connect", "stats", "stats"]);
}

// ============================================================================
// Failed Announcement Tests
// ============================================================================

fn large_device() -> Device {
    let mut device = Device::named(DEVICE);
    for n in 0..5 {
        let node = device
            .add_node(NodeConfig::new(format!("node{}", n), "Node"))
            .unwrap();
        for p in 0..4 {
            node.add_property(PropertyConfig::new(format!("prop{}", p), "Prop"))
                .unwrap();
        }
    }
    device
}

#[test]
fn test_failed_announcement_leaves_topology_connected() {
    let mut device = large_device();
    let transport = StubTransport::new().with_publish_limit(3);
    let connector = StubConnector::with_transport(transport.clone());
    device.setup(&connector).unwrap();

    let err = device.poll_events().unwrap_err();
    assert!(matches!(
        err,
        DeviceError::Transport(TransportError::PublishFailed(_))
    ));
    assert_eq!(transport.published().len(), 3);

    assert!(device.is_connected());
    assert!(!device.is_configurable());
    assert!(device.stats_scheduled());
    for node in device.nodes() {
        assert!(node.is_connected(), "{} not connected", node.name());
        assert!(!node.is_configurable());
        for property in node.properties() {
            assert!(property.is_connected());
            assert!(!property.is_configurable());
        }
    }
}

#[test]
fn test_failed_announcement_still_notifies_connect() {
    let mut device = large_device();
    let events = EventCollector::<&'static str>::new();
    let mut sink = events.callback();
    device.on_event(move |event| sink(&topology_name(event)));

    let transport = StubTransport::new().with_publish_limit(0);
    device
        .setup(&StubConnector::with_transport(transport))
        .unwrap();
    assert!(device.poll_events().is_err());

    assert_eq!(events.values(), vec!["stats", "connect"]);
}

#[tokio::test(flavor = "current_thread")]
async fn test_large_announcement_over_mqtt_transport() {
    let mut device = large_device();
    device.setup(&homie_transport::MqttConnector::new()).unwrap();

    device.handle_event(TransportEvent::Connected).unwrap();

    assert!(device.is_connected());
    assert!(!device.is_configurable());
    assert!(device.stats_scheduled());
}

// ============================================================================
// Disconnect, Offline and Error Tests
// ============================================================================

#[test]
fn test_end_publishes_disconnected_and_closes() {
    let (mut device, transport) = connected(device_with_nodes());
    device.end().unwrap();

    assert_eq!(
        transport.last_published(&topic("$state")).unwrap().payload,
        "disconnected"
    );
    assert!(transport.is_ended());

    device.poll_events().unwrap();
    assert_eq!(device.connection_state(), ConnectionState::Disconnected);
    assert!(!device.stats_scheduled());
    assert_eq!(
        device.node("light").unwrap().connection_state(),
        ConnectionState::Disconnected
    );
}

#[test]
fn test_offline_clears_stats() {
    let (mut device, transport) = connected(device_with_nodes());
    transport.simulate(TransportEvent::Offline);
    device.poll_events().unwrap();

    assert_eq!(device.connection_state(), ConnectionState::Offline);
    assert!(!device.stats_scheduled());
    let color = device.node("strip").unwrap().property("color").unwrap();
    assert_eq!(color.connection_state(), ConnectionState::Offline);
}

#[test]
fn test_reconnect_restarts_stats() {
    let (mut device, transport) = connected(device_with_nodes());
    transport.simulate(TransportEvent::Offline);
    transport.simulate(TransportEvent::Connected);
    device.poll_events().unwrap();

    assert!(device.is_connected());
    assert!(device.stats_scheduled());
    assert_eq!(
        transport.payloads_for(&topic("$state")),
        vec!["init", "ready", "init", "ready"]
    );
}

#[test]
fn test_error_keeps_connection_and_reaches_nodes() {
    let mut device = device_with_nodes();
    let events = EventCollector::<&'static str>::new();
    let mut sink = events.callback();
    device
        .node_mut("light")
        .unwrap()
        .on_event(move |event| sink(&topology_name(event)));

    let (mut device, transport) = connected(device);
    transport.simulate(TransportEvent::error(TransportError::Other("broker hiccup".to_string())));
    device.poll_events().unwrap();

    assert!(device.is_connected());
    assert!(device.stats_scheduled());
    assert_eq!(events.values(), vec!["connect", "stats", "error"]);
}

// ============================================================================
// Event Loop Tests
// ============================================================================

#[tokio::test]
async fn test_run_until_stream_ends() {
    let mut device = device_with_nodes();
    let sets = EventCollector::<SetEvent>::new();
    device
        .node_mut("light")
        .unwrap()
        .property_mut("power")
        .unwrap()
        .on_set(sets.callback());

    let connector = StubConnector::new();
    device.setup(&connector).unwrap();
    let transport = connector.transport();
    transport.simulate_message(&topic("light/power/set"), "true");
    transport.hang_up();

    let result = timeout(DEFAULT_TIMEOUT, device.run()).await;
    assert!(matches!(result, Ok(Ok(()))));
    assert!(device.is_connected());
    assert_eq!(sets.count(), 1);
    assert_eq!(sets.last().unwrap().value.as_deref(), Some("true"));
}

#[tokio::test]
async fn test_run_survives_handler_errors() {
    let mut device = device_with_nodes();
    device
        .node_mut("light")
        .unwrap()
        .property_mut("power")
        .unwrap()
        .set_settable(false)
        .unwrap();

    let connector = StubConnector::new();
    device.setup(&connector).unwrap();
    let transport = connector.transport();
    transport.simulate_message(&topic("light/power/set"), "true");
    transport.simulate(TransportEvent::Offline);
    transport.hang_up();

    let result = timeout(DEFAULT_TIMEOUT, device.run()).await;
    assert!(matches!(result, Ok(Ok(()))));
    assert_eq!(device.connection_state(), ConnectionState::Offline);
}

#[tokio::test]
async fn test_run_before_setup_fails() {
    let mut device = device_with_nodes();
    assert!(matches!(
        device.run().await,
        Err(DeviceError::NotInitialized)
    ));
}
