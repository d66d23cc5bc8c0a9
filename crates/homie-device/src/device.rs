//! Devices: the root of the topology and owner of the transport

use homie_core::{ConfigHolder, ConnectionState, Listeners, PublishOptions, HOMIE_VERSION};
use homie_transport::{Connector, LastWill, TransportError, TransportEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{error, info, info_span, warn, Span};

use crate::config::{DeviceConfig, NodeConfig, OutOfRangePolicy};
use crate::error::{DeviceError, Result};
use crate::lifecycle::{keep_first, Lifecycle, TopologyEvent};
use crate::node::Node;
use crate::route::DeviceRoute;
use crate::router::InboundMessage;
use crate::stats::StatsSchedule;
use crate::traits::{Addressable, Configurable, Connectable};
use crate::{IMPLEMENTATION, IMPLEMENTATION_VERSION};

/// A Homie device
///
/// Build the topology with [`Device::add_node`], call [`Device::setup`] to
/// open the transport, then drive it with [`Device::run`] or
/// [`Device::poll_events`]. Configuration freezes when the transport first
/// reports a connection.
#[derive(Debug)]
pub struct Device {
    config: ConfigHolder<DeviceConfig>,
    lifecycle: Lifecycle,
    started: Instant,
    pub(crate) nodes: Vec<Node>,
    route: Option<Arc<DeviceRoute>>,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    stats: Option<StatsSchedule>,
    pub(crate) broadcast_listeners: Listeners<InboundMessage>,
    pub(crate) message_listeners: Listeners<InboundMessage>,
    pub(crate) topic_listeners: HashMap<String, Listeners<Option<String>>>,
}

impl Device {
    pub fn new(config: DeviceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Device with default configuration, using `name` for the topic
    /// segment and `$name`
    pub fn named(name: impl Into<String>) -> Self {
        Self::build(DeviceConfig::named(name))
    }

    fn build(config: DeviceConfig) -> Self {
        let span = info_span!("device", name = %config.name);
        Self {
            config: ConfigHolder::new(config),
            lifecycle: Lifecycle::new(span),
            started: Instant::now(),
            nodes: Vec::new(),
            route: None,
            events: None,
            stats: None,
            broadcast_listeners: Listeners::new(),
            message_listeners: Listeners::new(),
            topic_listeners: HashMap::new(),
        }
    }

    /// Log under `span` instead of the default `device` span
    ///
    /// Nodes added afterwards log under children of `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.lifecycle.set_span(span);
        self
    }

    pub fn span(&self) -> &Span {
        self.lifecycle.span()
    }

    fn route(&self) -> Result<&Arc<DeviceRoute>> {
        self.route.as_ref().ok_or(DeviceError::NotInitialized)
    }

    fn config_mut(&mut self) -> Result<&mut DeviceConfig> {
        Ok(self.config.get_mut(Self::ENTITY)?)
    }

    pub fn name(&self) -> &str {
        &self.config.get().name
    }

    pub fn friendly_name(&self) -> &str {
        &self.config.get().friendly_name
    }

    pub fn base_topic(&self) -> &str {
        &self.config.get().base_topic
    }

    pub fn stats_interval(&self) -> u64 {
        self.config.get().stats_interval
    }

    pub fn set_friendly_name(&mut self, friendly_name: impl Into<String>) -> Result<()> {
        self.config_mut()?.friendly_name = friendly_name.into();
        Ok(())
    }

    pub fn set_base_topic(&mut self, base_topic: impl Into<String>) -> Result<()> {
        self.assert_not_set_up()?;
        self.config_mut()?.base_topic = base_topic.into();
        Ok(())
    }

    pub fn set_stats_interval(&mut self, seconds: u64) -> Result<()> {
        if seconds == 0 {
            return Err(homie_core::Error::InvalidStatsInterval.into());
        }
        self.config_mut()?.stats_interval = seconds;
        Ok(())
    }

    pub fn set_firmware(&mut self, name: impl Into<String>, version: impl Into<String>) -> Result<()> {
        let config = self.config_mut()?;
        config.firmware_name = Some(name.into());
        config.firmware_version = Some(version.into());
        Ok(())
    }

    /// Addresses published as `$localip` and `$mac`
    pub fn set_network(&mut self, ip: Option<String>, mac: Option<String>) -> Result<()> {
        let config = self.config_mut()?;
        config.ip = ip;
        config.mac = mac;
        Ok(())
    }

    pub fn set_settings(&mut self, settings: serde_json::Value) -> Result<()> {
        self.config_mut()?.settings = settings;
        Ok(())
    }

    pub fn set_out_of_range(&mut self, policy: OutOfRangePolicy) -> Result<()> {
        self.config_mut()?.out_of_range = policy;
        Ok(())
    }

    fn assert_not_set_up(&self) -> Result<()> {
        match self.route {
            Some(_) => Err(DeviceError::AlreadySetUp),
            None => Ok(()),
        }
    }

    /// Add a node; only allowed before the device connects
    pub fn add_node(&mut self, config: NodeConfig) -> Result<&mut Node> {
        self.assert_configurable()?;
        if self.node(&config.name).is_some() {
            return Err(homie_core::Error::DuplicateNode(config.name).into());
        }

        let mut node = Node::new(config, self.lifecycle.span())?;
        if let Some(route) = &self.route {
            node.attach(route);
        }
        let idx = self.nodes.len();
        self.nodes.push(node);
        Ok(&mut self.nodes[idx])
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.name() == name)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Whole seconds since the device was created
    pub fn uptime(&self) -> u64 {
        self.started.elapsed().as_secs_f64().round() as u64
    }

    /// Whether the statistics timer is running
    pub fn stats_scheduled(&self) -> bool {
        self.stats.is_some()
    }

    pub fn next_stats_due(&self) -> Option<Instant> {
        self.stats.map(|s| s.next_due())
    }

    pub fn on_event<F>(&mut self, handler: F)
    where
        F: FnMut(&TopologyEvent) + Send + 'static,
    {
        self.lifecycle.on_event(handler);
    }

    /// Messages on `{base}/$broadcast/...`
    pub fn on_broadcast<F>(&mut self, handler: F)
    where
        F: FnMut(&InboundMessage) + Send + 'static,
    {
        self.broadcast_listeners.add(handler);
    }

    /// Every non-broadcast message, with the topic relative to the device
    pub fn on_message<F>(&mut self, handler: F)
    where
        F: FnMut(&InboundMessage) + Send + 'static,
    {
        self.message_listeners.add(handler);
    }

    /// Messages whose device-relative topic equals `topic`
    pub fn on_topic<F>(&mut self, topic: impl Into<String>, handler: F)
    where
        F: FnMut(&Option<String>) + Send + 'static,
    {
        self.topic_listeners.entry(topic.into()).or_default().add(handler);
    }

    /// Open the transport and subscribe to the device's topics
    ///
    /// The broker is told to publish `lost` on `$state` if the connection
    /// drops. Events are processed by [`Device::run`] or
    /// [`Device::poll_events`].
    pub fn setup<C>(&mut self, connector: &C) -> Result<()>
    where
        C: Connector + ?Sized,
    {
        self.assert_not_set_up()?;
        let config = self.config.get();
        config.validate()?;

        let will_topic = format!("{}/{}/$state", config.base_topic, config.name);
        let options = config
            .mqtt
            .with_last_will(LastWill::new(will_topic, "lost").retained());
        let connection = connector.connect(&options)?;

        let route = Arc::new(DeviceRoute::new(
            config.name.clone(),
            config.base_topic.clone(),
            connection.handle,
        ));
        for node in self.nodes.iter_mut() {
            node.attach(&route);
        }
        self.route = Some(route);
        self.events = Some(connection.events);

        self.subscribe("#")?;
        self.route()?.subscribe_broadcast()?;

        info!(parent: self.span(), "Device set up on {}:{}", options.host, options.port);
        Ok(())
    }

    /// Announce `disconnected` and ask the transport to close
    pub fn end(&mut self) -> Result<()> {
        self.publish_attribute("state", "disconnected")?;
        self.route()?.transport().end()?;
        info!(parent: self.span(), "Device ending");
        Ok(())
    }

    /// Apply one transport event
    pub fn handle_event(&mut self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::Connected => self.on_connect(),
            TransportEvent::Closed => {
                self.on_disconnect();
                Ok(())
            }
            TransportEvent::Offline => {
                self.on_offline();
                Ok(())
            }
            TransportEvent::Error(err) => {
                self.on_error(&err);
                Ok(())
            }
            TransportEvent::Message { topic, payload } => {
                self.handle_message(&topic, payload).map(|_| ())
            }
        }
    }

    /// Apply every event already queued, returning how many were handled
    pub fn poll_events(&mut self) -> Result<usize> {
        let mut handled = 0;
        loop {
            let next = match self.events.as_mut() {
                Some(events) => events.try_recv(),
                None => return Err(DeviceError::NotInitialized),
            };
            match next {
                Ok(event) => {
                    self.handle_event(event)?;
                    handled += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(handled),
            }
        }
    }

    /// Publish statistics if the timer is due, returning whether it was
    pub fn tick(&mut self, now: Instant) -> Result<bool> {
        match self.stats {
            Some(schedule) if schedule.is_due(now) => {
                if let Some(schedule) = self.stats.as_mut() {
                    schedule.advance(now);
                }
                self.on_stats_interval()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Process transport events and statistics until the event stream ends
    ///
    /// Errors raised while handling an event are logged and the loop keeps
    /// going.
    pub async fn run(&mut self) -> Result<()> {
        enum Step {
            Event(Option<TransportEvent>),
            Stats,
        }

        loop {
            let step = {
                let deadline = self.stats.map(|s| s.next_due());
                let events = self.events.as_mut().ok_or(DeviceError::NotInitialized)?;
                match deadline {
                    Some(deadline) => tokio::select! {
                        event = events.recv() => Step::Event(event),
                        _ = tokio::time::sleep_until(deadline.into()) => Step::Stats,
                    },
                    None => Step::Event(events.recv().await),
                }
            };

            let result = match step {
                Step::Event(Some(event)) => self.handle_event(event),
                Step::Event(None) => {
                    info!(parent: self.span(), "Transport event stream ended");
                    return Ok(());
                }
                Step::Stats => self.tick(Instant::now()).map(|_| ()),
            };

            if let Err(e) = result {
                match e {
                    DeviceError::Topology(_) => warn!(parent: self.span(), "{}", e),
                    _ => error!(parent: self.span(), "{}", e),
                }
            }
        }
    }
}

impl Addressable for Device {
    fn name(&self) -> &str {
        Device::name(self)
    }

    fn raw_publish(&self, path: &str, value: &str, options: PublishOptions) -> Result<()> {
        self.route()?.raw_publish(path, value, options)
    }

    fn raw_subscribe(&self, path: &str) -> Result<()> {
        self.route()?.raw_subscribe(path)
    }
}

impl Configurable for Device {
    type Config = DeviceConfig;
    const ENTITY: &'static str = "Device";

    fn config_holder(&self) -> &ConfigHolder<DeviceConfig> {
        &self.config
    }
}

impl Connectable for Device {
    fn connection_state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    fn on_connect(&mut self) -> Result<()> {
        let mut result = Ok(());
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for node in self.nodes.iter_mut() {
            nodes.push(node.announced_name());
            keep_first(&mut result, node.on_connect());
        }

        let config = self.config.get();
        keep_first(
            &mut result,
            self.publish_attributes(&[
                ("fw/name", config.firmware_name.clone()),
                ("fw/version", config.firmware_version.clone()),
                ("homie", Some(HOMIE_VERSION.to_string())),
                ("implementation", Some(IMPLEMENTATION.to_string())),
                ("implementation/version", Some(IMPLEMENTATION_VERSION.to_string())),
                ("localip", config.ip.clone()),
                ("mac", config.mac.clone()),
                ("name", Some(config.friendly_name.clone())),
                ("nodes", Some(nodes.join(","))),
                ("state", Some("init".to_string())),
                ("stats", Some("interval,uptime".to_string())),
            ]),
        );

        keep_first(&mut result, self.on_stats_interval());
        let period = Duration::from_secs(self.stats_interval());
        self.stats = Some(StatsSchedule::new(period, Instant::now()));

        self.config.freeze();
        self.lifecycle.connect();
        keep_first(&mut result, self.publish_attribute("state", "ready"));
        match &result {
            Ok(()) => info!(parent: self.span(), "Device ready with {} node(s)", self.nodes.len()),
            Err(e) => warn!(parent: self.span(), "Device connected with incomplete announcement: {}", e),
        }
        result
    }

    fn on_disconnect(&mut self) {
        self.lifecycle.disconnect();
        self.stats = None;
        for node in self.nodes.iter_mut() {
            node.on_disconnect();
        }
    }

    fn on_offline(&mut self) {
        self.lifecycle.offline();
        self.stats = None;
        for node in self.nodes.iter_mut() {
            node.on_offline();
        }
    }

    fn on_error(&mut self, err: &Arc<TransportError>) {
        self.lifecycle.error(err);
        for node in self.nodes.iter_mut() {
            node.on_error(err);
        }
    }

    fn on_stats_interval(&mut self) -> Result<()> {
        self.lifecycle.stats_interval();
        let mut result = self.publish_stats(&[
            ("interval", Some(self.stats_interval().to_string())),
            ("uptime", Some(self.uptime().to_string())),
        ]);
        for node in self.nodes.iter_mut() {
            keep_first(&mut result, node.on_stats_interval());
        }
        result
    }
}
