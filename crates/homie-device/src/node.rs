//! Nodes: named groups of properties, optionally instantiated over a range

use homie_core::{ConfigHolder, ConnectionState, Error, IndexRange, PublishOptions};
use homie_transport::TransportError;
use std::fmt;
use std::sync::Arc;
use tracing::{info_span, Span};

use crate::config::{NodeConfig, PropertyConfig};
use crate::error::{DeviceError, Result};
use crate::lifecycle::{keep_first, Lifecycle, TopologyEvent};
use crate::property::Property;
use crate::route::{DeviceRoute, NodeRoute};
use crate::traits::{Addressable, Configurable, Connectable};

#[derive(Debug)]
pub struct Node {
    config: ConfigHolder<NodeConfig>,
    /// Fixed at construction; the name and range never change
    range: Option<IndexRange>,
    lifecycle: Lifecycle,
    route: Option<Arc<NodeRoute>>,
    properties: Vec<Property>,
}

impl Node {
    /// Validate `config` and build a node logging under `parent`
    pub(crate) fn new(config: NodeConfig, parent: &Span) -> Result<Self> {
        config.validate()?;
        let span = info_span!(parent: parent, "node", name = %config.name);
        Ok(Self {
            range: config.index_range(),
            config: ConfigHolder::new(config),
            lifecycle: Lifecycle::new(span),
            route: None,
            properties: Vec::new(),
        })
    }

    pub(crate) fn attach(&mut self, device: &Arc<DeviceRoute>) {
        let route = Arc::new(NodeRoute::new(
            self.config.get().name.clone(),
            self.range,
            Arc::clone(device),
        ));
        for property in self.properties.iter_mut() {
            property.attach(&route);
        }
        self.route = Some(route);
    }

    fn route(&self) -> Result<&Arc<NodeRoute>> {
        self.route.as_ref().ok_or(DeviceError::NotInitialized)
    }

    fn config_mut(&mut self) -> Result<&mut NodeConfig> {
        Ok(self.config.get_mut(Self::ENTITY)?)
    }

    pub fn friendly_name(&self) -> &str {
        &self.config.get().friendly_name
    }

    pub fn node_type(&self) -> &str {
        &self.config.get().node_type
    }

    pub fn is_range(&self) -> bool {
        self.range.is_some()
    }

    pub fn index_range(&self) -> Option<IndexRange> {
        self.range
    }

    pub fn set_friendly_name(&mut self, friendly_name: impl Into<String>) -> Result<()> {
        self.config_mut()?.friendly_name = friendly_name.into();
        Ok(())
    }

    pub fn set_node_type(&mut self, node_type: impl Into<String>) -> Result<()> {
        self.config_mut()?.node_type = node_type.into();
        Ok(())
    }

    /// Entry in the device's `$nodes` list; range nodes carry a `[]` suffix
    pub fn announced_name(&self) -> String {
        if self.is_range() {
            format!("{}[]", self.name())
        } else {
            self.name().to_string()
        }
    }

    /// Add a property; only allowed before the node connects
    pub fn add_property(&mut self, config: PropertyConfig) -> Result<&mut Property> {
        self.assert_configurable()?;
        if self.property(&config.name).is_some() {
            return Err(Error::DuplicateProperty {
                node: self.name().to_string(),
                property: config.name,
            }
            .into());
        }

        let mut property = Property::new(config, self.lifecycle.span());
        if let Some(route) = &self.route {
            property.attach(route);
        }
        let idx = self.properties.len();
        self.properties.push(property);
        Ok(&mut self.properties[idx])
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name() == name)
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Publish `value` for `property` at `{node}[_{index}]/{property}`
    pub fn publish_property_value(
        &self,
        property: &Property,
        value: impl fmt::Display,
        index: Option<i64>,
    ) -> Result<()> {
        self.route()?.publish_property_value(
            property.name(),
            &value.to_string(),
            property.retained(),
            index,
        )
    }

    pub fn on_event<F>(&mut self, handler: F)
    where
        F: FnMut(&TopologyEvent) + Send + 'static,
    {
        self.lifecycle.on_event(handler);
    }

    fn announce(&self) -> Result<()> {
        let config = self.config.get();
        let properties: Vec<&str> = self.properties.iter().map(|p| p.name()).collect();
        self.publish_attributes(&[
            ("name", Some(config.friendly_name.clone())),
            ("properties", Some(properties.join(","))),
            ("type", Some(config.node_type.clone())),
            ("array", self.range.map(|r| r.to_string())),
        ])
    }
}

impl Addressable for Node {
    fn name(&self) -> &str {
        &self.config.get().name
    }

    fn raw_publish(&self, path: &str, value: &str, options: PublishOptions) -> Result<()> {
        self.route()?.raw_publish(path, value, options)
    }

    fn raw_subscribe(&self, path: &str) -> Result<()> {
        self.route()?.raw_subscribe(path)
    }
}

impl Configurable for Node {
    type Config = NodeConfig;
    const ENTITY: &'static str = "Node";

    fn config_holder(&self) -> &ConfigHolder<NodeConfig> {
        &self.config
    }
}

impl Connectable for Node {
    fn connection_state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    fn on_connect(&mut self) -> Result<()> {
        self.config.freeze();
        self.lifecycle.connect();
        let mut result = self.announce();
        for property in self.properties.iter_mut() {
            keep_first(&mut result, property.on_connect());
        }
        result
    }

    fn on_disconnect(&mut self) {
        self.lifecycle.disconnect();
        for property in self.properties.iter_mut() {
            property.on_disconnect();
        }
    }

    fn on_offline(&mut self) {
        self.lifecycle.offline();
        for property in self.properties.iter_mut() {
            property.on_offline();
        }
    }

    fn on_error(&mut self, err: &Arc<TransportError>) {
        self.lifecycle.error(err);
        for property in self.properties.iter_mut() {
            property.on_error(err);
        }
    }

    fn on_stats_interval(&mut self) -> Result<()> {
        self.lifecycle.stats_interval();
        let mut result = Ok(());
        for property in self.properties.iter_mut() {
            keep_first(&mut result, property.on_stats_interval());
        }
        result
    }
}
