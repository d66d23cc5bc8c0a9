//! Properties: the leaves of the topology

use homie_core::{ConfigHolder, ConnectionState, DataType, Error, Listeners, PublishOptions, RangeDescriptor};
use homie_transport::TransportError;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info_span, Span};

use crate::config::PropertyConfig;
use crate::error::{DeviceError, Result};
use crate::lifecycle::{Lifecycle, TopologyEvent};
use crate::route::{NodeRoute, PropertyPublisher, PropertyRoute};
use crate::traits::{Addressable, Configurable, Connectable};

/// Inbound `/set` command delivered to a property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetEvent {
    /// Which instance of a range node was addressed
    pub range: RangeDescriptor,
    /// Raw payload, `None` for an empty message
    pub value: Option<String>,
}

#[derive(Debug)]
pub struct Property {
    config: ConfigHolder<PropertyConfig>,
    lifecycle: Lifecycle,
    route: Option<Arc<PropertyRoute>>,
    set_listeners: Listeners<SetEvent>,
}

impl Property {
    pub(crate) fn new(config: PropertyConfig, parent: &Span) -> Self {
        let span = info_span!(parent: parent, "property", name = %config.name);
        Self {
            config: ConfigHolder::new(config),
            lifecycle: Lifecycle::new(span),
            route: None,
            set_listeners: Listeners::new(),
        }
    }

    pub(crate) fn attach(&mut self, node: &Arc<NodeRoute>) {
        let config = self.config.get();
        let route = PropertyRoute::new(config.name.clone(), Arc::clone(node), config.retained);
        self.route = Some(Arc::new(route));
    }

    fn route(&self) -> Result<&Arc<PropertyRoute>> {
        self.route.as_ref().ok_or(DeviceError::NotInitialized)
    }

    fn config_mut(&mut self) -> Result<&mut PropertyConfig> {
        Ok(self.config.get_mut(Self::ENTITY)?)
    }

    pub fn friendly_name(&self) -> &str {
        &self.config.get().friendly_name
    }

    pub fn datatype(&self) -> DataType {
        self.config.get().datatype
    }

    pub fn unit(&self) -> Option<&str> {
        self.config.get().unit.as_deref()
    }

    pub fn format(&self) -> Option<&str> {
        self.config.get().format.as_deref()
    }

    pub fn retained(&self) -> bool {
        self.config.get().retained
    }

    pub fn settable(&self) -> bool {
        self.config.get().settable
    }

    pub fn set_friendly_name(&mut self, friendly_name: impl Into<String>) -> Result<()> {
        self.config_mut()?.friendly_name = friendly_name.into();
        Ok(())
    }

    pub fn set_datatype(&mut self, datatype: DataType) -> Result<()> {
        self.config_mut()?.datatype = datatype;
        Ok(())
    }

    pub fn set_unit(&mut self, unit: Option<String>) -> Result<()> {
        self.config_mut()?.unit = unit;
        Ok(())
    }

    pub fn set_format(&mut self, format: Option<String>) -> Result<()> {
        self.config_mut()?.format = format;
        Ok(())
    }

    pub fn set_retained(&mut self, retained: bool) -> Result<()> {
        self.config_mut()?.retained = retained;
        if let Some(route) = &self.route {
            route.set_retained(retained);
        }
        Ok(())
    }

    pub fn set_settable(&mut self, settable: bool) -> Result<()> {
        self.config_mut()?.settable = settable;
        Ok(())
    }

    pub fn on_event<F>(&mut self, handler: F)
    where
        F: FnMut(&TopologyEvent) + Send + 'static,
    {
        self.lifecycle.on_event(handler);
    }

    /// Register a handler for `/set` commands
    pub fn on_set<F>(&mut self, handler: F)
    where
        F: FnMut(&SetEvent) + Send + 'static,
    {
        self.set_listeners.add(handler);
    }

    /// Deliver a `/set` command to the handlers
    ///
    /// Fails with [`Error::NotSettable`] when the property is not settable.
    pub fn invoke_setter(&mut self, range: RangeDescriptor, value: Option<String>) -> Result<()> {
        if !self.settable() {
            return Err(Error::NotSettable(self.config.get().name.clone()).into());
        }
        debug!(parent: self.lifecycle.span(), ?range, "set");
        self.set_listeners.emit(&SetEvent { range, value });
        Ok(())
    }

    /// Publish a new value, honoring the retained flag
    ///
    /// `index` is required for properties of a range node and refused
    /// otherwise.
    pub fn publish_value(&self, value: impl fmt::Display, index: Option<i64>) -> Result<()> {
        let route = self.route()?;
        route
            .node()
            .publish_property_value(route.name(), &value.to_string(), self.retained(), index)
    }

    /// Handle for publishing values without access to the property
    pub fn publisher(&self) -> Result<PropertyPublisher> {
        Ok(PropertyPublisher::new(Arc::clone(self.route()?)))
    }

    fn announce(&self) -> Result<()> {
        let config = self.config.get();
        self.publish_attributes(&[
            ("datatype", Some(config.datatype.to_string())),
            ("format", config.format.clone()),
            ("name", Some(config.friendly_name.clone())),
            ("retained", Some(config.retained.to_string())),
            ("settable", Some(config.settable.to_string())),
            ("unit", config.unit.clone()),
        ])
    }
}

impl Addressable for Property {
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

impl Configurable for Property {
    type Config = PropertyConfig;
    const ENTITY: &'static str = "Property";

    fn config_holder(&self) -> &ConfigHolder<PropertyConfig> {
        &self.config
    }
}

impl Connectable for Property {
    fn connection_state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    fn on_connect(&mut self) -> Result<()> {
        self.config.freeze();
        self.lifecycle.connect();
        self.announce()
    }

    fn on_disconnect(&mut self) {
        self.lifecycle.disconnect();
    }

    fn on_offline(&mut self) {
        self.lifecycle.offline();
    }

    fn on_error(&mut self, err: &Arc<TransportError>) {
        self.lifecycle.error(err);
    }

    fn on_stats_interval(&mut self) -> Result<()> {
        self.lifecycle.stats_interval();
        Ok(())
    }
}
