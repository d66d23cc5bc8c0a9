//! Publication routes from entities to the transport
//!
//! Each entity gets a route once its device is set up. A route knows its own
//! topic segment and shares its parent's route, so a property can publish
//! without borrowing the node or device that owns it.

use homie_core::{address, Error, IndexRange, PublishOptions};
use homie_transport::TransportHandle;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::traits::Addressable;

/// Root of the chain: base topic plus transport handle
pub struct DeviceRoute {
    name: String,
    base_topic: String,
    transport: Arc<dyn TransportHandle>,
}

impl DeviceRoute {
    pub fn new(
        name: impl Into<String>,
        base_topic: impl Into<String>,
        transport: Arc<dyn TransportHandle>,
    ) -> Self {
        Self {
            name: name.into(),
            base_topic: base_topic.into(),
            transport,
        }
    }

    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    pub fn transport(&self) -> &Arc<dyn TransportHandle> {
        &self.transport
    }

    /// Subscribe to `{base}/$broadcast/#`
    pub fn subscribe_broadcast(&self) -> Result<()> {
        let topic = address::join(&self.base_topic, &format!("{}/#", homie_core::BROADCAST_SEGMENT));
        self.transport.subscribe(&topic)?;
        Ok(())
    }
}

impl Addressable for DeviceRoute {
    fn name(&self) -> &str {
        &self.name
    }

    fn raw_publish(&self, path: &str, value: &str, options: PublishOptions) -> Result<()> {
        let topic = address::join(&self.base_topic, path);
        self.transport.publish(&topic, value, options)?;
        Ok(())
    }

    fn raw_subscribe(&self, path: &str) -> Result<()> {
        self.transport.subscribe(&address::join(&self.base_topic, path))?;
        Ok(())
    }
}

impl fmt::Debug for DeviceRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRoute")
            .field("name", &self.name)
            .field("base_topic", &self.base_topic)
            .finish_non_exhaustive()
    }
}

/// Topic segment of a node for one publication
///
/// A range node needs an index inside its interval; a plain node takes none.
pub fn resolve_segment(
    node: &str,
    range: Option<IndexRange>,
    index: Option<i64>,
) -> homie_core::Result<String> {
    match (range, index) {
        (Some(range), Some(index)) if range.contains(index) => {
            Ok(address::node_segment(node, Some(index)))
        }
        (Some(range), Some(index)) => Err(Error::RangeIndexOutOfBounds {
            node: node.to_string(),
            index,
            start: range.start,
            end: range.end,
        }),
        (Some(_), None) => Err(Error::RangeIndexRequired {
            node: node.to_string(),
        }),
        (None, Some(index)) => Err(Error::RangeIndexNotAllowed {
            node: node.to_string(),
            index,
        }),
        (None, None) => Ok(node.to_string()),
    }
}

#[derive(Debug)]
pub struct NodeRoute {
    name: String,
    range: Option<IndexRange>,
    parent: Arc<DeviceRoute>,
}

impl NodeRoute {
    pub fn new(name: impl Into<String>, range: Option<IndexRange>, parent: Arc<DeviceRoute>) -> Self {
        Self {
            name: name.into(),
            range,
            parent,
        }
    }

    /// Publish a property value at `{node}[_{index}]/{property}`
    pub fn publish_property_value(
        &self,
        property: &str,
        value: &str,
        retained: bool,
        index: Option<i64>,
    ) -> Result<()> {
        let segment = resolve_segment(&self.name, self.range, index)?;
        self.parent
            .publish(&format!("{}/{}", segment, property), value, retained)
    }
}

impl Addressable for NodeRoute {
    fn name(&self) -> &str {
        &self.name
    }

    fn raw_publish(&self, path: &str, value: &str, options: PublishOptions) -> Result<()> {
        self.parent.publish(path, value, options)
    }

    fn raw_subscribe(&self, path: &str) -> Result<()> {
        self.parent.subscribe(path)
    }
}

#[derive(Debug)]
pub struct PropertyRoute {
    name: String,
    parent: Arc<NodeRoute>,
    /// Mirrors the property's retained flag until it freezes
    retained: AtomicBool,
}

impl PropertyRoute {
    pub fn new(name: impl Into<String>, parent: Arc<NodeRoute>, retained: bool) -> Self {
        Self {
            name: name.into(),
            parent,
            retained: AtomicBool::new(retained),
        }
    }

    pub fn node(&self) -> &NodeRoute {
        &self.parent
    }

    pub fn retained(&self) -> bool {
        self.retained.load(Ordering::Relaxed)
    }

    pub(crate) fn set_retained(&self, retained: bool) {
        self.retained.store(retained, Ordering::Relaxed);
    }
}

impl Addressable for PropertyRoute {
    fn name(&self) -> &str {
        &self.name
    }

    fn raw_publish(&self, path: &str, value: &str, options: PublishOptions) -> Result<()> {
        self.parent.publish(path, value, options)
    }

    fn raw_subscribe(&self, path: &str) -> Result<()> {
        self.parent.subscribe(path)
    }
}

/// Detached handle for publishing one property's value
///
/// Cheap to clone and usable from other tasks. The retained flag is read
/// from the property on every publish.
#[derive(Debug, Clone)]
pub struct PropertyPublisher {
    route: Arc<PropertyRoute>,
}

impl PropertyPublisher {
    pub(crate) fn new(route: Arc<PropertyRoute>) -> Self {
        Self { route }
    }

    pub fn property(&self) -> &str {
        self.route.name()
    }

    /// Publish `value`, with `index` selecting the instance of a range node
    pub fn publish(&self, value: impl fmt::Display, index: Option<i64>) -> Result<()> {
        self.route.node().publish_property_value(
            self.route.name(),
            &value.to_string(),
            self.route.retained(),
            index,
        )
    }
}
