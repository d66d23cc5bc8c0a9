//! Inbound message routing
//!
//! Every message from the transport lands here. Broadcasts go to the
//! broadcast listeners only. Anything else goes to the generic and
//! per-topic listeners, and `/set` commands for this device are then
//! dispatched to the addressed property.

use homie_core::{Error, RangeDescriptor, SetCommand, Topic};
use tracing::{debug, warn};

use crate::config::OutOfRangePolicy;
use crate::device::Device;
use crate::error::Result;
use crate::traits::{Addressable, Configurable};

/// Message as seen by device listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic with the base and device segments removed
    pub topic: String,
    pub payload: Option<String>,
}

/// Why a `/set` command reached no property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnknownNode,
    /// Range index on a plain node, or none on a range node
    RangeMismatch,
    UnknownProperty,
    MalformedRangeIndex,
    OutOfRange,
}

/// What happened to one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Broadcast,
    /// Not a `/set` command for this device; listeners only
    Unaddressed,
    Delivered {
        node: String,
        property: String,
        range: RangeDescriptor,
    },
    Dropped(DropReason),
}

impl Device {
    /// Route one inbound message
    ///
    /// Fails when the addressed property is not settable, or when an
    /// out-of-range index meets [`OutOfRangePolicy::Reject`].
    pub fn handle_message(&mut self, topic: &str, payload: Option<String>) -> Result<RouteOutcome> {
        let topic = Topic::parse(topic);
        let message = InboundMessage {
            topic: topic.device_topic(),
            payload,
        };

        if topic.is_broadcast() {
            self.broadcast_listeners.emit(&message);
            return Ok(RouteOutcome::Broadcast);
        }

        self.message_listeners.emit(&message);
        if let Some(listeners) = self.topic_listeners.get_mut(&message.topic) {
            listeners.emit(&message.payload);
        }

        match topic.set_command(self.name()) {
            None => Ok(RouteOutcome::Unaddressed),
            Some(Err(e)) => {
                warn!(parent: self.span(), "Dropping {}: {}", topic.as_str(), e);
                Ok(RouteOutcome::Dropped(DropReason::MalformedRangeIndex))
            }
            Some(Ok(command)) => self.dispatch(command, message.payload),
        }
    }

    fn dispatch(&mut self, command: SetCommand, payload: Option<String>) -> Result<RouteOutcome> {
        let policy = self.config().out_of_range;
        let SetCommand { node: address, property } = command;

        let Some(node) = self.nodes.iter_mut().find(|n| n.name() == address.name) else {
            debug!("No node {:?}, dropping set", address.name);
            return Ok(RouteOutcome::Dropped(DropReason::UnknownNode));
        };

        if node.is_range() != address.range.is_range() {
            debug!("Range mismatch for node {:?}, dropping set", address.name);
            return Ok(RouteOutcome::Dropped(DropReason::RangeMismatch));
        }

        if let (Some(range), Some(index)) = (node.index_range(), address.range.index()) {
            if !range.contains(index) {
                match policy {
                    OutOfRangePolicy::Deliver => {}
                    OutOfRangePolicy::Drop => {
                        debug!("Index {} outside {} of {:?}, dropping set", index, range, address.name);
                        return Ok(RouteOutcome::Dropped(DropReason::OutOfRange));
                    }
                    OutOfRangePolicy::Reject => {
                        return Err(Error::RangeIndexOutOfBounds {
                            node: address.name,
                            index,
                            start: range.start,
                            end: range.end,
                        }
                        .into());
                    }
                }
            }
        }

        let Some(target) = node.property_mut(&property) else {
            debug!("No property {:?} on {:?}, dropping set", property, address.name);
            return Ok(RouteOutcome::Dropped(DropReason::UnknownProperty));
        };

        target.invoke_setter(address.range, payload)?;
        Ok(RouteOutcome::Delivered {
            node: address.name,
            property,
            range: address.range,
        })
    }
}
