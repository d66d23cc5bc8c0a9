//! Capabilities shared by devices, nodes and properties

use homie_core::{address, ConfigHolder, ConnectionState, Error, PublishOptions};
use homie_transport::TransportError;
use std::sync::Arc;

use crate::error::Result;

/// Attribute or statistic name with an optional value; `None` is skipped
pub type Attribute<'a> = (&'a str, Option<String>);

/// Entities with a place in the topic tree
///
/// An entity prefixes every path with its own name and hands the result to
/// its parent; the device at the root prefixes the base topic and talks to
/// the transport.
pub trait Addressable {
    /// Topic segment of this entity
    fn name(&self) -> &str;

    /// Pass an already prefixed path up the chain
    fn raw_publish(&self, path: &str, value: &str, options: PublishOptions) -> Result<()>;

    fn raw_subscribe(&self, path: &str) -> Result<()>;

    /// Publish `value` at `path` below this entity
    fn publish(&self, path: &str, value: &str, options: impl Into<PublishOptions>) -> Result<()>
    where
        Self: Sized,
    {
        self.raw_publish(&address::join(self.name(), path), value, options.into())
    }

    fn subscribe(&self, path: &str) -> Result<()> {
        self.raw_subscribe(&address::join(self.name(), path))
    }

    /// Publish `$name` below this entity, always retained
    fn publish_attribute(&self, name: &str, value: &str) -> Result<()>
    where
        Self: Sized,
    {
        self.publish(&address::attribute_path(name), value, true)
    }

    fn publish_attributes(&self, attributes: &[Attribute<'_>]) -> Result<()>
    where
        Self: Sized,
    {
        for (name, value) in attributes {
            if let Some(value) = value {
                self.publish_attribute(name, value)?;
            }
        }
        Ok(())
    }

    /// Publish each entry under `$stats/`, not retained
    fn publish_stats(&self, stats: &[Attribute<'_>]) -> Result<()>
    where
        Self: Sized,
    {
        for (name, value) in stats {
            if let Some(value) = value {
                self.publish(&address::stats_path(name), value, false)?;
            }
        }
        Ok(())
    }
}

/// Entities that follow the transport's connectivity
pub trait Connectable {
    fn connection_state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.connection_state().is_connected()
    }

    /// Freeze configuration, announce the entity, then cascade to children
    fn on_connect(&mut self) -> Result<()>;

    fn on_disconnect(&mut self);

    fn on_offline(&mut self);

    fn on_error(&mut self, err: &Arc<TransportError>);

    fn on_stats_interval(&mut self) -> Result<()>;
}

/// Entities whose configuration freezes on first connect
pub trait Configurable {
    type Config;

    /// Entity kind used in error messages
    const ENTITY: &'static str;

    fn config_holder(&self) -> &ConfigHolder<Self::Config>;

    fn config(&self) -> &Self::Config {
        self.config_holder().get()
    }

    fn is_configurable(&self) -> bool {
        self.config_holder().is_configurable()
    }

    fn assert_configurable(&self) -> Result<()> {
        if self.is_configurable() {
            Ok(())
        } else {
            Err(Error::NotConfigurable {
                entity: Self::ENTITY,
            }
            .into())
        }
    }
}
