//! Homie device library
//!
//! Models a device as a tree of nodes and properties and keeps it in step
//! with a publish/subscribe transport following the Homie 3.0.1 convention.
//!
//! # Example
//!
//! ```ignore
//! use homie_device::prelude::*;
//! use homie_transport::MqttConnector;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut device = Device::named("living-room");
//!     let node = device.add_node(NodeConfig::new("light", "Ceiling light"))?;
//!     let power = node.add_property(PropertyConfig::new("power", "Power").retained(true))?;
//!     power.on_set(|event| println!("power -> {:?}", event.value));
//!
//!     device.setup(&MqttConnector::new())?;
//!     device.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod lifecycle;
pub mod node;
pub mod property;
pub mod route;
pub mod router;
pub mod stats;
pub mod traits;

pub use config::{DeviceConfig, NodeConfig, OutOfRangePolicy, PropertyConfig};
pub use device::Device;
pub use error::{DeviceError, Result};
pub use lifecycle::{Lifecycle, TopologyEvent};
pub use node::Node;
pub use property::{Property, SetEvent};
pub use route::PropertyPublisher;
pub use router::{DropReason, InboundMessage, RouteOutcome};
pub use traits::{Addressable, Configurable, Connectable};

/// Announced as `$implementation`
pub const IMPLEMENTATION: &str = concat!("rust:", env!("CARGO_PKG_NAME"));

/// Announced as `$implementation/version`
pub const IMPLEMENTATION_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{DeviceConfig, NodeConfig, OutOfRangePolicy, PropertyConfig};
    pub use crate::device::Device;
    pub use crate::error::{DeviceError, Result};
    pub use crate::lifecycle::TopologyEvent;
    pub use crate::node::Node;
    pub use crate::property::{Property, SetEvent};
    pub use crate::route::PropertyPublisher;
    pub use crate::traits::{Addressable, Configurable, Connectable};
    pub use homie_core::{DataType, RangeDescriptor};
}
