//! Homie Transport Layer
//!
//! The publish/subscribe capability a Homie device depends on:
//! - [`Connector`] opens a connection from [`ConnectOptions`]
//! - [`TransportHandle`] issues fire-and-forget publish/subscribe/end requests
//! - [`TransportEvent`] carries lifecycle notifications and inbound messages
//!
//! An MQTT implementation backed by rumqttc is available with the `mqtt`
//! feature (enabled by default).

pub mod error;
pub mod options;
pub mod traits;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use error::{Result, TransportError};
pub use options::{ConnectOptions, LastWill};
pub use traits::{Connection, Connector, TransportEvent, TransportHandle};

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttConnector, MqttTransport};
