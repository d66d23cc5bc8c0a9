//! Connection options

use homie_core::QoS;
use serde::{Deserialize, Serialize};

/// Message the broker publishes when the client vanishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastWill {
    pub topic: String,
    pub payload: String,
    #[serde(default)]
    pub qos: QoS,
    #[serde(default)]
    pub retain: bool,
}

impl LastWill {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            retain: false,
        }
    }

    pub fn retained(mut self) -> Self {
        self.retain = true;
        self
    }
}

/// Transport connection options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    /// Broker host
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Client ID for the connection
    pub client_id: String,
    /// Optional username for authentication
    pub username: Option<String>,
    /// Optional password for authentication
    pub password: Option<String>,
    /// Keep alive interval in seconds
    pub keep_alive_secs: u16,
    /// Start with a clean session
    pub clean_session: bool,
    /// Last will, set by the device on setup
    pub last_will: Option<LastWill>,
    /// Capacity of the rumqttc request queue; requests beyond it wait in
    /// the transport
    pub capacity: usize,
}

fn default_client_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("homie-{}", &id[..8])
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: default_client_id(),
            username: None,
            password: None,
            keep_alive_secs: 60,
            clean_session: true,
            last_will: None,
            capacity: 100,
        }
    }
}

impl ConnectOptions {
    /// Copy of these options carrying `will`
    pub fn with_last_will(&self, will: LastWill) -> Self {
        Self {
            last_will: Some(will),
            ..self.clone()
        }
    }
}
