//! Configuration records for devices, nodes and properties
//!
//! Every record deserializes with defaults for missing fields, so a partial
//! TOML or JSON document is enough to describe an entity.

use homie_core::{DataType, Error, IndexRange, DEFAULT_BASE_TOPIC, DEFAULT_STATS_INTERVAL};
use homie_transport::ConnectOptions;
use serde::{Deserialize, Serialize};

/// What to do with a `/set` command whose range index lies outside the
/// node's declared range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfRangePolicy {
    /// Deliver to the property setter anyway
    #[default]
    Deliver,
    /// Drop silently
    Drop,
    /// Report an error to the caller
    Reject,
}

/// Device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Topic segment identifying the device
    pub name: String,
    /// Human readable name, published as `$name`
    pub friendly_name: String,
    /// Root of every topic
    pub base_topic: String,
    /// Transport connection options
    pub mqtt: ConnectOptions,
    /// Seconds between statistics publications
    pub stats_interval: u64,
    pub firmware_name: Option<String>,
    pub firmware_version: Option<String>,
    /// Published as `$localip`
    pub ip: Option<String>,
    pub mac: Option<String>,
    /// Free-form settings, opaque to the device
    pub settings: serde_json::Value,
    /// Handling of out-of-range `/set` indices
    pub out_of_range: OutOfRangePolicy,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            friendly_name: "unknown".to_string(),
            base_topic: DEFAULT_BASE_TOPIC.to_string(),
            mqtt: ConnectOptions::default(),
            stats_interval: DEFAULT_STATS_INTERVAL,
            firmware_name: None,
            firmware_version: None,
            ip: None,
            mac: None,
            settings: serde_json::Value::Object(Default::default()),
            out_of_range: OutOfRangePolicy::default(),
        }
    }
}

impl DeviceConfig {
    /// Defaults with `name` used for both the topic segment and `$name`
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            friendly_name: name.clone(),
            name,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> homie_core::Result<()> {
        if self.stats_interval == 0 {
            return Err(Error::InvalidStatsInterval);
        }
        Ok(())
    }
}

/// Node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub name: String,
    pub friendly_name: String,
    /// Published as `$type`
    #[serde(rename = "type")]
    pub node_type: String,
    pub is_range: bool,
    pub start_range: Option<i64>,
    pub end_range: Option<i64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            friendly_name: String::new(),
            node_type: "switch".to_string(),
            is_range: false,
            start_range: None,
            end_range: None,
        }
    }
}

impl NodeConfig {
    pub fn new(name: impl Into<String>, friendly_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            friendly_name: friendly_name.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = node_type.into();
        self
    }

    /// Declare the node as a range node over `[start, end]`
    pub fn with_range(mut self, start: i64, end: i64) -> Self {
        self.is_range = true;
        self.start_range = Some(start);
        self.end_range = Some(end);
        self
    }

    /// Check the naming and range rules
    pub fn validate(&self) -> homie_core::Result<()> {
        if self.name.contains(homie_core::RANGE_SEPARATOR) {
            return Err(Error::InvalidNodeName(self.name.clone()));
        }
        if self.is_range {
            if self.start_range.is_none() {
                return Err(Error::MissingRangeBound {
                    node: self.name.clone(),
                    bound: "start_range",
                });
            }
            if self.end_range.is_none() {
                return Err(Error::MissingRangeBound {
                    node: self.name.clone(),
                    bound: "end_range",
                });
            }
        }
        Ok(())
    }

    /// Declared interval of a range node
    pub fn index_range(&self) -> Option<IndexRange> {
        match (self.is_range, self.start_range, self.end_range) {
            (true, Some(start), Some(end)) => Some(IndexRange::new(start, end)),
            _ => None,
        }
    }
}

/// Property configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyConfig {
    pub name: String,
    pub friendly_name: String,
    pub datatype: DataType,
    pub unit: Option<String>,
    /// Published as `$format`, e.g. `0:100` or `on,off`
    pub format: Option<String>,
    /// Whether value publications are retained by the broker
    pub retained: bool,
    /// Whether `/set` commands reach the setter
    pub settable: bool,
}

impl Default for PropertyConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            friendly_name: String::new(),
            datatype: DataType::default(),
            unit: None,
            format: None,
            retained: false,
            settable: true,
        }
    }
}

impl PropertyConfig {
    pub fn new(name: impl Into<String>, friendly_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            friendly_name: friendly_name.into(),
            ..Default::default()
        }
    }

    pub fn with_datatype(mut self, datatype: DataType) -> Self {
        self.datatype = datatype;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn retained(mut self, retained: bool) -> Self {
        self.retained = retained;
        self
    }

    pub fn settable(mut self, settable: bool) -> Self {
        self.settable = settable;
        self
    }
}
