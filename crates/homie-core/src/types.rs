//! Property data types, publication options and connectivity state

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Property data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Integer,
    Float,
    Boolean,
    #[default]
    String,
    Enum,
    Color,
}

impl DataType {
    /// Name announced in the `$datatype` attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Boolean => "boolean",
            DataType::String => "string",
            DataType::Enum => "enum",
            DataType::Color => "color",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integer" => Ok(DataType::Integer),
            "float" => Ok(DataType::Float),
            "boolean" => Ok(DataType::Boolean),
            "string" => Ok(DataType::String),
            "enum" => Ok(DataType::Enum),
            "color" => Ok(DataType::Color),
            other => Err(Error::UnknownDataType(other.to_string())),
        }
    }
}

/// Quality of Service levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

/// Options attached to a single publication
///
/// `PublishOptions::default()` resolves to the transport defaults. A bare
/// `bool` converts into options with only `retain` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishOptions {
    pub retain: bool,
    pub qos: QoS,
}

impl PublishOptions {
    pub fn retained() -> Self {
        Self {
            retain: true,
            ..Default::default()
        }
    }
}

impl From<bool> for PublishOptions {
    fn from(retain: bool) -> Self {
        Self {
            retain,
            ..Default::default()
        }
    }
}

impl From<Option<PublishOptions>> for PublishOptions {
    fn from(options: Option<PublishOptions>) -> Self {
        options.unwrap_or_default()
    }
}

/// Connectivity of a topology entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
    Offline,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Range addressing of an inbound set command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RangeDescriptor {
    /// Plain node, no index in the address
    #[default]
    Single,
    /// Range node instance with its parsed index
    Index(i64),
}

impl RangeDescriptor {
    pub fn is_range(&self) -> bool {
        matches!(self, RangeDescriptor::Index(_))
    }

    pub fn index(&self) -> Option<i64> {
        match self {
            RangeDescriptor::Single => None,
            RangeDescriptor::Index(i) => Some(*i),
        }
    }
}

/// Declared closed interval `[start, end]` of a range node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRange {
    pub start: i64,
    pub end: i64,
}

impl IndexRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, index: i64) -> bool {
        index >= self.start && index <= self.end
    }
}

/// Rendered as the `$array` attribute value
impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datatype_names() {
        assert_eq!(DataType::Integer.to_string(), "integer");
        assert_eq!(DataType::Color.to_string(), "color");
        assert_eq!("enum".parse::<DataType>().unwrap(), DataType::Enum);
        assert!("decimal".parse::<DataType>().is_err());
    }

    #[test]
    fn test_publish_options_from_bool() {
        assert!(PublishOptions::from(true).retain);
        assert!(!PublishOptions::from(false).retain);
        assert_eq!(PublishOptions::from(None), PublishOptions::default());
        assert_eq!(PublishOptions::default().qos, QoS::AtMostOnce);
    }

    #[test]
    fn test_index_range() {
        let range = IndexRange::new(0, 3);
        assert!(range.contains(0));
        assert!(range.contains(3));
        assert!(!range.contains(-1));
        assert!(!range.contains(4));
        assert_eq!(range.to_string(), "0-3");
    }

    #[test]
    fn test_range_descriptor() {
        assert!(!RangeDescriptor::Single.is_range());
        assert_eq!(RangeDescriptor::Single.index(), None);
        assert_eq!(RangeDescriptor::Index(2).index(), Some(2));
    }
}
