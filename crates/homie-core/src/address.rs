//! Topic composition and parsing
//!
//! Homie topics follow this layout:
//! ```text
//! {base}/{device}/$attribute
//! {base}/{device}/{node}/{property}
//! {base}/{device}/{node}_{index}/{property}/set
//! {base}/$broadcast/{level}
//! ```
//!
//! Outbound paths are composed structurally: every entity prefixes its own
//! name segment and hands the result to its parent. Inbound topics are split
//! back into segments and classified by [`Topic`].

use crate::{
    Error, RangeDescriptor, Result, BROADCAST_SEGMENT, PATH_SEPARATOR, RANGE_SEPARATOR,
    SET_SEGMENT,
};

/// Prefix `path` with `segment`, dropping one leading separator from `path`
pub fn join(segment: &str, path: &str) -> String {
    let path = path.strip_prefix(PATH_SEPARATOR).unwrap_or(path);
    format!("{}{}{}", segment, PATH_SEPARATOR, path)
}

/// Path of an attribute relative to its entity (`$name`, `$stats/uptime`)
pub fn attribute_path(name: &str) -> String {
    format!("${}", name)
}

/// Path of a statistic relative to its entity
pub fn stats_path(name: &str) -> String {
    format!("$stats{}{}", PATH_SEPARATOR, name)
}

/// Node segment of a property value topic
pub fn node_segment(node: &str, index: Option<i64>) -> String {
    match index {
        Some(index) => format!("{}{}{}", node, RANGE_SEPARATOR, index),
        None => node.to_string(),
    }
}

/// An inbound transport topic split into segments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    raw: String,
    segments: Vec<String>,
}

impl Topic {
    /// Split a raw topic on the path separator
    pub fn parse(s: &str) -> Self {
        Self {
            raw: s.to_string(),
            segments: s.split(PATH_SEPARATOR).map(|s| s.to_string()).collect(),
        }
    }

    /// Get the raw topic string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Get the topic segments
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    fn segment(&self, i: usize) -> Option<&str> {
        self.segments.get(i).map(|s| s.as_str())
    }

    /// The base topic (segment 0)
    pub fn base(&self) -> Option<&str> {
        self.segment(0)
    }

    /// The device name or broadcast marker (segment 1)
    pub fn target(&self) -> Option<&str> {
        self.segment(1)
    }

    /// Check if this topic lives in the broadcast subtree
    pub fn is_broadcast(&self) -> bool {
        self.target() == Some(BROADCAST_SEGMENT)
    }

    /// Everything after the device name (or broadcast marker), rejoined
    pub fn device_topic(&self) -> String {
        self.segments
            .get(2..)
            .map(|rest| rest.join("/"))
            .unwrap_or_default()
    }

    /// Interpret this topic as a set command addressed to `device`
    ///
    /// Returns `None` when the topic is not a set command for that device.
    /// A set command whose node segment carries a non-numeric range index
    /// yields `Some(Err(..))`.
    pub fn set_command(&self, device: &str) -> Option<Result<SetCommand>> {
        if self.target() != Some(device) || self.segment(4) != Some(SET_SEGMENT) {
            return None;
        }
        let node = self.segment(2)?;
        let property = self.segment(3)?;

        Some(NodeAddress::parse(node).map(|node| SetCommand {
            node,
            property: property.to_string(),
        }))
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Node segment of an inbound topic, split into name and range
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    pub name: String,
    pub range: RangeDescriptor,
}

impl NodeAddress {
    /// Parse `relay_3` into (`relay`, index 3) or `sensor` into a plain address
    pub fn parse(segment: &str) -> Result<Self> {
        match segment.split_once(RANGE_SEPARATOR) {
            Some((name, index)) => {
                let index = index
                    .parse::<i64>()
                    .map_err(|_| Error::InvalidRangeIndex(segment.to_string()))?;
                Ok(Self {
                    name: name.to_string(),
                    range: RangeDescriptor::Index(index),
                })
            }
            None => Ok(Self {
                name: segment.to_string(),
                range: RangeDescriptor::Single,
            }),
        }
    }
}

/// A parsed `{node}[_{index}]/{property}/set` command
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SetCommand {
    pub node: NodeAddress,
    pub property: String,
}
