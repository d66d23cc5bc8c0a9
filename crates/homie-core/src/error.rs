//! Error types for Homie topology entities

use thiserror::Error;

/// Result type alias for topology operations
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration and routing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Mutation attempted after the entity connected
    #[error("this {entity} is no longer configurable; all configuration must occur prior to connecting")]
    NotConfigurable { entity: &'static str },

    /// Node names may not contain the range separator
    #[error("a node name cannot include an underscore, got {0:?}")]
    InvalidNodeName(String),

    /// Range node declared without one of its bounds
    #[error("node {node:?} has is_range=true but {bound} is undefined")]
    MissingRangeBound { node: String, bound: &'static str },

    /// A node with this name is already registered
    #[error("duplicate node: {0}")]
    DuplicateNode(String),

    /// A property with this name is already registered on the node
    #[error("duplicate property {property:?} on node {node:?}")]
    DuplicateProperty { node: String, property: String },

    /// Publishing on a range node without an index
    #[error("node {node:?} is a range node and requires a range index")]
    RangeIndexRequired { node: String },

    /// Publishing on a plain node with an index
    #[error("node {node:?} is not a range node, range index {index} is invalid")]
    RangeIndexNotAllowed { node: String, index: i64 },

    /// Range index outside the declared `[start, end]` interval
    #[error("range index {index} is outside {start}-{end} of node {node:?}")]
    RangeIndexOutOfBounds {
        node: String,
        index: i64,
        start: i64,
        end: i64,
    },

    /// Setter invoked on a property that is not settable
    #[error("property {0:?} is not settable")]
    NotSettable(String),

    /// Range index in a node address is not an integer
    #[error("invalid range index in node address {0:?}")]
    InvalidRangeIndex(String),

    /// Unknown property data type name
    #[error("unknown data type: {0}")]
    UnknownDataType(String),

    /// Statistics interval must be positive
    #[error("stats interval must be greater than zero")]
    InvalidStatsInterval,
}
