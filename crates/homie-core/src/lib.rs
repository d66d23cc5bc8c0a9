//! Homie Core
//!
//! Addressing, data types and configuration primitives shared by every
//! Homie topology entity.
//!
//! This crate provides:
//! - Topic composition and inbound topic parsing ([`Topic`], [`NodeAddress`])
//! - Property data types and publication options ([`DataType`], [`PublishOptions`])
//! - The configure-then-freeze holder ([`ConfigHolder`], [`Frozen`])
//! - Synchronous listener registries ([`Listeners`])

pub mod address;
pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use address::{NodeAddress, SetCommand, Topic};
pub use config::{ConfigHolder, Frozen};
pub use error::{Error, Result};
pub use events::Listeners;
pub use types::*;

/// Homie convention version announced in `$homie`
pub const HOMIE_VERSION: &str = "3.0.1";

/// Default base topic
pub const DEFAULT_BASE_TOPIC: &str = "homie";

/// Default statistics interval in seconds
pub const DEFAULT_STATS_INTERVAL: u64 = 60;

/// Path separator between topic segments
pub const PATH_SEPARATOR: char = '/';

/// Separator between a range node name and its index (`relay_3`)
pub const RANGE_SEPARATOR: char = '_';

/// Topic segment that marks the shared broadcast subtree
pub const BROADCAST_SEGMENT: &str = "$broadcast";

/// Trailing topic segment of an inbound property set command
pub const SET_SEGMENT: &str = "set";
