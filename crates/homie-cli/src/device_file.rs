//! Device description files
//!
//! A TOML file with a `[device]` table and one `[[nodes]]` table per node,
//! each carrying its `[[nodes.properties]]`.

use anyhow::{Context, Result};
use homie_device::{Device, DeviceConfig, NodeConfig, PropertyConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceFile {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeEntry {
    #[serde(flatten)]
    pub node: NodeConfig,
    #[serde(default)]
    pub properties: Vec<PropertyConfig>,
}

/// `<config dir>/homie/device.toml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("homie").join("device.toml"))
}

impl DeviceFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid device file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: DeviceFile = toml::from_str(content)?;
        if file.device.name.is_empty() {
            anyhow::bail!("device.name is required");
        }
        Ok(file)
    }

    /// Build the device topology; nothing is connected yet
    pub fn build(self) -> Result<Device> {
        let mut device = Device::new(self.device)?;
        for entry in self.nodes {
            let name = entry.node.name.clone();
            let node = device
                .add_node(entry.node)
                .with_context(|| format!("Invalid node {:?}", name))?;
            for property in entry.properties {
                let property_name = property.name.clone();
                node.add_property(property)
                    .with_context(|| format!("Invalid property {:?} on node {:?}", property_name, name))?;
            }
        }
        Ok(device)
    }
}
