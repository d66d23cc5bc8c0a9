//! Homie CLI - run a Homie device described in a TOML file
//!
//! Connects the device to an MQTT broker, announces its topology and keeps
//! it alive until interrupted.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use homie_device::{Addressable, Device, Property};
use homie_transport::MqttConnector;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod device_file;

use device_file::DeviceFile;

/// How long to wait for the broker to acknowledge the final disconnect
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Homie - run devices following the Homie MQTT convention
#[derive(Parser)]
#[command(name = "homie")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Device file path
    #[arg(short, long, global = true, env = "HOMIE_DEVICE_FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect the device and run until interrupted
    Run {
        /// MQTT broker host, overriding the device file
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// MQTT broker port, overriding the device file
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not publish values received on `/set` topics back as the
        /// property's new value
        #[arg(long)]
        no_echo: bool,
    },

    /// Validate the device file and print the topology
    Check,

    /// Show version and convention info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Commands::Run {
            host,
            port,
            no_echo,
        } => {
            let mut file = DeviceFile::load(&resolve_path(cli.config)?)?;
            if let Some(host) = host {
                file.device.mqtt.host = host;
            }
            if let Some(port) = port {
                file.device.mqtt.port = port;
            }
            run_device(file, !no_echo).await?;
        }

        Commands::Check => {
            let path = resolve_path(cli.config)?;
            let device = DeviceFile::load(&path)?.build()?;
            println!("{} {} is valid", "✓".green().bold(), path.display());
            print_topology(&device);
        }

        Commands::Info => {
            print_info();
        }
    }

    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}

fn resolve_path(path: Option<PathBuf>) -> Result<PathBuf> {
    path.or_else(device_file::default_path)
        .context("No device file given and no config directory found")
}

async fn run_device(file: DeviceFile, echo: bool) -> Result<()> {
    let host = file.device.mqtt.host.clone();
    let port = file.device.mqtt.port;
    let mut device = file.build()?;

    println!(
        "{} Connecting {} to {}:{}",
        "HOMIE".cyan().bold(),
        device.name().green(),
        host,
        port
    );

    device.on_broadcast(|message| {
        info!(
            "Broadcast {}: {}",
            message.topic,
            message.payload.as_deref().unwrap_or_default()
        );
    });

    device.setup(&MqttConnector::new())?;
    if echo {
        install_echo(&mut device)?;
    }

    let interrupted = tokio::select! {
        result = device.run() => {
            result?;
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };

    if interrupted {
        info!("Received shutdown signal");
        device.end()?;
        if tokio::time::timeout(SHUTDOWN_GRACE, device.run()).await.is_err() {
            warn!("Transport did not close within {:?}", SHUTDOWN_GRACE);
        }
    }

    println!("{} Device stopped", "HOMIE".cyan().bold());
    Ok(())
}

/// Acknowledge `/set` commands by publishing the received value
fn install_echo(device: &mut Device) -> Result<()> {
    let targets: Vec<(String, String)> = device
        .nodes()
        .iter()
        .flat_map(|node| {
            node.properties()
                .iter()
                .filter(|p| p.settable())
                .map(move |p| (node.name().to_string(), p.name().to_string()))
        })
        .collect();

    for (node, property) in targets {
        let Some(target) = device
            .node_mut(&node)
            .and_then(|n| n.property_mut(&property))
        else {
            continue;
        };

        let publisher = target.publisher()?;
        target.on_set(move |event| {
            let value = event.value.as_deref().unwrap_or_default();
            if let Err(e) = publisher.publish(value, event.range.index()) {
                warn!("Echo for {} failed: {}", publisher.property(), e);
            }
        });
    }

    Ok(())
}

fn print_topology(device: &Device) {
    println!();
    println!("{} {} ({})", "Device".green(), device.name().bold(), device.friendly_name());
    println!("  base topic: {}", device.base_topic());
    println!("  stats:      every {}s", device.stats_interval());

    for node in device.nodes() {
        let array = node
            .index_range()
            .map(|range| format!(" [{}]", range))
            .unwrap_or_default();
        println!(
            "  {} {}{} ({}, {})",
            "node".cyan(),
            node.name().bold(),
            array,
            node.friendly_name(),
            node.node_type()
        );
        for property in node.properties() {
            print_property(property);
        }
    }
}

fn print_property(property: &Property) {
    let mut flags = Vec::new();
    if property.settable() {
        flags.push("settable");
    }
    if property.retained() {
        flags.push("retained");
    }
    println!(
        "    {} {}: {}{} {}",
        "property".yellow(),
        property.name(),
        property.datatype(),
        property
            .unit()
            .map(|unit| format!(" [{}]", unit))
            .unwrap_or_default(),
        flags.join(",").dimmed()
    );
}

fn print_info() {
    println!("{}", "Homie - MQTT convention for IoT devices".cyan().bold());
    println!();
    println!("Version:        {}", env!("CARGO_PKG_VERSION"));
    println!("Convention:     {}", homie_core::HOMIE_VERSION);
    println!("Implementation: {}", homie_device::IMPLEMENTATION);
    println!("Platform:       {}", std::env::consts::OS);
    println!("Arch:           {}", std::env::consts::ARCH);
    if let Some(path) = device_file::default_path() {
        println!("Device file:    {}", path.display());
    }
    println!();
    println!("{}", "Examples:".green());
    println!("  homie check -c garden.toml         # Validate a device file");
    println!("  homie run -c garden.toml           # Run the device");
    println!("  homie run -H broker.local          # Override the broker host");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::parse_from([
            "homie", "-c", "dev.toml", "run", "-H", "broker", "-p", "1884", "--no-echo",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("dev.toml")));
        match cli.command {
            Commands::Run {
                host,
                port,
                no_echo,
            } => {
                assert_eq!(host.as_deref(), Some("broker"));
                assert_eq!(port, Some(1884));
                assert!(no_echo);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from(["homie", "check", "--log-level", "debug", "--json-logs"]);
        assert_eq!(cli.log_level, "debug");
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Commands::Check));
    }

    #[test]
    fn test_resolve_explicit_path() {
        let path = resolve_path(Some(PathBuf::from("x.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("x.toml"));
    }
}
