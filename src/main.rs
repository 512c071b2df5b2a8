//! SensorNet - UDP Sensor-Network Gateway
//!
//! Listens on a broadcast/multicast UDP endpoint for MySensors-style
//! messages, assigns persistent node IDs, and surfaces sensors as visible
//! devices.

mod config;
mod devices;
mod gateway;
mod protocol;
mod registry;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use devices::MemoryDeviceStore;
use gateway::{Gateway, GatewayEvent};

/// SensorNet - UDP sensor-network gateway
#[derive(Parser)]
#[command(name = "sensornet")]
#[command(author = "SensorNet Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Gateway for sensor nodes broadcasting over UDP", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway
    Run {
        /// Discovery endpoint to listen on (address:port)
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Create visible devices for discovered sensors
        #[arg(long)]
        create_devices: bool,

        /// Gateway name to prefix device names with
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show protocol information
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let filter = if cli.verbose || config.general.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            endpoint,
            create_devices,
            name,
        } => {
            if let Some(endpoint) = endpoint {
                config.discovery.endpoint = endpoint;
            }
            if create_devices {
                config.discovery.auto_create = true;
            }
            if let Some(name) = name {
                config.general.name = name;
            }
            run_gateway(config).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config();
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        Commands::Info => {
            print_protocol_info();
        }
    }

    Ok(())
}

/// Run the gateway until interrupted or a handler fails
async fn run_gateway(config: Config) -> anyhow::Result<()> {
    tracing::debug!("name: '{}'", config.general.name);
    tracing::debug!("endpoint: '{}'", config.discovery.endpoint);
    tracing::debug!("auto-create devices: {}", config.discovery.auto_create);

    let mut gateway = Gateway::new(config.gateway_config(), MemoryDeviceStore::new());
    let mut event_rx = gateway.take_event_receiver().unwrap();

    gateway.start().await?;

    println!("\n========================================");
    println!("  SensorNet Gateway Running");
    println!("========================================");
    println!("  Name: {}", config.general.name);
    println!("  Endpoint: {}", config.discovery.endpoint);
    println!("  Auto-create devices: {}", config.discovery.auto_create);
    println!("========================================");
    println!("\nWaiting for sensor nodes...");
    println!("Press Ctrl+C to stop.\n");

    // Main event loop
    let mut failure: Option<anyhow::Error> = None;
    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                match event {
                    GatewayEvent::Started { bind_addr } => {
                        tracing::info!("listening on {}", bind_addr);
                    }
                    GatewayEvent::DatagramReceived { peer, raw } => {
                        tracing::debug!("datagram from {}: {}", peer, raw);
                    }
                    GatewayEvent::ResponseSent { peer, raw } => {
                        println!("> {} <- {}", peer, raw);
                    }
                    GatewayEvent::HandlerFailed { raw, detail } => {
                        tracing::error!("handler failed on '{}': {}", raw, detail);
                        failure = Some(anyhow::anyhow!(
                            "handler failed on '{}': {}", raw, detail
                        ));
                    }
                    GatewayEvent::Error { message } => {
                        tracing::error!("gateway error: {}", message);
                    }
                    GatewayEvent::Stopped => {
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                gateway.stop().await?;
            }
        }
    }

    // Summarize what the gateway learned before exiting
    let registry = gateway.registry();
    let registry = registry.lock().await;
    if !registry.is_empty() {
        println!("\nKnown nodes:");
        for record in registry.records() {
            println!("  {} -> node {}", record.unique_id, record.node_id);
        }
    }

    let devices = gateway.devices();
    let devices = devices.lock().await;
    if !devices.devices().is_empty() {
        println!("\nVisible devices:");
        for device in devices.devices() {
            println!("  {} ({}): {}", device.name, device.type_hint, device.s_value);
        }
    }

    if let Some(err) = failure {
        return Err(err);
    }

    tracing::info!("gateway stopped");
    Ok(())
}

/// Print protocol information
fn print_protocol_info() {
    println!("SensorNet Protocol Information");
    println!("==============================\n");

    println!("Wire format: <nodeID>;<childSensorID>;<command>;<ack>;<subType>;<payload>");
    println!("Default endpoint: {}", protocol::DEFAULT_ENDPOINT);
    println!("Gateway node ID: {}", protocol::GATEWAY_NODE_ID);
    println!("\nCommands:");
    println!("  0 PRESENTATION  announce a child sensor");
    println!("  1 SET           report a sensor value");
    println!("  2 STREAM        firmware transfer (unsupported)");
    println!("  3 INTERNAL      protocol-internal exchange");
    println!("\nInternal subtypes:");
    println!("  3 I_ID_REQUEST  node asks for an ID");
    println!("  4 I_ID_RESPONSE gateway assigns an ID");
    println!("\nRegistered sensor types:");
    println!("  6 S_TEMP  temperature");
    println!("  7 S_HUM   humidity");
    println!("  8 S_BARO  barometer");
}
