//! glowdesk - Presence-driven smart lights
//!
//! Mirrors Microsoft Teams presence and the Outlook calendar onto Govee
//! color-capable devices.

mod api;
mod auth;
mod config;
mod engine;
mod error;
mod govee;
mod models;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::GraphClient;
use config::Config;
use engine::Engine;
use govee::{Command as GoveeCommand, DeviceRegistry, GoveeClient, RateLimiter};
use models::{DeviceAssignment, Rgb};

#[derive(Parser)]
#[command(name = "glowdesk")]
#[command(about = "Sync Microsoft Teams presence and calendar to Govee smart lights", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate with Microsoft Graph
    Login {
        /// Force interactive login even if cached token exists
        #[arg(short, long)]
        force: bool,
    },

    /// Log out and clear cached credentials
    Logout,

    /// Show current authentication status
    Status,

    /// Show current presence
    Presence,

    /// List upcoming calendar events
    Calendar {
        /// Lookahead window in hours
        #[arg(long, default_value = "24")]
        hours: i64,
    },

    /// Discover devices and show their configuration
    Devices,

    /// Choose which devices the engine drives
    Select {
        /// Device ids (from `devices` output)
        ids: Vec<String>,

        /// Clear the selection instead
        #[arg(long)]
        none: bool,
    },

    /// Set which signal drives a device
    Assign {
        /// Device id (from `devices` output)
        device: String,

        /// presence, countdown, or both
        mode: DeviceAssignment,
    },

    /// Send one color to one device (manual test)
    SetColor {
        /// Device id (from `devices` output)
        device: String,

        /// Color as rrggbb hex
        color: String,
    },

    /// Set a device's brightness
    SetBrightness {
        /// Device id (from `devices` output)
        device: String,

        /// Brightness percent (1-100)
        percent: u8,
    },

    /// Switch a device on or off
    Power {
        /// Device id (from `devices` output)
        device: String,

        /// "on" or "off"
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },

    /// Run the sync engine until Ctrl-C
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Login { force } => {
            tracing::info!("Starting authentication flow...");
            auth::login(force).await?;
        }
        Commands::Logout => {
            tracing::info!("Logging out...");
            auth::logout().await?;
        }
        Commands::Status => {
            auth::status().await?;
        }
        Commands::Presence => {
            show_presence().await?;
        }
        Commands::Calendar { hours } => {
            show_calendar(hours).await?;
        }
        Commands::Devices => {
            show_devices().await?;
        }
        Commands::Select { ids, none } => {
            select_devices(ids, none)?;
        }
        Commands::Assign { device, mode } => {
            assign_device(device, mode)?;
        }
        Commands::SetColor { device, color } => {
            let color = Rgb::parse_hex(&color)
                .with_context(|| format!("'{color}' is not a rrggbb hex color"))?;
            send_command(&device, GoveeCommand::Color(color)).await?;
        }
        Commands::SetBrightness { device, percent } => {
            send_command(&device, GoveeCommand::Brightness(percent)).await?;
        }
        Commands::Power { device, state } => {
            send_command(&device, GoveeCommand::Power(state == "on")).await?;
        }
        Commands::Run => {
            run_engine().await?;
        }
    }

    Ok(())
}

fn graph_client(config: &Config) -> Result<GraphClient> {
    let session = Arc::new(auth::session_from_config(config)?);
    Ok(GraphClient::new(session))
}

fn govee_client(config: &Config) -> Result<GoveeClient> {
    GoveeClient::new(config.govee_api_key.clone(), Arc::new(RateLimiter::default()))
        .context("Govee client unavailable")
}

async fn show_presence() -> Result<()> {
    let config = Config::load()?;
    let client = graph_client(&config)?;
    let snapshot = api::fetch_presence(&client).await?;

    println!("\nPresence Status:");
    println!("  Availability: {}", snapshot.availability);
    if let Some(activity) = snapshot.activity {
        println!("  Activity:     {}", activity);
    }
    Ok(())
}

async fn show_calendar(hours: i64) -> Result<()> {
    let config = Config::load()?;
    let client = graph_client(&config)?;
    let events = api::fetch_upcoming(&client, hours).await?;

    if events.is_empty() {
        println!("No events in the next {} hours.", hours);
        return Ok(());
    }

    println!("\nUpcoming events:");
    for event in &events {
        let marker = match event.show_as {
            models::BusyStatus::Busy | models::BusyStatus::OutOfOffice => "*",
            _ => " ",
        };
        println!(
            " {}{}  {}  {}",
            marker,
            event.start.format("%Y-%m-%d %H:%M"),
            event.subject,
            event.location.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}

async fn show_devices() -> Result<()> {
    let config = Config::load()?;
    let client = govee_client(&config)?;
    let devices = client.list_devices().await?;

    if devices.is_empty() {
        println!("No devices found on this account.");
        return Ok(());
    }

    println!("\nDevices:");
    for device in &devices {
        let selected = if config.selected_devices.contains(&device.id) {
            "[selected]"
        } else {
            ""
        };
        let caps: Vec<String> = device.capabilities.iter().map(|c| c.to_string()).collect();
        println!(
            "  {}  {} ({})  assignment={}  {} {}",
            device.id,
            device.name,
            device.sku,
            config.assignment(&device.id),
            caps.join(","),
            selected,
        );
    }
    Ok(())
}

fn select_devices(ids: Vec<String>, none: bool) -> Result<()> {
    if !none && ids.is_empty() {
        bail!("Pass device ids to select, or --none to clear the selection.");
    }

    let mut config = Config::load()?;
    config.selected_devices = if none {
        Default::default()
    } else {
        ids.into_iter().collect()
    };
    config.save()?;

    if config.selected_devices.is_empty() {
        println!("Selection cleared.");
    } else {
        println!("Driving {} device(s).", config.selected_devices.len());
    }
    Ok(())
}

fn assign_device(device: String, mode: DeviceAssignment) -> Result<()> {
    let mut config = Config::load()?;
    config.assignments.insert(device.clone(), mode);
    config.save()?;
    println!("Device {} now driven by: {}", device, mode);
    Ok(())
}

async fn send_command(device_id: &str, command: GoveeCommand) -> Result<()> {
    let config = Config::load()?;
    let client = govee_client(&config)?;
    let devices = client.list_devices().await?;
    let device = devices
        .iter()
        .find(|d| d.id == device_id)
        .with_context(|| format!("device {device_id} not found; run 'glowdesk devices'"))?;

    client.control(&device.id, &device.sku, command).await?;
    println!("Sent {:?} to device {}.", command, device.id);
    Ok(())
}

async fn run_engine() -> Result<()> {
    let config = Config::load()?;

    let session = Arc::new(auth::session_from_config(&config)?);
    let graph = GraphClient::new(session);
    let govee = Arc::new(govee_client(&config)?);

    let registry = Arc::new(DeviceRegistry::new(
        config.selected_devices.clone(),
        config.effective_assignments(),
    ));

    let devices = govee.list_devices().await?;
    tracing::info!("Discovered {} device(s)", devices.len());
    registry.sync_discovered(devices);

    if config.selected_devices.is_empty() {
        tracing::warn!(
            "No devices selected; run 'glowdesk devices' then 'glowdesk select <id>...'"
        );
    }

    let engine = Arc::new(Engine::new(graph, govee, registry, &config));
    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down...");
            cancel.cancel();
        }
    });

    let last_error = engine.last_error();
    engine.run().await;

    if let Some(e) = last_error.borrow().as_deref() {
        tracing::warn!("Most recent error: {e}");
    }
    Ok(())
}
