//! SA818 Simulator
//!
//! Attaches a simulated SA818 module to a serial port or pseudo-terminal
//! (for example the UART PTY of a native_sim firmware build) and answers its
//! AT commands until interrupted.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use sa818_sim::{Sa818Simulator, SimulatorConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// SA818 radio module simulator
#[derive(Parser, Debug)]
#[command(name = "sa818-sim")]
#[command(about = "Simulate an SA818 radio module on a serial port or PTY")]
#[command(version)]
struct Args {
    /// Serial port or PTY path to attach to (e.g. /dev/pts/3)
    port: String,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Baud rate for the serial port
    #[arg(short, long)]
    baud: Option<u32>,

    /// String reported for AT+VERSION
    #[arg(long = "firmware-version")]
    firmware_version: Option<String>,

    /// Initial RSSI value
    #[arg(long)]
    rssi: Option<i32>,

    /// Poll interval in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,
}

impl Args {
    /// Build the simulator configuration from the file (if any) and flags
    fn simulator_config(&self) -> anyhow::Result<SimulatorConfig> {
        let mut config = match &self.config {
            Some(path) => SimulatorConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SimulatorConfig::default(),
        };

        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if let Some(version) = &self.firmware_version {
            config.version = version.clone();
        }
        if let Some(rssi) = self.rssi {
            config.initial_state.rssi = rssi;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sa818_sim=info,sa818_protocol=info,sa818_sim_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.simulator_config()?;

    tracing::info!("Starting SA818 simulator on {}", args.port);

    let mut sim = Sa818Simulator::with_config(args.port.clone(), config);
    let mut events = sim.subscribe();
    sim.start()
        .with_context(|| format!("starting simulator on {}", args.port))?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(state) => tracing::info!("State: {}", state.summary()),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!("Skipped {} state events", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    sim.stop().await;
    Ok(())
}
