//! hwalertd: hardware alert daemon
//!
//! Reads alert requests as JSON lines on stdin, renders them one at a time
//! on the RGB LED and buzzer, and shuts down cleanly at EOF.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 Adapters (outer ring)                    │
//! │                                                          │
//! │  stdin_source      LogEventSink      SimulatedPort /     │
//! │  (JSON intake)     (EventSink)       HalPort<CdevPin>    │
//! │                                      (OutputPort)        │
//! │  ─────────────── Port Trait Boundary ──────────────      │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │  AlertSystem: AlertQueue → PatternEngine           │  │
//! │  │               RgbLed (3 × PwmChannel) · Buzzer     │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use hwalert::adapters::log_sink::LogEventSink;
use hwalert::adapters::{open_port, stdin_source};
use hwalert::drivers::patterns::PatternTable;
use hwalert::{AlertConfig, AlertSystem};

#[derive(Parser, Debug)]
#[command(name = "hwalertd", version, about = "Serialized RGB LED + buzzer alert daemon")]
struct Cli {
    /// JSON configuration file (defaults apply when absent).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Use the simulation backend even when GPIO support is built in.
    #[arg(long)]
    simulate: bool,
    /// Compress (< 1) or stretch every pattern in time.
    #[arg(long, default_value_t = 1.0)]
    time_scale: f64,
}

fn load_config(path: Option<&Path>) -> Result<AlertConfig> {
    let Some(path) = path else {
        info!("No config file given; using defaults");
        return Ok(AlertConfig::default());
    };
    if !path.exists() {
        warn!("Config file {} not found; using defaults", path.display());
        return Ok(AlertConfig::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: AlertConfig =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    info!("Config loaded from {}", path.display());
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    info!("hwalertd v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())?;
    let port = open_port(&config, cli.simulate).context("opening output port")?;
    let patterns = PatternTable::with_time_scale(cli.time_scale);

    let system = AlertSystem::start_with_patterns(config, port, Arc::new(LogEventSink::new()), patterns)
        .context("starting alert system")?;
    info!("Health: {}", serde_json::to_string(&system.health())?);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let stats = stdin_source::run(stdin.lock(), stdout.lock(), &system)
        .context("reading alert requests")?;
    info!(
        "Input closed ({} accepted, {} rejected); shutting down",
        stats.accepted, stats.rejected
    );

    let report = system.shutdown();
    if !report.timed_out_pins.is_empty() {
        warn!("Pins forced off after stop timeout: {:?}", report.timed_out_pins);
    }
    Ok(())
}
