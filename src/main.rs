//! `vlbl-tracker` CLI: headless session coordinator for tracking a
//! submerged acoustic transponder from a surface vessel.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use vlbl_tracker::core::types::{GeoPoint, Track};
use vlbl_tracker::hardware::{SerialTransport, Transport};
use vlbl_tracker::session::{event_channel, run, spawn_ticker, SessionConfig, SessionCoordinator, Sink};
use vlbl_tracker::utils::config::AppConfig;

#[derive(Parser)]
#[command(name = "vlbl-tracker", about = "VLBL tracking of a submerged acoustic transponder")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, default_value = "vlbl-tracker.json")]
    config: PathBuf,
    /// Override the modem serial port from the configuration
    #[arg(long)]
    port: Option<String>,
    /// Start autonomous ranging queries right after the handshake
    #[arg(long)]
    autoquery: bool,
    /// Write a default configuration file and exit
    #[arg(long)]
    write_default_config: bool,
}

/// Sink for headless operation: status to the console, fixes to an optional
/// GNSS output port
struct ConsoleSink {
    gnss_port: Option<SerialTransport>,
}

impl Sink for ConsoleSink {
    fn update_track(&mut self, track: Track, latitude: f64, longitude: f64) {
        debug!(track = track.name(), latitude, longitude, "track point");
    }

    fn replace_track(&mut self, track: Track, points: &[GeoPoint]) {
        debug!(track = track.name(), points = points.len(), "track replaced");
    }

    fn status_text(&mut self, text: &str) {
        println!("{}", text);
    }

    fn snapshot(&mut self) {}

    fn gnss_sentences(&mut self, sentences: &str) {
        if let Some(port) = &mut self.gnss_port {
            if let Err(e) = port.send(sentences.as_bytes()) {
                warn!(error = %e, "failed to forward GNSS sentences");
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    if cli.write_default_config {
        if let Err(e) = AppConfig::default().save(&cli.config) {
            error!(error = %e, "failed to write default configuration");
            process::exit(1);
        }
        info!(path = %cli.config.display(), "default configuration written");
        return;
    }

    let mut config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "falling back to default configuration");
            AppConfig::default()
        }
    };
    if let Some(port) = cli.port {
        config.port_name = port;
    }
    info!("configuration:\n{}", config);

    let gnss_port = if config.gnss_emulation {
        let mut port = SerialTransport::new(config.gnss_port_name.clone());
        match port.open() {
            Ok(()) => Some(port),
            Err(e) => {
                warn!(error = %e, "GNSS output port unavailable, emulation disabled");
                None
            }
        }
    } else {
        None
    };

    let transport = SerialTransport::new(config.port_name.clone());
    let sink = ConsoleSink { gnss_port };
    let mut coordinator = SessionCoordinator::new(
        SessionConfig::from(&config),
        Box::new(transport),
        Box::new(sink),
    );

    if let Err(e) = coordinator.open() {
        error!(error = %e, "failed to open the device link");
        process::exit(1);
    }
    coordinator.set_autoquery(cli.autoquery);

    let (events, receiver) = event_channel();
    spawn_ticker(Duration::from_secs(1), events);
    run(&mut coordinator, receiver);
}
