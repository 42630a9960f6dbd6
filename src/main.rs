// src/main.rs

mod alerts;
mod buffer;
mod capture;
mod config;
mod detect_client;
mod encoder;
mod overlay;
mod sampling;
mod session;
mod types;

use alerts::{AlertPolicy, AlertTally};
use anyhow::Result;
use buffer::DetectionBuffer;
use capture::CaptureSource;
use clap::{Parser, Subcommand};
use detect_client::DetectClient;
use session::TransportSession;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use types::Config;

#[derive(Parser)]
#[command(name = "ppe-monitor", about = "Real-time PPE inspection client")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "config.yaml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream the live capture source to the detection service
    Live,
    /// Submit a single image or video file to the detect endpoint
    Detect { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ppe_monitor={},tungstenite=warn",
            config.logging.level
        ))
        .init();

    info!("🦺 PPE Monitor starting");

    let policy = AlertPolicy::new(config.alerts.classes.iter().cloned());

    match cli.command {
        Command::Live => run_live(&config, policy).await,
        Command::Detect { file } => run_detect(&config, policy, &file).await,
    }
}

async fn run_live(config: &Config, policy: AlertPolicy) -> Result<()> {
    let buffer = Arc::new(Mutex::new(DetectionBuffer::with_capacity(
        config.buffer.retention,
    )));
    let tally = AlertTally::new();

    // Capture acquisition failure is fatal to starting a session
    let mut capture = CaptureSource::open(&config.capture)?;

    let mut session = TransportSession::new(Arc::clone(&buffer), policy.clone(), tally.clone());
    if let Err(e) = session.open(&config.server.stream_url()).await {
        // Reported, not retried — the live view still runs, with sends
        // dropping until a fresh start.
        error!("Could not reach detection stream: {:#}", e);
    }

    sampling::run(&mut capture, &mut session, &buffer, &policy, config).await?;

    info!(
        "Session summary: {} results received, {} alerts",
        buffer.lock().unwrap().len(),
        tally.count()
    );
    Ok(())
}

async fn run_detect(config: &Config, policy: AlertPolicy, file: &Path) -> Result<()> {
    let client = DetectClient::new(&config.server)?;

    let response = match client.detect_file(file).await {
        Ok(response) => response,
        Err(e) => {
            // The error replaces the results output
            error!("Detection failed: {:#}", e);
            return Err(e);
        }
    };

    detect_client::report_results(&response, &policy);

    let out_dir = file.parent().unwrap_or_else(|| Path::new("."));
    match client.fetch_annotated(&response.image_path, out_dir).await {
        Ok(saved) => info!("Annotated image saved to {}", saved.display()),
        Err(e) => warn!("Could not fetch annotated image: {:#}", e),
    }

    Ok(())
}
