//! JobPilot CLI - delivery session control from the terminal
//!
//! Usage:
//!   jobpilot login               Run the login handshake, wait for the credential
//!   jobpilot start               Start the delivery job (quota-gated)
//!   jobpilot stop                Stop the delivery job
//!   jobpilot status              Show server-side delivery status and quota
//!   jobpilot watch               Hold a live session open and print state changes

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jobpilot_api::{DeliveryApi, HttpApi};
use jobpilot_core::{LoginStatus, PilotConfig, PilotSnapshot};
use jobpilot_session::DeliveryPilot;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "jobpilot")]
#[command(author, version, about = "Delivery session control for the job application service")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file (defaults to ~/.jobpilot/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the login handshake and wait for the credential image
    Login {
        /// Write the credential image payload to a file
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,

        /// Give up after this many seconds
        #[arg(long, default_value = "180")]
        timeout: u64,
    },

    /// Start the delivery job (rejected when the quota is exhausted)
    Start,

    /// Stop the delivery job
    Stop,

    /// Show server-side delivery status and quota
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Hold a live session open and print state changes
    Watch {
        /// Snapshot print cadence in seconds
        #[arg(short, long, default_value = "5")]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(cli.config.as_deref())?;
    let api: Arc<dyn DeliveryApi> = Arc::new(HttpApi::new(&config)?);

    match cli.command {
        Commands::Status { json } => cmd_status(api.as_ref(), json).await,
        Commands::Login { save, timeout } => {
            let pilot = DeliveryPilot::new(api, &config);
            let result = cmd_login(&pilot, save, timeout).await;
            pilot.dispose().await;
            result
        }
        Commands::Start => {
            let pilot = DeliveryPilot::new(api, &config);
            let result = cmd_start(&pilot).await;
            pilot.dispose().await;
            result
        }
        Commands::Stop => {
            let pilot = DeliveryPilot::new(api, &config);
            let result = cmd_stop(&pilot, &config).await;
            pilot.dispose().await;
            result
        }
        Commands::Watch { interval } => {
            let pilot = DeliveryPilot::new(api, &config);
            let result = cmd_watch(&pilot, interval).await;
            pilot.dispose().await;
            result
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PilotConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) => path,
            None => return Ok(PilotConfig::default()),
        },
    };
    Ok(PilotConfig::load_or_default(&path)?)
}

fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".jobpilot").join("config.toml"))
}

async fn cmd_login(pilot: &DeliveryPilot, save: Option<PathBuf>, timeout: u64) -> Result<()> {
    pilot.login().await?;
    println!("Login handshake opened, waiting for the credential image...");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout);
    let mut image_shown = false;
    loop {
        if tokio::time::Instant::now() >= deadline {
            pilot.cancel_login().await;
            anyhow::bail!("Timed out after {}s waiting for the login handshake", timeout);
        }
        tokio::time::sleep(Duration::from_millis(500)).await;

        let snapshot = pilot.snapshot().await;
        if !image_shown {
            if let Some(image) = snapshot.login.credential_image.as_deref() {
                match &save {
                    Some(path) => {
                        tokio::fs::write(path, image)
                            .await
                            .context("Failed to save credential image")?;
                        println!("Credential image saved to {:?}, scan it to continue", path);
                    }
                    None => println!(
                        "Credential image ready ({} bytes), scan it to continue",
                        image.len()
                    ),
                }
                image_shown = true;
            }
        }

        match snapshot.login.status {
            LoginStatus::Success => {
                println!("Login confirmed");
                return Ok(());
            }
            LoginStatus::Failed => {
                let reason = snapshot
                    .notice
                    .map(|n| n.message)
                    .unwrap_or_else(|| "no reason reported".to_string());
                anyhow::bail!("Login handshake failed: {}", reason);
            }
            _ => {}
        }
    }
}

async fn cmd_start(pilot: &DeliveryPilot) -> Result<()> {
    pilot.start().await.context("Failed to start delivery")?;
    println!("Delivery started");

    // Give the confirmation poll a moment to pull server truth
    tokio::time::sleep(Duration::from_millis(500)).await;
    print_delivery(&pilot.snapshot().await);
    Ok(())
}

async fn cmd_stop(pilot: &DeliveryPilot, config: &PilotConfig) -> Result<()> {
    let result = pilot.stop().await;
    if result.is_err() {
        println!("Stop request failed; the session is marked stopped locally");
    }

    tokio::time::sleep(config.cadence.stop_confirm() + Duration::from_millis(500)).await;
    print_delivery(&pilot.snapshot().await);
    result.context("Stop request failed")?;
    println!("Delivery stopped");
    Ok(())
}

async fn cmd_status(api: &dyn DeliveryApi, json: bool) -> Result<()> {
    let status = api.delivery_status().await?;
    let quota = api.quota().await?;

    if json {
        let body = serde_json::json!({
            "running": status.running,
            "delivered": status.delivered,
            "succeeded": status.succeeded,
            "skipped": status.skipped,
            "errors": status.errors,
            "quota": {
                "used": quota.used,
                "limit": quota.limit,
                "unlimited": quota.unlimited,
            },
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("Delivery running: {}", status.running);
        println!("  delivered: {}", status.delivered);
        println!("  succeeded: {}", status.succeeded);
        println!("  skipped:   {}", status.skipped);
        println!("  errors:    {}", status.errors);
        println!("Quota: {}", quota);
    }
    Ok(())
}

async fn cmd_watch(pilot: &DeliveryPilot, interval: u64) -> Result<()> {
    println!("Watching session state (Ctrl-C to exit)");
    let mut running = pilot.running_watch();
    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    let mut last_notice = String::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = running.changed() => {
                match changed {
                    Ok(()) => println!("running -> {}", *running.borrow()),
                    Err(_) => break,
                }
            }
            _ = ticker.tick() => {
                let snapshot = pilot.snapshot().await;
                let quota = snapshot
                    .quota
                    .map(|q| q.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                println!(
                    "running={} delivered={} errors={} quota={}",
                    snapshot.delivery.is_running,
                    snapshot.delivery.delivered,
                    snapshot.delivery.errors,
                    quota
                );
                if let Some(notice) = &snapshot.notice {
                    let line = format!("{} at {}", notice.message, notice.at.format("%H:%M:%S"));
                    if line != last_notice {
                        println!("notice: {}", line);
                        last_notice = line;
                    }
                }
            }
        }
    }
    Ok(())
}

fn print_delivery(snapshot: &PilotSnapshot) {
    println!("Delivery running: {}", snapshot.delivery.is_running);
    println!("  delivered: {}", snapshot.delivery.delivered);
    println!("  succeeded: {}", snapshot.delivery.succeeded);
    println!("  skipped:   {}", snapshot.delivery.skipped);
    println!("  errors:    {}", snapshot.delivery.errors);
    if let Some(quota) = &snapshot.quota {
        println!("Quota: {}", quota);
    }
    if let Some(notice) = &snapshot.notice {
        println!("Notice: {}", notice.message);
    }
}
