use std::{error::Error, path::PathBuf};

use fwdmail_utils::{load_config, Forwarder, ForwarderConfig, NotificationEvent};
use tokio::{fs, io::AsyncReadExt};
use tracing::{error, info};

/// Environment variable pointing to an optional TOML configuration file,
/// when unset the configuration is read from the environment.
const CONFIG_ENV: &str = "FWDMAIL_CONFIG";

fn load_forwarder_config() -> Result<ForwarderConfig, Box<dyn Error>> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            info!(path = %path, "Loading configuration file");
            Ok(load_config(&PathBuf::from(path))?.forwarder)
        }
        Err(_) => Ok(ForwarderConfig::from_env()?),
    }
}

/// Reads the notification event from the given file, or from the
/// standard input when no file is given.
async fn read_event(path: Option<String>) -> Result<NotificationEvent, Box<dyn Error>> {
    let data = match path {
        Some(path) => fs::read(&path).await?,
        None => {
            let mut data = Vec::new();
            tokio::io::stdin().read_to_end(&mut data).await?;
            data
        }
    };
    Ok(NotificationEvent::from_json(&data)?)
}

/// Processes a single notification event, forwarding every message it
/// announces and exiting with an error if any record fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_forwarder_config().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;
    let forwarder = Forwarder::from_config(&config)?;

    let event = read_event(std::env::args().nth(1)).await?;
    info!(records = event.records.len(), "Processing notification event");

    let reports = forwarder.process_event(&event).await?;
    let forwarded: usize = reports.iter().map(|report| report.forwarded.len()).sum();
    let failed: usize = reports.iter().map(|report| report.failed.len()).sum();
    info!(
        messages = reports.len(),
        forwarded = forwarded,
        failed = failed,
        "Notification event processed"
    );

    Ok(())
}
