use std::sync::Arc;

use ntlink::prelude::*;
use tracing::info;

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Logs every topic event.
struct Monitor;

impl TopicListener for Monitor {
    fn on_announce(&self, topic: &Topic) {
        info!(name = %topic.name, value_type = topic.value_type.as_str(), "announced");
    }

    fn on_unannounce(&self, topic: &Topic) {
        info!(name = %topic.name, "unannounced");
    }

    fn on_value(&self, topic: &Topic, timestamp_us: i64, value: &Value) {
        info!(name = %topic.name, timestamp_us, ?value, "value");
    }

    fn on_connect(&self) {
        info!("connected");
    }

    fn on_disconnect(&self) {
        info!("disconnected");
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

/// Usage: `signal-monitor [host] [port] [prefix...]`
///
/// Subscribes to every sample under each prefix (default `/`) and tracks
/// calibrations under `/Calibrations/`. Runs until Ctrl-C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut builder = ClientConfig::builder().client_name("signal-monitor");
    if let Some(host) = args.first() {
        builder = builder.host(host.as_str());
    }
    if let Some(port) = args.get(1) {
        builder = builder.port(port.parse()?);
    }
    let prefixes: Vec<&str> = match args.get(2..) {
        Some(rest) if !rest.is_empty() => rest.iter().map(String::as_str).collect(),
        _ => vec!["/"],
    };

    let client = Client::new(builder.build());
    info!(url = %client.config().url(), ?prefixes, "starting signal monitor");

    let calibrations = Arc::new(CalibrationTracker::new());
    let tracker: SharedListener = calibrations.clone();
    client.set_listener(Monitor);
    client.subscribe_all_samples(&prefixes, None)?;
    client.subscribe_all_samples(&[calibrations.prefix()], Some(tracker))?;
    client.start();

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    client.shutdown().await;

    for entry in calibrations.complete_entries() {
        info!(
            name = %entry.name,
            units = entry.units.as_deref().unwrap_or_default(),
            current = entry.current,
            desired = entry.desired,
            "calibration"
        );
    }
    Ok(())
}
