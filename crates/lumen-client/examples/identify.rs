//! Walks the available serial endpoints and identifies the first LumenLink
//! device that answers — the discovery pattern the client's public interface
//! is consumed by.
//!
//! ```bash
//! cargo run --package lumen-client --example identify [ENDPOINT]
//! ```
//!
//! With an explicit `ENDPOINT` only that path is tried.

use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lumen_client::{available_endpoints, load_config, Device};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;

    let candidates = match std::env::args().nth(1) {
        Some(endpoint) => vec![endpoint],
        None => available_endpoints()?,
    };
    anyhow::ensure!(!candidates.is_empty(), "no serial endpoints found");

    for endpoint in candidates {
        info!(%endpoint, "trying endpoint");
        let device = match Device::connect_with(
            &lumen_client::SerialOpener::new(),
            &endpoint,
            config.connect_budget(),
            config.device_options(),
        )
        .await
        {
            Ok(device) => device,
            Err(error) => {
                warn!(%endpoint, %error, "could not connect");
                continue;
            }
        };

        match device.identify(Duration::from_millis(1000)).await {
            Ok(info) => {
                println!("device at {endpoint}");
                println!("  version:  {}", info.version);
                println!("  name:     {}", info.name.as_deref().unwrap_or("-"));
                println!("  model:    {}", info.model.as_deref().unwrap_or("-"));
                for port in &info.ports {
                    println!("  port {}:   {}", port.index, port.mode);
                }
                if !info.features.is_empty() {
                    let features: Vec<&str> =
                        info.features.iter().map(String::as_str).collect();
                    println!("  features: {}", features.join(", "));
                }

                let rate = device.get_framerate().await?;
                println!("  framerate: {rate} fps");
                return Ok(());
            }
            Err(error) => warn!(%endpoint, %error, "endpoint did not identify"),
        }
    }

    anyhow::bail!("no device identified on any endpoint")
}
