//! Runs the PeerShare signaling server.
//!
//! Configuration comes from `PEERSHARE_BIND_ADDR` and
//! `PEERSHARE_IDLE_TIMEOUT_SECS`; log filtering from `RUST_LOG`.

use peershare::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env()?;
    tracing::info!(bind = %config.bind_addr, idle_timeout = ?config.idle_timeout, "starting");

    let server = PeerShareServer::builder().config(config).build().await?;
    tracing::info!(addr = %server.local_addr()?, "listening");
    server.run().await?;
    Ok(())
}
