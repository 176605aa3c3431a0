//! Brawl Match Server
//!
//! Authoritative WebSocket server for two-player platform-fighter matches.
//! Configured entirely from the environment: `PORT` (default 3000),
//! `TICK_RATE` (default 60), `MAX_ROOMS`, `RATE_LIMIT_PER_SEC` (default 180).
//! Process-startup failures (bind failure, bad `$PORT`) are the only place
//! this binary uses `anyhow::Result`; everything per-connection is caught,
//! logged, and dropped inside the server itself.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use brawl_match::network::{GameServer, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let port: u16 = match std::env::var("PORT") {
        Ok(raw) => raw.parse().context("PORT must be a valid u16")?,
        Err(_) => 3000,
    };

    let config = ServerConfig { bind_addr: format!("0.0.0.0:{port}"), ..ServerConfig::from_env() };

    tracing::info!(version = %brawl_match::VERSION, tick_rate = brawl_match::TICK_RATE, "starting brawl match server");

    let server = GameServer::new(config);
    server.run().await.context("game server exited with an error")?;

    Ok(())
}
