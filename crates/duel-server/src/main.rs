//! TCP server for duel sessions.

use duel_server::config::Config;
use duel_server::server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    info!(
        "Starting duel-server on {}:{} (max_clients = {}, max_sessions = {}, rejoin_window = {:?})",
        config.bind_addr,
        config.port,
        config.max_clients,
        config.max_sessions,
        config.rejoin_window
    );

    server::run(config).await
}
