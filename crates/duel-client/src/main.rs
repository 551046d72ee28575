// crates/duel-client/src/main.rs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use duel_client::app::{ClientEffect, Intent, SessionClient};
use duel_client::link::parse_link;
use duel_client::network::{ConnectionEvent, ServerConnection};
use duel_client::peer::{self, CapturedStream, HandshakeFactory};
use duel_client::types::{ClientConfig, MediaKind, SessionMode};
use duel_core::{ChessValidator, InputMessage, SessionId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How long queued requests (a final `leave`) get to reach the server.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[clap(name = "duel-client")]
#[clap(about = "Play a chess duel with a peer media channel from the terminal")]
struct Cli {
    /// Server address
    #[clap(short, long)]
    server: Option<String>,

    /// Create a new session
    #[clap(long, conflicts_with = "join")]
    create: bool,

    /// Session id to propose when creating
    #[clap(long, requires = "create")]
    id: Option<String>,

    /// Join a session by id or duel:// link
    #[clap(short, long)]
    join: Option<String>,

    /// Media carried by the peer channel
    #[clap(short, long, value_enum)]
    media: Option<MediaKind>,

    /// How the session is shared
    #[clap(long, value_enum)]
    mode: Option<SessionMode>,

    /// TOML config file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Play board-only, without capture
    #[clap(long)]
    no_media: bool,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(server) = &cli.server {
        config.server_addr = server.clone();
    }
    if let Some(media) = cli.media {
        config.media = media;
    }
    if let Some(mode) = cli.mode {
        config.session_mode = mode;
    }
    if cli.no_media {
        config.capture_enabled = false;
    }

    let intent = if let Some(target) = &cli.join {
        let target = parse_link(target)?;
        if let Some(addr) = target.server_addr {
            if cli.server.is_none() {
                config.server_addr = addr;
            }
        }
        Intent::Join(target.session_id)
    } else if cli.create {
        let proposed = match &cli.id {
            Some(raw) => Some(SessionId::try_from(raw.clone())?),
            None => None,
        };
        Intent::Create(proposed)
    } else {
        bail!("pass --create or --join <id|link>");
    };

    run(config, intent).await
}

async fn run(config: ClientConfig, intent: Intent) -> Result<()> {
    let (tx_to_network, rx_from_app) = mpsc::unbounded_channel::<InputMessage>();
    let (tx_to_app, mut rx_from_network) = mpsc::unbounded_channel::<ConnectionEvent>();
    let (capture_tx, mut capture_rx) = mpsc::unbounded_channel::<Result<CapturedStream, String>>();

    let mut client = SessionClient::new(
        &config,
        intent,
        tx_to_network,
        Box::new(ChessValidator),
        HandshakeFactory,
    );

    // Spawn network handler
    let connection = ServerConnection::new(&config.server_addr, config.reconnect.clone(), tx_to_app);
    let mut network_handle = tokio::spawn(connection.run(rx_from_app));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("moves in SAN (e4, Nf3, O-O); /board, /leave, /quit");

    loop {
        let effects = tokio::select! {
            event = rx_from_network.recv() => match event {
                Some(event) => client.handle_connection_event(event),
                None => {
                    println!("server unreachable, giving up");
                    break;
                }
            },

            Some(result) = capture_rx.recv() => client.capture_finished(result),

            line = lines.next_line() => match line? {
                Some(line) => match handle_command(&mut client, line.trim()) {
                    Some(effects) => effects,
                    None => break,
                },
                None => break,
            },
        };

        if !apply_effects(&config, &capture_tx, effects) {
            break;
        }
    }

    // Cleanup: dropping the client closes the request channel, so the
    // connection task writes what is queued and returns.
    client.shutdown();
    drop(client);
    if tokio::time::timeout(SHUTDOWN_GRACE, &mut network_handle)
        .await
        .is_err()
    {
        warn!("connection did not drain in time");
        network_handle.abort();
    }
    info!("client stopped");
    Ok(())
}

/// `None` means quit.
fn handle_command(
    client: &mut SessionClient<HandshakeFactory>,
    line: &str,
) -> Option<Vec<ClientEffect>> {
    match line {
        "" => Some(Vec::new()),
        "/quit" => {
            client.leave();
            None
        }
        "/leave" => {
            let mut effects = client.leave();
            effects.push(ClientEffect::Exit);
            Some(effects)
        }
        "/board" => {
            print_status(client);
            Some(Vec::new())
        }
        san => {
            if let Err(e) = client.submit_move(san) {
                println!("{e}");
            }
            Some(Vec::new())
        }
    }
}

/// False once the client should exit.
fn apply_effects(
    config: &ClientConfig,
    capture_tx: &mpsc::UnboundedSender<Result<CapturedStream, String>>,
    effects: Vec<ClientEffect>,
) -> bool {
    for effect in effects {
        match effect {
            ClientEffect::AcquireMedia(kind) => {
                let tx = capture_tx.clone();
                let enabled = config.capture_enabled;
                tokio::spawn(async move {
                    let result = peer::acquire(kind, enabled).await.map_err(|e| e.to_string());
                    let _ = tx.send(result);
                });
            }
            ClientEffect::Notice(text) => println!("{text}"),
            ClientEffect::Exit => return false,
        }
    }
    true
}

fn print_status(client: &SessionClient<HandshakeFactory>) {
    match (client.session_id(), client.color()) {
        (Some(id), Some(color)) => {
            println!("session {id}, you play {color}, {} to move", client.turn())
        }
        (Some(id), None) => println!("session {id}, waiting for a slot"),
        _ => println!("no session"),
    }
    println!("position: {}", client.display_position());
    println!("media: {:?}", client.media_state());
    for (n, record) in client.history().iter().enumerate() {
        println!(
            "{:>3}. {:<6} {} {}",
            n + 1,
            record.san,
            record.color,
            record.timestamp.format("%H:%M:%S")
        );
    }
}
