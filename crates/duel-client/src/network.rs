// crates/duel-client/src/network.rs

use anyhow::Result;
use bytes::BytesMut;
use duel_core::{InputMessage, OutputMessage};
use duel_protocol::binary_codec;
use duel_protocol::wire_types::FRAME_PREFIX_LEN;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::types::ReconnectPolicy;

/// What the connection task reports to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    ConnectError(String),
    Disconnected,
    Message(OutputMessage),
}

enum PumpExit {
    ServerClosed,
    AppClosed,
}

/// Binary-protocol connection to the session server with reconnects.
pub struct ServerConnection {
    server_addr: String,
    policy: ReconnectPolicy,
    events: UnboundedSender<ConnectionEvent>,
}

impl ServerConnection {
    pub fn new(
        server_addr: &str,
        policy: ReconnectPolicy,
        events: UnboundedSender<ConnectionEvent>,
    ) -> Self {
        Self {
            server_addr: server_addr.to_string(),
            policy,
            events,
        }
    }

    /// Connect, pump messages both ways, reconnect on failure.
    ///
    /// Returns when the application drops either channel or the reconnect
    /// attempts run out.
    pub async fn run(self, mut rx: UnboundedReceiver<InputMessage>) {
        let mut attempt = 0u32;

        loop {
            match self.connect().await {
                Ok(stream) => {
                    attempt = 0;

                    // Requests issued while offline refer to a dead connection.
                    while rx.try_recv().is_ok() {}

                    if !self.emit(ConnectionEvent::Connected) {
                        return;
                    }

                    match self.pump(stream, &mut rx).await {
                        Ok(PumpExit::AppClosed) => return,
                        Ok(PumpExit::ServerClosed) => info!("Server closed the connection"),
                        Err(e) => warn!("Connection error: {}", e),
                    }

                    if !self.emit(ConnectionEvent::Disconnected) {
                        return;
                    }
                }
                Err(e) => {
                    error!("Connection failed: {}", e);
                    if !self.emit(ConnectionEvent::ConnectError(e.to_string())) {
                        return;
                    }
                }
            }

            attempt += 1;
            if attempt > self.policy.max_attempts {
                error!(attempts = self.policy.max_attempts, "giving up on the server");
                return;
            }

            // Exponential backoff
            let delay = self.policy.delay(attempt);
            debug!(attempt, ?delay, "reconnecting");
            tokio::time::sleep(delay).await;
        }
    }

    async fn connect(&self) -> Result<TcpStream> {
        info!("Connecting to {}...", self.server_addr);
        let stream = TcpStream::connect(&self.server_addr).await?;
        stream.set_nodelay(true)?;
        info!("Connected successfully");
        Ok(stream)
    }

    async fn pump(
        &self,
        stream: TcpStream,
        rx: &mut UnboundedReceiver<InputMessage>,
    ) -> Result<PumpExit> {
        let (mut read_half, mut write_half) = stream.into_split();
        let mut read_buffer = BytesMut::with_capacity(65536);

        loop {
            tokio::select! {
                outbound = rx.recv() => match outbound {
                    Some(msg) => send_message(&mut write_half, &msg).await?,
                    None => return Ok(PumpExit::AppClosed),
                },

                inbound = read_message(&mut read_half, &mut read_buffer) => match inbound? {
                    Some(msg) => {
                        debug!("Received from server: {:?}", msg);
                        if !self.emit(ConnectionEvent::Message(msg)) {
                            return Ok(PumpExit::AppClosed);
                        }
                    }
                    None => return Ok(PumpExit::ServerClosed),
                },
            }
        }
    }

    fn emit(&self, event: ConnectionEvent) -> bool {
        self.events.send(event).is_ok()
    }
}

async fn send_message(stream: &mut OwnedWriteHalf, msg: &InputMessage) -> Result<()> {
    let mut payload = Vec::new();
    binary_codec::encode_input(msg, &mut payload)?;

    let mut framed = Vec::with_capacity(payload.len() + FRAME_PREFIX_LEN);
    binary_codec::encode_frame(&payload, &mut framed)?;

    stream.write_all(&framed).await?;
    stream.flush().await?;

    debug!("Sent message: {:?}", msg);
    Ok(())
}

/// Read one frame. Partial input stays in `buffer`, so dropping the future
/// between reads loses nothing.
async fn read_message(
    stream: &mut OwnedReadHalf,
    buffer: &mut BytesMut,
) -> Result<Option<OutputMessage>> {
    loop {
        if let Some(total) = binary_codec::peek_frame(buffer)? {
            let frame = buffer.split_to(total);
            let msg = binary_codec::decode_output(&frame[FRAME_PREFIX_LEN..])?;
            return Ok(Some(msg));
        }

        if stream.read_buf(buffer).await? == 0 {
            return Ok(None); // Connection closed
        }
    }
}
