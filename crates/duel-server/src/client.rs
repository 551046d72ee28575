//! Per-connection I/O.
//!
//! The protocol is detected from the first byte: `{` means
//! newline-delimited JSON (netcat friendly), anything else is the
//! length-prefixed binary protocol. Replies use the same protocol.

use anyhow::Result;
use bytes::BytesMut;
use duel_core::OutputMessage;
use duel_protocol::json_codec::{self, JSON_LINE_MARKER};
use duel_protocol::wire_types::{FRAME_PREFIX_LEN, MAX_FRAME_LEN};
use duel_protocol::{binary_codec, ProtocolError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::types::{
    ClientRegistry, ConnectionId, CoordinatorRequest, CoordinatorTx, OutboundRx, OutboundTx,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Protocol {
    JsonLines,
    Binary,
}

/// Run the client I/O loop for a single connection.
///
/// On return the connection has been removed from `clients` and the
/// coordinator has been told about the disconnect.
pub async fn run_client(
    connection_id: ConnectionId,
    stream: TcpStream,
    coordinator_tx: CoordinatorTx,
    out_tx: OutboundTx,
    out_rx: OutboundRx,
    clients: ClientRegistry,
) -> Result<()> {
    let (mut read_stream, write_stream) = stream.into_split();

    let result = match detect_protocol(&mut read_stream).await {
        Some(protocol) => {
            debug!(connection = %connection_id, ?protocol, "protocol detected");
            tokio::spawn(run_writer(connection_id, write_stream, out_rx, protocol));

            match protocol {
                Protocol::JsonLines => {
                    run_json_reader(connection_id, read_stream, &coordinator_tx, &out_tx).await
                }
                Protocol::Binary => {
                    run_binary_reader(connection_id, read_stream, &coordinator_tx, &out_tx).await
                }
            }
        }
        None => Ok(()),
    };

    // Remove client from registry, then let the coordinator update sessions.
    clients.write().await.remove(&connection_id);
    let _ = coordinator_tx.send(CoordinatorRequest::Disconnected { connection_id });

    result
}

async fn detect_protocol(read_stream: &mut OwnedReadHalf) -> Option<Protocol> {
    let mut first_byte = [0u8; 1];
    match read_stream.peek(&mut first_byte).await {
        Ok(0) | Err(_) => None,
        Ok(_) if first_byte[0] == JSON_LINE_MARKER => Some(Protocol::JsonLines),
        Ok(_) => Some(Protocol::Binary),
    }
}

async fn run_json_reader(
    connection_id: ConnectionId,
    mut read_stream: OwnedReadHalf,
    coordinator_tx: &CoordinatorTx,
    out_tx: &OutboundTx,
) -> Result<()> {
    let mut buffer = Vec::new();
    let mut temp_buf = [0u8; 4096];

    loop {
        let n = read_stream.read(&mut temp_buf).await?;
        if n == 0 {
            info!(connection = %connection_id, "client closed connection");
            return Ok(());
        }
        buffer.extend_from_slice(&temp_buf[..n]);

        while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
            let line = buffer.drain(..=newline_pos).collect::<Vec<u8>>();
            let Ok(line) = std::str::from_utf8(&line) else {
                reject(connection_id, out_tx, &ProtocolError::InvalidString);
                continue;
            };

            match json_codec::parse_input_line(line) {
                Ok(Some(msg)) => {
                    if !forward(connection_id, coordinator_tx, msg) {
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(err) => reject(connection_id, out_tx, &err),
            }
        }

        if buffer.len() > MAX_FRAME_LEN {
            warn!(connection = %connection_id, "line exceeds frame limit, closing");
            return Err(ProtocolError::FrameTooLarge(buffer.len()).into());
        }
    }
}

async fn run_binary_reader(
    connection_id: ConnectionId,
    mut read_stream: OwnedReadHalf,
    coordinator_tx: &CoordinatorTx,
    out_tx: &OutboundTx,
) -> Result<()> {
    let mut frame = BytesMut::with_capacity(1024);

    loop {
        // Read length prefix (u32 BE)
        let mut len_buf = [0u8; FRAME_PREFIX_LEN];
        if read_stream.read_exact(&mut len_buf).await.is_err() {
            info!(connection = %connection_id, "client closed connection");
            return Ok(());
        }

        let frame_len = binary_codec::frame_len(len_buf)?;
        if frame_len == 0 {
            continue;
        }

        frame.resize(frame_len, 0);
        read_stream.read_exact(&mut frame[..]).await?;

        match binary_codec::decode_input(&frame) {
            Ok(msg) => {
                if !forward(connection_id, coordinator_tx, msg) {
                    return Ok(());
                }
            }
            Err(err) => reject(connection_id, out_tx, &err),
        }
    }
}

/// Hand a request to the coordinator. False once the coordinator is gone.
fn forward(
    connection_id: ConnectionId,
    coordinator_tx: &CoordinatorTx,
    msg: duel_core::InputMessage,
) -> bool {
    let req = CoordinatorRequest::Message { connection_id, msg };
    if coordinator_tx.send(req).is_err() {
        warn!("Coordinator channel closed");
        return false;
    }
    true
}

/// Undecodable requests are answered locally and never reach the coordinator.
fn reject(connection_id: ConnectionId, out_tx: &OutboundTx, err: &ProtocolError) {
    debug!(connection = %connection_id, %err, "bad request");
    let _ = out_tx.send(OutputMessage::bad_request(err.to_string()));
}

async fn run_writer(
    connection_id: ConnectionId,
    mut write_stream: OwnedWriteHalf,
    mut out_rx: OutboundRx,
    protocol: Protocol,
) {
    while let Some(msg) = out_rx.recv().await {
        // One message that cannot be encoded must not cut off the rest.
        let bytes = match encode_message(protocol, &msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(connection = %connection_id, error = %e, "unencodable message skipped");
                continue;
            }
        };

        if let Err(e) = write_bytes(&mut write_stream, &bytes).await {
            warn!(connection = %connection_id, error = %e, "write failed");
            break;
        }
    }
}

fn encode_message(protocol: Protocol, msg: &OutputMessage) -> Result<Vec<u8>, ProtocolError> {
    match protocol {
        Protocol::JsonLines => {
            let mut line = json_codec::format_output_line(msg)?;
            line.push('\n');
            Ok(line.into_bytes())
        }
        Protocol::Binary => {
            let mut payload = Vec::with_capacity(128);
            binary_codec::encode_output(msg, &mut payload)?;

            let mut framed = Vec::with_capacity(payload.len() + FRAME_PREFIX_LEN);
            binary_codec::encode_frame(&payload, &mut framed)?;
            Ok(framed)
        }
    }
}

async fn write_bytes(stream: &mut OwnedWriteHalf, bytes: &[u8]) -> Result<()> {
    stream.write_all(bytes).await?;
    stream.flush().await?;
    Ok(())
}
