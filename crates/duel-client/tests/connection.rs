// crates/duel-client/tests/connection.rs
use std::time::Duration;

use duel_client::network::{ConnectionEvent, ServerConnection};
use duel_client::types::ReconnectPolicy;
use duel_core::InputMessage;
use duel_protocol::{decode_input, frame_len};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn queued_leave_is_written_before_the_task_exits() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (tx, rx) = mpsc::unbounded_channel();
    let policy = ReconnectPolicy {
        max_attempts: 0,
        ..ReconnectPolicy::default()
    };
    let handle = tokio::spawn(ServerConnection::new(&addr, policy, events_tx).run(rx));

    let (mut server_side, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    assert_eq!(
        timeout(WAIT, events_rx.recv()).await.unwrap(),
        Some(ConnectionEvent::Connected)
    );

    // Shutdown: the last request goes out, then the sender is dropped.
    tx.send(InputMessage::Leave).unwrap();
    drop(tx);
    timeout(WAIT, handle)
        .await
        .expect("connection task did not finish")
        .unwrap();

    let mut prefix = [0u8; 4];
    timeout(WAIT, server_side.read_exact(&mut prefix))
        .await
        .unwrap()
        .unwrap();
    let mut body = vec![0u8; frame_len(prefix).unwrap()];
    server_side.read_exact(&mut body).await.unwrap();
    assert_eq!(decode_input(&body).unwrap(), InputMessage::Leave);
}
