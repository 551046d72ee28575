//! Raw protocol console: type JSON requests, they go out as binary frames,
//! replies come back as JSON lines.

use std::env;
use std::error::Error;
use std::io::{self, Write};
use std::time::Duration;

use duel_core::InputMessage;
use duel_protocol::json_codec::{format_output_line, parse_input_line};
use duel_protocol::{decode_output, encode_frame, encode_input, frame_len};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Where to connect: env override or default.
    let addr = env::var("DUEL_CLIENT_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());

    println!("Connecting to {}...", addr);
    let mut stream = TcpStream::connect(&addr).await?;
    println!("Connected.");
    println!("Type JSON requests like:");
    println!(r#"  {{"type":"create-challenge"}}"#);
    println!(r#"  {{"type":"join-challenge","session_id":"<id>"}}"#);
    println!(r#"  {{"type":"move","session_id":"<id>","san":"e4"}}"#);
    println!(r#"  {{"type":"leave"}}"#);
    println!("Type 'quit' or 'exit' to leave.\n");

    let stdin = io::stdin();

    loop {
        // Prompt
        print!(">> ");
        io::stdout().flush()?;

        let mut line = String::new();
        let n = stdin.read_line(&mut line)?;
        if n == 0 {
            // EOF
            println!("\nEOF on stdin, exiting client.");
            break;
        }

        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
            println!("Exiting client.");
            break;
        }

        // An empty line just polls for pending events.
        if !trimmed.is_empty() {
            let input_msg: InputMessage = match parse_input_line(trimmed) {
                Ok(Some(m)) => m,
                Ok(None) => continue,
                Err(e) => {
                    eprintln!("Could not parse request: {}", e);
                    continue;
                }
            };

            let mut payload = Vec::with_capacity(128);
            encode_input(&input_msg, &mut payload)?;
            let mut framed = Vec::with_capacity(payload.len() + 4);
            encode_frame(&payload, &mut framed)?;
            stream.write_all(&framed).await?;
        }

        // Read back every event that arrives shortly after.
        loop {
            let mut len_buf = [0u8; 4];

            match timeout(Duration::from_millis(100), stream.read_exact(&mut len_buf)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    eprintln!("Read error (len): {:?}", e);
                    return Ok(());
                }
                // Timed out waiting for the next event.
                Err(_) => break,
            }

            let body_len = frame_len(len_buf)?;
            let mut buf = vec![0u8; body_len];
            match timeout(Duration::from_millis(100), stream.read_exact(&mut buf)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    eprintln!("Read error (frame): {:?}", e);
                    return Ok(());
                }
                Err(_) => {
                    eprintln!("Timed out reading frame body.");
                    break;
                }
            }

            let msg = decode_output(&buf)?;
            println!("<< {}", format_output_line(&msg)?);
        }
    }

    Ok(())
}
