//! duel-protocol
//!
//! Wire-level encoding/decoding for duel sessions.
//!
//! This crate turns logical session messages
//! (`duel_core::InputMessage` / `OutputMessage`) into bytes and back.
//!
//! - [`binary_codec`] : length-prefixed binary protocol (for TCP clients)
//! - [`json_codec`]   : newline-delimited JSON (for netcat / tooling)

pub mod wire_types;
pub mod binary_codec;
pub mod json_codec;

pub use binary_codec::{
    ProtocolError,
    decode_input,
    encode_input,
    decode_output,
    encode_output,
    encode_frame,
    frame_len,
    peek_frame,
};
