//! Player client library: the TCP connector and handshake in [`network`],
//! and the local match view (move parsing, text rendering) in [`game`].
//! The binary in `main.rs` wires both to a terminal.

pub mod game;
pub mod network;
