//! Per-player session channels and the identity handshake.
//!
//! A freshly accepted connection owes the server exactly one line: the role
//! it claims (`"P1"`, `"P2"`, ...). The claim is bound once and is immutable
//! for the rest of the match; a second connection claiming a bound role is
//! rejected. Game traffic on the channel is newline-delimited JSON.

use log::{info, warn};
use serde::Serialize;
use shared::Role;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

/// What to do with the listening slot when a connection fails the
/// handshake: tear the whole match down, or close the offender and keep
/// waiting for a valid replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakePolicy {
    #[default]
    Abort,
    Retry,
}

#[derive(Debug)]
pub enum HandshakeError {
    Io(io::Error),
    /// The first line was not a role string, or not a role in this match.
    InvalidRole { claim: String, peer: SocketAddr },
    /// The claimed role is already bound to a live connection.
    DuplicateRole { role: Role, peer: SocketAddr },
    /// The peer closed the connection before sending its claim.
    ClosedBeforeClaim { peer: SocketAddr },
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::Io(err) => write!(f, "I/O error during handshake: {}", err),
            HandshakeError::InvalidRole { claim, peer } => {
                write!(f, "{} claimed invalid role {:?}", peer, claim)
            }
            HandshakeError::DuplicateRole { role, peer } => {
                write!(f, "{} claimed already-bound role {}", peer, role)
            }
            HandshakeError::ClosedBeforeClaim { peer } => {
                write!(f, "{} disconnected before claiming a role", peer)
            }
        }
    }
}

impl std::error::Error for HandshakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HandshakeError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for HandshakeError {
    fn from(err: io::Error) -> Self {
        HandshakeError::Io(err)
    }
}

/// One player's connection, with its role bound by the handshake.
pub struct SessionChannel {
    role: Role,
    peer: SocketAddr,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl SessionChannel {
    /// Performs the identity handshake: blocks on the peer's first line and
    /// interprets it as the claimed role. Syntax is validated here; whether
    /// the role is in range and unclaimed is for [`accept_players`].
    pub async fn handshake(stream: TcpStream, peer: SocketAddr) -> Result<Self, HandshakeError> {
        let (read_half, writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(HandshakeError::ClosedBeforeClaim { peer });
        }

        let claim = line.trim();
        let role = claim.parse::<Role>().map_err(|_| HandshakeError::InvalidRole {
            claim: claim.to_string(),
            peer,
        })?;

        Ok(SessionChannel {
            role,
            peer,
            reader,
            writer,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Writes one JSON line to the peer. A failure here means the
    /// connection is gone.
    pub async fn send_update<T: Serialize>(&mut self, update: &T) -> io::Result<()> {
        let mut line = serde_json::to_string(update)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await
    }

    /// Splits the channel so a reader task can own the receive side while
    /// the coordinator keeps the write half for broadcasts.
    pub fn into_parts(self) -> (Role, BufReader<OwnedReadHalf>, OwnedWriteHalf) {
        (self.role, self.reader, self.writer)
    }
}

/// Accepts connections until every role `P1..=Prequired` is bound, running
/// the handshake on each. Connections failing the handshake either abort
/// the whole setup or are closed and replaced, per `policy`. The match
/// must not proceed until the returned map holds all `required` roles.
pub async fn accept_players(
    listener: &TcpListener,
    required: u8,
    policy: HandshakePolicy,
) -> Result<BTreeMap<Role, SessionChannel>, HandshakeError> {
    let mut channels: BTreeMap<Role, SessionChannel> = BTreeMap::new();

    while channels.len() < required as usize {
        let (stream, peer) = listener.accept().await?;

        let failure = match SessionChannel::handshake(stream, peer).await {
            Ok(channel) => {
                let role = channel.role();
                if role.seat() > required {
                    HandshakeError::InvalidRole {
                        claim: role.to_string(),
                        peer,
                    }
                } else if channels.contains_key(&role) {
                    HandshakeError::DuplicateRole { role, peer }
                } else {
                    info!(
                        "{} bound to {} ({}/{} players)",
                        role,
                        peer,
                        channels.len() + 1,
                        required
                    );
                    channels.insert(role, channel);
                    continue;
                }
                // Dropping the channel closes the rejected connection.
            }
            Err(err @ HandshakeError::Io(_)) => return Err(err),
            Err(err) => err,
        };

        match policy {
            HandshakePolicy::Abort => return Err(failure),
            HandshakePolicy::Retry => {
                warn!("{}; waiting for a replacement", failure);
            }
        }
    }

    Ok(channels)
}
