//! Client-side connection handling: connect, claim a role, then exchange
//! newline-delimited JSON with the game server.

use log::debug;
use shared::{Move, Role, ServerUpdate};
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

pub struct GameClient {
    role: Role,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl GameClient {
    /// Connects to the game server and performs the identity handshake:
    /// the very first line on the wire is the claimed role.
    pub async fn connect(addr: &str, role: Role) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, mut writer) = stream.into_split();
        writer.write_all(format!("{}\n", role).as_bytes()).await?;

        Ok(GameClient {
            role,
            reader: BufReader::new(read_half),
            writer,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Reads the next server update. `Ok(None)` means the server closed
    /// the connection; for an aborted match that is all the notice given.
    pub async fn next_update(&mut self) -> io::Result<Option<ServerUpdate>> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).await?;
        if read == 0 {
            return Ok(None);
        }
        let update: ServerUpdate = serde_json::from_str(line.trim())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        debug!("update: {:?}", update);
        Ok(Some(update))
    }

    /// Submits one move as a JSON line.
    pub async fn submit(&mut self, submitted: &Move) -> io::Result<()> {
        let mut line = serde_json::to_string(submitted)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await
    }
}
