//! Length-prefixed framing for control messages and file transfer.
//!
//! Every frame is a 4-byte big-endian length header followed by exactly
//! that many payload bytes. A payload is either one JSON-serialized message
//! or raw file content, never both on the same frame. Game traffic does not
//! use these frames at all; it is newline-delimited JSON handled by the
//! session layer, and the two styles are never mixed on one connection.

use crate::{FILE_CHUNK_SIZE, MAX_MESSAGE_LEN};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Failures at the framing layer. `Io` covers transport faults; the other
/// variants are protocol violations by the peer or an unusable payload.
#[derive(Debug)]
pub enum FrameError {
    Io(io::Error),
    /// The length header exceeds [`MAX_MESSAGE_LEN`].
    Oversized { len: u32, max: u32 },
    /// The stream closed mid-header or mid-payload.
    Truncated,
    /// The payload was not valid JSON for the expected message type.
    Malformed(serde_json::Error),
    /// A file transfer ended before the declared size arrived.
    IncompleteTransfer { received: u64, expected: u64 },
    /// The file is too large for the 4-byte length header.
    TooLarge(u64),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Io(err) => write!(f, "I/O error: {}", err),
            FrameError::Oversized { len, max } => {
                write!(f, "frame length {} exceeds maximum {}", len, max)
            }
            FrameError::Truncated => f.write_str("stream closed inside a frame"),
            FrameError::Malformed(err) => write!(f, "malformed payload: {}", err),
            FrameError::IncompleteTransfer { received, expected } => write!(
                f,
                "incomplete transfer: received {} of {} bytes",
                received, expected
            ),
            FrameError::TooLarge(size) => {
                write!(f, "file of {} bytes exceeds the 4-byte length header", size)
            }
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameError::Io(err) => Some(err),
            FrameError::Malformed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for FrameError {
    fn from(err: io::Error) -> Self {
        FrameError::Io(err)
    }
}

/// Serializes `value` and writes it as one frame: header and payload in a
/// single write call. Any error must be treated as connection loss.
pub async fn send_message<S, T>(stream: &mut S, value: &T) -> Result<(), FrameError>
where
    S: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_vec(value).map_err(FrameError::Malformed)?;
    if payload.len() > MAX_MESSAGE_LEN as usize {
        return Err(FrameError::Oversized {
            len: payload.len() as u32,
            max: MAX_MESSAGE_LEN,
        });
    }
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    stream.write_all(&frame).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads one framed message. Returns `Ok(None)` when the peer closed the
/// stream cleanly before any header byte arrived, so callers can tell
/// "peer hung up" apart from malformed data.
pub async fn receive_message<S, T>(stream: &mut S) -> Result<Option<T>, FrameError>
where
    S: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = match read_header(stream).await? {
        Some(len) => len,
        None => return Ok(None),
    };
    if len > MAX_MESSAGE_LEN {
        return Err(FrameError::Oversized {
            len,
            max: MAX_MESSAGE_LEN,
        });
    }
    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload).await.map_err(eof_as_truncated)?;
    serde_json::from_slice(&payload)
        .map(Some)
        .map_err(FrameError::Malformed)
}

/// Streams the file at `path` as one frame, reading and writing in
/// [`FILE_CHUNK_SIZE`] chunks so large files never sit in memory whole.
/// Returns the number of payload bytes sent.
pub async fn send_file<S>(stream: &mut S, path: &Path) -> Result<u64, FrameError>
where
    S: AsyncWrite + Unpin,
{
    let size = fs::metadata(path).await?.len();
    if size > u32::MAX as u64 {
        return Err(FrameError::TooLarge(size));
    }
    stream.write_all(&(size as u32).to_be_bytes()).await?;

    let mut file = fs::File::open(path).await?;
    let mut chunk = [0u8; FILE_CHUNK_SIZE];
    let mut sent: u64 = 0;
    loop {
        let read = file.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        stream.write_all(&chunk[..read]).await?;
        sent += read as u64;
    }
    stream.flush().await?;
    debug!("sent {} ({} bytes)", path.display(), sent);
    Ok(sent)
}

/// Receives one framed file into `path`, creating missing parent
/// directories. If the stream ends before the declared size arrives the
/// transfer fails with [`FrameError::IncompleteTransfer`]; partial content
/// is never reported as success. Returns the number of bytes received.
pub async fn receive_file<S>(stream: &mut S, path: &Path) -> Result<u64, FrameError>
where
    S: AsyncRead + Unpin,
{
    let expected = match read_header(stream).await? {
        Some(len) => len as u64,
        None => return Err(FrameError::Truncated),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(path).await?;
    let mut chunk = [0u8; FILE_CHUNK_SIZE];
    let mut received: u64 = 0;
    while received < expected {
        let want = FILE_CHUNK_SIZE.min((expected - received) as usize);
        let read = stream.read(&mut chunk[..want]).await?;
        if read == 0 {
            return Err(FrameError::IncompleteTransfer { received, expected });
        }
        file.write_all(&chunk[..read]).await?;
        received += read as u64;
    }
    file.flush().await?;
    debug!("received {} ({} bytes)", path.display(), received);
    Ok(received)
}

/// Reads the 4-byte header, distinguishing clean EOF (no bytes at all,
/// `None`) from a close partway through the header (`Truncated`).
async fn read_header<S>(stream: &mut S) -> Result<Option<u32>, FrameError>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let read = stream.read(&mut header[filled..]).await?;
        if read == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(FrameError::Truncated)
            };
        }
        filled += read;
    }
    Ok(Some(u32::from_be_bytes(header)))
}

fn eof_as_truncated(err: io::Error) -> FrameError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        FrameError::Truncated
    } else {
        FrameError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use tokio::io::duplex;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("parlor-framing-{}-{}", std::process::id(), name))
    }

    #[tokio::test]
    async fn test_message_roundtrip() {
        let (mut a, mut b) = duplex(1024);

        let sent = json!({"cmd": "list_all_games"});
        send_message(&mut a, &sent).await.unwrap();

        let received: Option<Value> = receive_message(&mut b).await.unwrap();
        assert_eq!(received, Some(sent));
    }

    #[tokio::test]
    async fn test_multiple_messages_on_one_stream() {
        let (mut a, mut b) = duplex(4096);

        for index in 0..3 {
            send_message(&mut a, &json!({ "seq": index })).await.unwrap();
        }

        for index in 0..3 {
            let received: Option<Value> = receive_message(&mut b).await.unwrap();
            assert_eq!(received, Some(json!({ "seq": index })));
        }
    }

    #[tokio::test]
    async fn test_clean_eof_is_none_not_error() {
        let (a, mut b) = duplex(64);
        drop(a);

        let received: Option<Value> = receive_message(&mut b).await.unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn test_oversized_header_rejected() {
        let (mut a, mut b) = duplex(64);
        a.write_all(&(MAX_MESSAGE_LEN + 1).to_be_bytes()).await.unwrap();

        let result = receive_message::<_, Value>(&mut b).await;
        match result {
            Err(FrameError::Oversized { len, max }) => {
                assert_eq!(len, MAX_MESSAGE_LEN + 1);
                assert_eq!(max, MAX_MESSAGE_LEN);
            }
            other => panic!("expected oversized error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_mid_header_is_truncated() {
        let (mut a, mut b) = duplex(64);
        a.write_all(&[0u8, 0]).await.unwrap();
        drop(a);

        let result = receive_message::<_, Value>(&mut b).await;
        assert!(matches!(result, Err(FrameError::Truncated)));
    }

    #[tokio::test]
    async fn test_close_mid_payload_is_truncated() {
        let (mut a, mut b) = duplex(64);
        a.write_all(&10u32.to_be_bytes()).await.unwrap();
        a.write_all(b"abc").await.unwrap();
        drop(a);

        let result = receive_message::<_, Value>(&mut b).await;
        assert!(matches!(result, Err(FrameError::Truncated)));
    }

    #[tokio::test]
    async fn test_malformed_payload_rejected() {
        let (mut a, mut b) = duplex(64);
        a.write_all(&4u32.to_be_bytes()).await.unwrap();
        a.write_all(b"!!!!").await.unwrap();

        let result = receive_message::<_, Value>(&mut b).await;
        assert!(matches!(result, Err(FrameError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_file_roundtrip_sizes() {
        // Zero bytes, a single byte, one byte under and over a chunk
        // boundary, an exact chunk, and several chunks.
        let sizes = [0usize, 1, FILE_CHUNK_SIZE - 1, FILE_CHUNK_SIZE, FILE_CHUNK_SIZE + 1, FILE_CHUNK_SIZE * 3 + 123];
        let dir = scratch_dir("roundtrip");
        std::fs::create_dir_all(&dir).unwrap();

        for (index, size) in sizes.into_iter().enumerate() {
            let content: Vec<u8> = (0..size).map(|byte| (byte % 251) as u8).collect();
            let source = dir.join(format!("source-{}.bin", index));
            let dest = dir.join(format!("dest-{}.bin", index));
            std::fs::write(&source, &content).unwrap();

            // A small duplex buffer forces sender and receiver to interleave
            // chunk by chunk.
            let (mut a, mut b) = duplex(512);
            let send = send_file(&mut a, &source);
            let receive = receive_file(&mut b, &dest);
            let (sent, received) = tokio::join!(send, receive);
            assert_eq!(sent.unwrap(), size as u64);
            assert_eq!(received.unwrap(), size as u64);

            assert_eq!(std::fs::read(&dest).unwrap(), content);
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_receive_file_creates_parent_directories() {
        let dir = scratch_dir("mkdirs");
        let dest = dir.join("a").join("b").join("game.bin");

        let (mut a, mut b) = duplex(64);
        a.write_all(&3u32.to_be_bytes()).await.unwrap();
        a.write_all(b"abc").await.unwrap();

        let received = receive_file(&mut b, &dest).await.unwrap();
        assert_eq!(received, 3);
        assert_eq!(std::fs::read(&dest).unwrap(), b"abc");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_incomplete_transfer_reported() {
        let dir = scratch_dir("incomplete");
        std::fs::create_dir_all(&dir).unwrap();
        let dest = dir.join("partial.bin");

        let (mut a, mut b) = duplex(64);
        a.write_all(&100u32.to_be_bytes()).await.unwrap();
        a.write_all(&[7u8; 10]).await.unwrap();
        drop(a);

        let result = receive_file(&mut b, &dest).await;
        match result {
            Err(FrameError::IncompleteTransfer { received, expected }) => {
                assert_eq!(received, 10);
                assert_eq!(expected, 100);
            }
            other => panic!("expected incomplete transfer, got {:?}", other),
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
