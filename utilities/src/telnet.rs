use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, lookup_host};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, trace};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound on everything a peer may send in answer to one request.
pub const MAX_REPLY_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelnetSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for TelnetSettings {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
        }
    }
}

/// Address of a peer that serves one request per connection: the client
/// writes a single line, the peer answers with any number of lines and then
/// closes the stream.
#[derive(Debug, Clone)]
pub struct TelnetConnection {
    host: String,
    port: u16,
    settings: TelnetSettings,
}

impl TelnetConnection {
    pub fn new(host: impl Into<String>, port: u16, settings: TelnetSettings) -> Self {
        Self {
            host: host.into(),
            port,
            settings,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn settings(&self) -> TelnetSettings {
        self.settings
    }

    pub async fn open(&self) -> io::Result<TelnetSession> {
        let address = self.address();

        let socket_addr = lookup_host(address.as_str()).await?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("No address found for {}", address),
            )
        })?;

        let stream = timeout(self.settings.connect_timeout, TcpStream::connect(socket_addr))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!(
                        "Connecting to {} timed out after {:?}",
                        address, self.settings.connect_timeout
                    ),
                )
            })??;

        stream.set_nodelay(true)?;
        debug!("Opened connection to {}", address);

        let (read_half, write_half) = stream.into_split();

        Ok(TelnetSession {
            address,
            reader: Some(read_half),
            writer: write_half,
            settings: self.settings,
        })
    }
}

pub struct TelnetSession {
    address: String,
    reader: Option<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    settings: TelnetSettings,
}

impl TelnetSession {
    /// Overrides the read timeout for this session only.
    pub fn set_read_timeout(&mut self, read_timeout: Duration) {
        self.settings.read_timeout = read_timeout;
    }

    /// Starts a task that collects every line the peer sends until it closes
    /// the stream. Can only be called once per session.
    ///
    /// Bytes that are not valid UTF-8 are replaced with U+FFFD. A reply
    /// longer than [`MAX_REPLY_BYTES`] fails the reader.
    pub fn spawn_reader(&mut self) -> io::Result<LineReader> {
        let read_half = self.reader.take().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("Reader for {} already started", self.address),
            )
        })?;

        let address = self.address.clone();
        let handle = tokio::spawn(async move {
            let mut reader = BufReader::new(read_half).take(MAX_REPLY_BYTES as u64 + 1);
            let mut received = Vec::new();
            let mut buffer = Vec::new();
            let mut total = 0;

            loop {
                buffer.clear();
                let n = reader.read_until(b'\n', &mut buffer).await?;
                if n == 0 {
                    break;
                }
                total += n;
                if total > MAX_REPLY_BYTES {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("Reply from {} exceeds {} bytes", address, MAX_REPLY_BYTES),
                    ));
                }

                let line = String::from_utf8_lossy(strip_terminator(&buffer)).into_owned();
                trace!("Line from {}: {:?}", address, line);
                received.push(line);
            }

            Ok(received)
        });

        Ok(LineReader {
            address: self.address.clone(),
            handle,
            read_timeout: self.settings.read_timeout,
        })
    }

    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        let mut buffer = Vec::with_capacity(line.len() + 1);
        buffer.extend_from_slice(line.as_bytes());
        buffer.push(b'\n');

        timeout(self.settings.write_timeout, self.writer.write_all(&buffer))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("Writing to {} timed out", self.address),
                )
            })??;

        self.writer.flush().await
    }

    pub async fn close(mut self) -> io::Result<()> {
        match self.writer.shutdown().await {
            Ok(()) => Ok(()),
            // The peer closing first is the normal end of an exchange.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

pub struct LineReader {
    address: String,
    handle: JoinHandle<io::Result<Vec<String>>>,
    read_timeout: Duration,
}

impl LineReader {
    pub fn abort(self) {
        self.handle.abort();
    }

    /// Waits for the peer to close the stream and returns the lines it sent,
    /// without their terminators.
    pub async fn join(mut self) -> io::Result<Vec<String>> {
        match timeout(self.read_timeout, &mut self.handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("Reader for {} failed: {}", self.address, e),
            )),
            Err(_) => {
                self.handle.abort();
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!(
                        "{} did not close the connection within {:?}",
                        self.address, self.read_timeout
                    ),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accepts one connection, reads the request and answers with `reply`.
    async fn answering_peer(reply: Vec<u8>) -> (u16, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buffer = [0u8; 64];
            let _ = socket.read(&mut buffer).await;
            let _ = socket.write_all(&reply).await;
        });

        (port, peer)
    }

    async fn exchange(port: u16, request: &str) -> io::Result<Vec<String>> {
        let connection = TelnetConnection::new("127.0.0.1", port, TelnetSettings::default());
        let mut session = connection.open().await?;
        let reader = session.spawn_reader()?;
        session.send_line(request).await?;
        reader.join().await
    }

    #[tokio::test]
    async fn collects_lines_until_peer_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buffer = [0u8; 64];
            let n = socket.read(&mut buffer).await.unwrap();
            socket.write_all(b"first\r\nsecond\n").await.unwrap();
            String::from_utf8_lossy(&buffer[..n]).to_string()
        });

        let connection = TelnetConnection::new("127.0.0.1", port, TelnetSettings::default());
        let mut session = connection.open().await.unwrap();
        let reader = session.spawn_reader().unwrap();
        session.send_line("status").await.unwrap();
        let lines = reader.join().await.unwrap();
        session.close().await.unwrap();

        assert_eq!(peer.await.unwrap(), "status\n");
        assert_eq!(lines, vec!["first".to_string(), "second".to_string()]);
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let (port, peer) = answering_peer(b"0 caf\xff\r\nlast".to_vec()).await;

        let lines = exchange(port, "status").await.unwrap();
        peer.await.unwrap();

        assert_eq!(lines, vec!["0 caf\u{FFFD}".to_string(), "last".to_string()]);
    }

    #[tokio::test]
    async fn oversized_reply_is_rejected() {
        let mut reply = b"0 ".to_vec();
        reply.extend(std::iter::repeat_n(b'x', MAX_REPLY_BYTES));
        reply.push(b'\n');
        let (port, peer) = answering_peer(reply).await;

        let error = exchange(port, "status").await.unwrap_err();
        peer.await.unwrap();

        assert_eq!(error.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn reply_at_the_limit_is_accepted() {
        let mut reply = vec![b'x'; MAX_REPLY_BYTES - 1];
        reply.push(b'\n');
        let (port, peer) = answering_peer(reply).await;

        let lines = exchange(port, "status").await.unwrap();
        peer.await.unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), MAX_REPLY_BYTES - 1);
    }

    #[tokio::test]
    async fn reader_can_only_start_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let connection = TelnetConnection::new("127.0.0.1", port, TelnetSettings::default());
        let mut session = connection.open().await.unwrap();
        let _reader = session.spawn_reader().unwrap();

        assert!(session.spawn_reader().is_err());
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connection = TelnetConnection::new("127.0.0.1", port, TelnetSettings::default());
        assert!(connection.open().await.is_err());
    }
}
