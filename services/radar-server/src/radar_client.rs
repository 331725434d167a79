//! Owns the one TCP session to the sensor: frames requests as
//! `STX payload ETX` and reads framed replies under a bounded timeout.
//!
//! Grounded on the legacy `src/workers/timing_reader.rs` connect-out/
//! reconnect-on-error worker shape (read via `TcpStream::read` under a
//! `tokio::time::timeout`), generalized from a line-reader to a
//! request/reply client.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const STX: u8 = 0x02;
const ETX: u8 = 0x03;
const READ_BUFFER_CAP: usize = 4096;

#[derive(Debug)]
pub enum RadarClientError {
    Connect(String),
    Io(String),
}

impl std::fmt::Display for RadarClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RadarClientError::Connect(s) => write!(f, "connect_error: {s}"),
            RadarClientError::Io(s) => write!(f, "io_error: {s}"),
        }
    }
}

impl std::error::Error for RadarClientError {}

pub struct RadarClient {
    host: String,
    port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
    stream: Option<TcpStream>,
}

impl RadarClient {
    #[must_use]
    pub fn new(host: String, port: u16, connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            host,
            port,
            connect_timeout,
            read_timeout,
            stream: None,
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Idempotent while connected; establishes a session otherwise.
    pub async fn connect(&mut self) -> Result<(), RadarClientError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let addr = format!("{}:{}", self.host, self.port);
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| RadarClientError::Connect(format!("timed out connecting to {addr}")))?
            .map_err(|e| RadarClientError::Connect(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Frames `cmd` as `STX cmd ETX`, writes it, then reads up to
    /// `READ_BUFFER_CAP` bytes within the read timeout. Any I/O failure
    /// marks the session disconnected so the caller reconnects on the
    /// next tick.
    pub async fn send_command(&mut self, cmd: &str) -> Result<Vec<u8>, RadarClientError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(RadarClientError::Io("not connected".to_owned()));
        };

        let mut framed = Vec::with_capacity(cmd.len() + 2);
        framed.push(STX);
        framed.extend_from_slice(cmd.as_bytes());
        framed.push(ETX);

        if let Err(e) = stream.write_all(&framed).await {
            self.stream = None;
            return Err(RadarClientError::Io(e.to_string()));
        }

        let mut buf = vec![0u8; READ_BUFFER_CAP];
        let read_result = tokio::time::timeout(self.read_timeout, stream.read(&mut buf)).await;
        match read_result {
            Ok(Ok(0)) => {
                self.stream = None;
                Err(RadarClientError::Io("peer closed connection".to_owned()))
            }
            Ok(Ok(n)) => {
                buf.truncate(n);
                Ok(buf)
            }
            Ok(Err(e)) => {
                self.stream = None;
                Err(RadarClientError::Io(e.to_string()))
            }
            Err(_) => {
                self.stream = None;
                Err(RadarClientError::Io("read timed out".to_owned()))
            }
        }
    }

    pub async fn close(&mut self) {
        self.stream = None;
    }

    /// Connects if necessary, then sends `cmd` — the single entry point
    /// the Acquisition Loop drives each tick.
    pub async fn poll(&mut self, cmd: &str) -> Result<Vec<u8>, RadarClientError> {
        self.connect().await?;
        self.send_command(cmd).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radar_test_utils::MockRadarServer;

    #[tokio::test]
    async fn connect_and_round_trip_command() {
        let server = MockRadarServer::start().await;
        server.push_reply(b"sRA LMDradardata ok".to_vec());
        let mut client = RadarClient::new(
            "127.0.0.1".to_owned(),
            server.local_addr().port(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        client.connect().await.unwrap();
        let reply = client.send_command("sRN LMDradardata").await.unwrap();
        assert_eq!(reply, b"sRA LMDradardata ok");
    }

    #[tokio::test]
    async fn disconnect_surfaces_as_io_error_and_clears_session() {
        let server = MockRadarServer::start().await;
        server.push_disconnect();
        let mut client = RadarClient::new(
            "127.0.0.1".to_owned(),
            server.local_addr().port(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        client.connect().await.unwrap();
        let err = client.send_command("sRN LMDradardata").await.unwrap_err();
        assert!(matches!(err, RadarClientError::Io(_)));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn read_timeout_surfaces_as_io_error() {
        let server = MockRadarServer::start().await;
        server.push_silent();
        let mut client = RadarClient::new(
            "127.0.0.1".to_owned(),
            server.local_addr().port(),
            Duration::from_secs(1),
            Duration::from_millis(50),
        );
        client.connect().await.unwrap();
        let err = client.send_command("sRN LMDradardata").await.unwrap_err();
        assert!(matches!(err, RadarClientError::Io(_)));
    }

    #[tokio::test]
    async fn connect_is_idempotent_while_connected() {
        let server = MockRadarServer::start().await;
        let mut client = RadarClient::new(
            "127.0.0.1".to_owned(),
            server.local_addr().port(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        client.connect().await.unwrap();
        client.connect().await.unwrap();
        assert!(client.is_connected());
    }
}
