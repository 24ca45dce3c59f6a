use std::io;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::SinkError;

/// ============================================================
/// SinkConnector
/// ============================================================
///
/// Knows how to open a fresh byte stream to the metrics sink.
///
/// The connection itself (state, timeouts, shutdown) lives in
/// `SinkConnection`; connectors only open streams.
#[async_trait::async_trait]
pub trait SinkConnector: Send + Sync {
    type Stream: AsyncWrite + Unpin + Send;

    /// Address (or mode) used in log lines.
    fn describe(&self) -> String;

    async fn connect(&self) -> io::Result<Self::Stream>;

    /// Demo connectors discard everything they are given.
    fn is_demo(&self) -> bool {
        false
    }
}

/// Plain TCP to a Carbon pickle receiver (usually port 2004).
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait::async_trait]
impl SinkConnector for TcpConnector {
    type Stream = TcpStream;

    fn describe(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// DEMO MODE:
/// - No network connection
/// - Every byte is accepted and dropped
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoConnector;

#[async_trait::async_trait]
impl SinkConnector for DemoConnector {
    type Stream = tokio::io::Sink;

    fn describe(&self) -> String {
        "demo (discarding)".into()
    }

    async fn connect(&self) -> io::Result<tokio::io::Sink> {
        Ok(tokio::io::sink())
    }

    fn is_demo(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// ============================================================
/// SinkConnection
/// ============================================================
///
/// A single outbound stream to the sink.
///
/// State machine:
/// - Disconnected --connect()--> Connected
/// - Connected --any send error or timeout--> Disconnected
///
/// The retry policy lives with the caller so that reconnect
/// delays are visible to the tick pacing.
pub struct SinkConnection<C: SinkConnector> {
    connector: C,
    timeout: Duration,
    stream: Option<C::Stream>,

    /// Successful connects, the first one included.
    connects: u64,
}

impl<C: SinkConnector> SinkConnection<C> {
    pub fn new(connector: C, timeout: Duration) -> Self {
        Self {
            connector,
            timeout,
            stream: None,
            connects: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.stream.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn connects(&self) -> u64 {
        self.connects
    }

    pub fn describe(&self) -> String {
        self.connector.describe()
    }

    pub fn is_demo(&self) -> bool {
        self.connector.is_demo()
    }

    /// Opens a fresh stream, dropping (and thereby closing) any previous one.
    pub async fn connect(&mut self) -> Result<(), SinkError> {
        self.stream = None;
        info!("connecting to carbon {}", self.connector.describe());

        let stream = match timeout(self.timeout, self.connector.connect()).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(SinkError::Io { op: "connect", source }),
            Err(_) => {
                return Err(SinkError::Timeout {
                    op: "connect",
                    timeout: self.timeout,
                });
            }
        };

        self.stream = Some(stream);
        self.connects += 1;
        Ok(())
    }

    /// Issues a single write of `buf` and returns the number of bytes
    /// the transport accepted. The caller verifies it is complete.
    pub async fn send(&mut self, buf: &[u8]) -> Result<usize, SinkError> {
        let stream = self.stream.as_mut().ok_or(SinkError::NotConnected)?;

        let result = match timeout(self.timeout, stream.write(buf)).await {
            Ok(Ok(sent)) => Ok(sent),
            Ok(Err(source)) => Err(SinkError::Io { op: "send", source }),
            Err(_) => Err(SinkError::Timeout {
                op: "send",
                timeout: self.timeout,
            }),
        };

        if result.is_err() {
            // the socket is unusable after any failure
            self.stream = None;
        }
        result
    }

    /// Best-effort graceful close. Failures are logged, never returned.
    pub async fn shutdown(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };

        match timeout(self.timeout, stream.shutdown()).await {
            Ok(Ok(())) => debug!("carbon socket shut down"),
            Ok(Err(e)) => warn!("failed to shut sock: {e}"),
            Err(_) => warn!("failed to shut sock: timed out after {:?}", self.timeout),
        }
    }
}
