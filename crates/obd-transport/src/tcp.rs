//! TCP transport for WiFi OBD-II dongles
//!
//! WiFi ELM327 clones expose a bare TCP socket, conventionally at
//! 192.168.0.10:35000. The response framing is identical to serial: a
//! contiguous byte stream terminated by the `>` prompt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, trace};

use crate::{Transport, TransportError};

/// TCP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpTransportConfig {
    /// Dongle host address
    pub host: String,
    /// Dongle TCP port
    pub port: u16,
    /// Disable Nagle's algorithm; command/response traffic is latency-bound
    pub no_delay: bool,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            host: "192.168.0.10".to_string(),
            port: 35000,
            no_delay: true,
        }
    }
}

impl TcpTransportConfig {
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.host.is_empty() {
            return Err(TransportError::Config("host cannot be empty".into()));
        }
        if self.port == 0 {
            return Err(TransportError::Config("port cannot be zero".into()));
        }
        Ok(())
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// TCP implementation of [`Transport`]
pub struct TcpTransport {
    config: TcpTransportConfig,
    stream: Option<TcpStream>,
    /// Bytes received past the last delimiter
    pending: VecDeque<u8>,
}

impl TcpTransport {
    pub fn new(config: TcpTransportConfig) -> Result<Self, TransportError> {
        config.validate()?;
        Ok(Self {
            config,
            stream: None,
            pending: VecDeque::new(),
        })
    }

    /// Drain `self.pending` up to and including `delimiter`, if present
    fn take_buffered(&mut self, delimiter: u8) -> Option<Vec<u8>> {
        let pos = self.pending.iter().position(|&b| b == delimiter)?;
        Some(self.pending.drain(..=pos).collect())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self, connect_timeout: Duration) -> Result<(), TransportError> {
        let endpoint = self.config.endpoint();
        info!(%endpoint, "connecting TCP transport");

        let stream = timeout(connect_timeout, TcpStream::connect(&endpoint))
            .await
            .map_err(|_| TransportError::Timeout(connect_timeout))?
            .map_err(|e| TransportError::ConnectFailed {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        if self.config.no_delay {
            stream.set_nodelay(true)?;
        }

        self.pending.clear();
        self.stream = Some(stream);
        info!(%endpoint, "TCP transport connected");
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        trace!(bytes = data.len(), "tcp write");
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read_until(
        &mut self,
        delimiter: u8,
        read_timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        if let Some(buffered) = self.take_buffered(delimiter) {
            return Ok(buffered);
        }

        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let deadline = tokio::time::Instant::now() + read_timeout;
        let mut chunk = [0u8; 256];

        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .ok_or(TransportError::Timeout(read_timeout))?;

            let n = timeout(remaining, stream.read(&mut chunk))
                .await
                .map_err(|_| TransportError::Timeout(read_timeout))??;

            if n == 0 {
                self.stream = None;
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "peer closed connection",
                )));
            }

            trace!(bytes = n, "tcp read chunk");
            self.pending.extend(&chunk[..n]);

            if let Some(pos) = self.pending.iter().position(|&b| b == delimiter) {
                return Ok(self.pending.drain(..=pos).collect());
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            debug!("closing TCP transport");
            let _ = stream.shutdown().await;
        }
        self.pending.clear();
        Ok(())
    }

    fn endpoint(&self) -> String {
        self.config.endpoint()
    }
}
