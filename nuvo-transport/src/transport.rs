//! Duplex byte stream over serial or TCP

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_serial::SerialPortBuilderExt;
use tracing::debug;

/// Anything that can back a transport: a serial port, a TCP socket, or an
/// in-memory stream in tests.
pub trait Duplex: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Duplex for T {}

/// The single physical link to the amplifier
///
/// The link is half-duplex in practice: correlation of acknowledgements
/// relies on at most one unacknowledged write being outstanding, which the
/// dispatcher enforces. The transport itself just moves bytes and surfaces
/// [`TransportError::Disconnected`] when the link dies.
pub struct Transport {
    stream: Box<dyn Duplex>,
    endpoint: String,
}

impl Transport {
    /// Open the link described by `endpoint`
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        let stream: Box<dyn Duplex> = match endpoint {
            Endpoint::Serial { path, baud } => {
                debug!(path, baud, "opening serial device");
                let port = tokio_serial::new(path.as_str(), *baud)
                    .open_native_async()
                    .map_err(|e| TransportError::Open {
                        endpoint: endpoint.to_string(),
                        source: e.into(),
                    })?;
                Box::new(port)
            }
            Endpoint::Tcp { host, port } => {
                debug!(host, port, "connecting to serial bridge");
                let stream = TcpStream::connect((host.as_str(), *port))
                    .await
                    .map_err(|e| TransportError::Open {
                        endpoint: endpoint.to_string(),
                        source: e,
                    })?;
                stream.set_nodelay(true).ok();
                Box::new(stream)
            }
        };
        Ok(Self {
            stream,
            endpoint: endpoint.to_string(),
        })
    }

    /// Wrap an already-open stream; used by tests to drive the stack with an
    /// in-memory duplex pipe.
    pub fn from_stream(stream: impl Duplex + 'static, label: impl Into<String>) -> Self {
        Self {
            stream: Box::new(stream),
            endpoint: label.into(),
        }
    }

    /// Read whatever bytes are available, waiting for at least one
    ///
    /// Returns the number of bytes placed in `buf`. A zero-length read means
    /// the peer closed the link and is reported as `Disconnected`.
    pub async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.stream.read(buf).await {
            Ok(0) => Err(TransportError::Disconnected(format!(
                "{}: end of stream",
                self.endpoint
            ))),
            Ok(n) => Ok(n),
            Err(e) => Err(TransportError::Disconnected(format!(
                "{}: {e}",
                self.endpoint
            ))),
        }
    }

    /// Write a full buffer to the link
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream
            .write_all(bytes)
            .await
            .map_err(|e| TransportError::Disconnected(format!("{}: {e}", self.endpoint)))?;
        self.stream
            .flush()
            .await
            .map_err(|e| TransportError::Disconnected(format!("{}: {e}", self.endpoint)))
    }

    /// The endpoint this transport was opened against, for diagnostics
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let (near, far) = tokio::io::duplex(64);
        let mut transport = Transport::from_stream(near, "test");
        let (mut far_read, mut far_write) = tokio::io::split(far);

        transport.write(b"*Z1ON\r").await.unwrap();
        let mut buf = [0u8; 16];
        let n = far_read.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"*Z1ON\r");

        far_write.write_all(b"#Z1,OFF\r").await.unwrap();
        let n = transport.read_available(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"#Z1,OFF\r");
    }

    #[tokio::test]
    async fn test_peer_close_is_disconnected() {
        let (near, far) = tokio::io::duplex(64);
        let mut transport = Transport::from_stream(near, "test");
        drop(far);

        let mut buf = [0u8; 16];
        let err = transport.read_available(&mut buf).await.unwrap_err();
        assert!(matches!(err, TransportError::Disconnected(_)));
    }
}
