//! TLS-over-TCP transport for the MCS connection.
//!
//! The transport moves raw bytes only; MCS framing and the version byte are
//! handled by the session on top of it.

use async_trait::async_trait;
use bytes::Bytes;
use fcmcore::net::{Transport, TransportEvent, TransportFactory};
use log::{debug, info, trace, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

const READ_BUFFER_SIZE: usize = 8 * 1024;
const EVENT_CHANNEL_CAPACITY: usize = 100;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An established byte stream, usually a TLS session to `mtalk.google.com`.
pub struct TokioTlsTransport {
    writer: Mutex<Option<BoxedWriter>>,
    shutdown: CancellationToken,
}

impl TokioTlsTransport {
    /// Wraps any duplex stream, spawning the read pump. The returned receiver
    /// yields `Connected`, then `DataReceived` chunks, then `Disconnected`
    /// exactly once.
    pub async fn from_stream<S>(stream: S) -> (Arc<dyn Transport>, mpsc::Receiver<TransportEvent>)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let shutdown = CancellationToken::new();

        let transport = Arc::new(Self {
            writer: Mutex::new(Some(Box::new(writer))),
            shutdown: shutdown.clone(),
        });

        let _ = event_tx.send(TransportEvent::Connected).await;
        tokio::spawn(read_pump(reader, event_tx, shutdown));

        (transport, event_rx)
    }
}

#[async_trait]
impl Transport for TokioTlsTransport {
    /// Fails as soon as `disconnect` is called, even if the peer has stopped
    /// reading and the write is stalled.
    async fn send(&self, data: &[u8]) -> Result<(), anyhow::Error> {
        let mut guard = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => anyhow::bail!("Socket is closed"),
            guard = self.writer.lock() => guard,
        };
        let writer = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Socket is closed"))?;

        trace!("--> Writing {} bytes", data.len());
        let write = async {
            writer.write_all(data).await?;
            writer.flush().await
        };
        let written = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            written = write => Some(written),
        };
        match written {
            Some(result) => result.map_err(|e| anyhow::anyhow!("socket write error: {e}")),
            None => {
                // A half-written frame leaves the stream unusable.
                guard.take();
                anyhow::bail!("Socket closed during write")
            }
        }
    }

    async fn disconnect(&self) {
        self.shutdown.cancel();
        // Any in-flight send observes the cancel and releases the lock.
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, writer.shutdown()).await {
                Ok(Err(e)) => trace!("socket shutdown: {e}"),
                Err(_) => trace!("socket shutdown timed out"),
                Ok(Ok(())) => {}
            }
        }
    }
}

async fn read_pump<R>(
    mut reader: ReadHalf<R>,
    event_tx: mpsc::Sender<TransportEvent>,
    shutdown: CancellationToken,
) where
    R: AsyncRead + Send + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                trace!("Read pump cancelled");
                break;
            }
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    trace!("Socket reached EOF");
                    break;
                }
                Ok(n) => {
                    trace!("<-- Read {n} bytes");
                    let data = Bytes::copy_from_slice(&buf[..n]);
                    if event_tx.send(TransportEvent::DataReceived(data)).await.is_err() {
                        warn!("Event receiver dropped, closing read pump");
                        break;
                    }
                }
                Err(e) => {
                    debug!("Error reading from socket: {e}");
                    break;
                }
            }
        }
    }

    let _ = event_tx.send(TransportEvent::Disconnected).await;
}

/// Dials `host:port` and negotiates TLS, verifying the server certificate
/// against the system trust store.
pub struct TokioTlsTransportFactory {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl TokioTlsTransportFactory {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for TokioTlsTransportFactory {
    fn default() -> Self {
        Self::new(fcmcore::mcs::MCS_HOST, fcmcore::mcs::MCS_PORT)
    }
}

#[async_trait]
impl TransportFactory for TokioTlsTransportFactory {
    async fn create_transport(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
        info!("Dialing {}:{}", self.host, self.port);

        let connect = async {
            let tcp = TcpStream::connect((self.host.as_str(), self.port))
                .await
                .map_err(|e| anyhow::anyhow!("TCP connect failed: {e}"))?;
            tcp.set_nodelay(true)?;

            let connector = native_tls::TlsConnector::new()
                .map_err(|e| anyhow::anyhow!("TLS setup failed: {e}"))?;
            let connector = tokio_native_tls::TlsConnector::from(connector);
            connector
                .connect(&self.host, tcp)
                .await
                .map_err(|e| anyhow::anyhow!("TLS handshake failed: {e}"))
        };

        let stream = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "connect to {}:{} timed out after {:?}",
                    self.host,
                    self.port,
                    self.connect_timeout
                )
            })??;

        debug!("TLS established with {}", self.host);
        Ok(TokioTlsTransport::from_stream(stream).await)
    }
}
