//! One MCS connection: login handshake, heartbeats and stanza dispatch.

use crate::keepalive::heartbeat_loop;
use async_trait::async_trait;
use fcmcore::gcm::GcmCredentials;
use fcmcore::mcs::{CodecError, MCS_VERSION, McsDecoder, McsFrame, McsTag, build_login_request, encode_frame};
use fcmcore::net::{Transport, TransportEvent};
use fcmcore::proto::mcs::{
    AppData, DataMessageStanza, HeartbeatAck, HeartbeatPing, IqStanza, LoginResponse,
    StreamErrorStanza,
};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum McsError {
    #[error("transport: {0:#}")]
    Transport(anyhow::Error),
    #[error("protocol: {0}")]
    Codec(#[from] CodecError),
    #[error("unmarshal {what}: {source}")]
    Decode {
        what: &'static str,
        source: prost::DecodeError,
    },
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("server closed connection")]
    ServerClose,
    #[error("stream error: type={kind} text={text}")]
    StreamError { kind: String, text: String },
    #[error("encrypted FCM messages no longer supported; register again to receive plaintext pushes")]
    EncryptedPayload,
}

impl McsError {
    /// True when the byte stream can no longer be trusted, as opposed to the
    /// socket failing or the server ending the session deliberately.
    pub fn is_fatal_protocol(&self) -> bool {
        matches!(self, McsError::Codec(_) | McsError::Decode { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    LoggingIn,
    Authenticated,
    Closed,
    Errored,
}

/// Receives what a session observes. Calls are made from the session's own
/// read task, one at a time, in wire order.
#[async_trait]
pub trait SessionHandler: Send + Sync {
    async fn on_connected(&self);

    /// `raw_payload` is empty for plaintext pushes, which carry their data in
    /// `app_data`.
    async fn on_data_message(&self, persistent_id: &str, raw_payload: &[u8], app_data: &[AppData]);

    async fn on_disconnected(&self, reason: &str);
}

/// Serializes outbound frames and prepends the version byte to the first.
pub struct FrameWriter {
    transport: Arc<dyn Transport>,
    version_pending: Mutex<bool>,
}

impl FrameWriter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            version_pending: Mutex::new(true),
        }
    }

    pub async fn send<M: prost::Message>(&self, tag: McsTag, msg: &M) -> Result<(), McsError> {
        // Held across the write so frames never interleave.
        let mut pending = self.version_pending.lock().await;
        let frame = encode_frame(tag, msg, *pending)?;
        self.transport
            .send(&frame)
            .await
            .map_err(McsError::Transport)?;
        *pending = false;
        debug!(target: "Mcs", "--> {tag:?} ({} bytes)", frame.len());
        Ok(())
    }
}

fn check_version(version: Option<u8>) {
    match version {
        Some(MCS_VERSION) | None => {}
        Some(other) => {
            warn!(target: "Mcs", "Server announced version {other}, expected {MCS_VERSION}")
        }
    }
}

pub struct McsSession {
    transport: Arc<dyn Transport>,
    events: mpsc::Receiver<TransportEvent>,
    writer: Arc<FrameWriter>,
    credentials: GcmCredentials,
    persistent_ids: Vec<String>,
    heartbeat_interval: Duration,
    state: SessionState,
}

impl McsSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        events: mpsc::Receiver<TransportEvent>,
        credentials: GcmCredentials,
        persistent_ids: Vec<String>,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            writer: Arc::new(FrameWriter::new(transport.clone())),
            transport,
            events,
            credentials,
            persistent_ids,
            heartbeat_interval,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Writes a frame unless `cancel` fires first. A write stalled on a peer
    /// that stopped reading is abandoned; the read loop sees the cancel on
    /// its next turn.
    async fn send_or_cancel<M: prost::Message>(
        &self,
        tag: McsTag,
        msg: &M,
        cancel: &CancellationToken,
    ) -> Result<(), McsError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(()),
            sent = self.writer.send(tag, msg) => sent,
        }
    }

    /// Logs in and processes stanzas until the connection ends.
    ///
    /// Returns `Ok(())` when `cancel` fired; cancelling also closes the
    /// transport so a pending read returns. `on_disconnected` is called once
    /// on every path out of here.
    pub async fn connect(
        &mut self,
        handler: &dyn SessionHandler,
        cancel: &CancellationToken,
    ) -> Result<(), McsError> {
        let session_done = CancellationToken::new();
        let _session_guard = session_done.clone().drop_guard();

        let transport = self.transport.clone();
        let supervisor_cancel = cancel.clone();
        let supervisor_done = session_done.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = supervisor_cancel.cancelled() => transport.disconnect().await,
                _ = supervisor_done.cancelled() => {}
            }
        });

        let heartbeat = cancel.child_token();
        let result = self.run(handler, cancel, &heartbeat).await;
        heartbeat.cancel();

        if cancel.is_cancelled() {
            self.state = SessionState::Closed;
            info!(target: "Mcs", "Session cancelled");
            handler.on_disconnected("context cancelled").await;
            return Ok(());
        }

        match result {
            Ok(()) => {
                self.state = SessionState::Closed;
                handler.on_disconnected("read loop ended").await;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Errored;
                warn!(target: "Mcs", "Session ended: {e}");
                self.transport.disconnect().await;
                handler.on_disconnected(&e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn run(
        &mut self,
        handler: &dyn SessionHandler,
        cancel: &CancellationToken,
        heartbeat: &CancellationToken,
    ) -> Result<(), McsError> {
        self.state = SessionState::LoggingIn;
        let login = build_login_request(&self.credentials, &self.persistent_ids);
        info!(
            target: "Mcs",
            "Logging in as {} with {} processed ids",
            login.id,
            login.received_persistent_id.len()
        );
        self.send_or_cancel(McsTag::LoginRequest, &login, cancel).await?;

        let mut decoder = McsDecoder::new();
        let mut version_checked = false;
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                event = self.events.recv() => event,
            };

            match event {
                Some(TransportEvent::Connected) => {}
                Some(TransportEvent::DataReceived(data)) => {
                    decoder.feed(&data);
                    while let Some(frame) = decoder.decode_frame()? {
                        if !version_checked {
                            check_version(decoder.version());
                            version_checked = true;
                        }
                        self.handle_frame(frame, handler, cancel, heartbeat).await?;
                    }
                }
                Some(TransportEvent::Disconnected) | None => {
                    return if cancel.is_cancelled() {
                        Ok(())
                    } else {
                        Err(McsError::ConnectionClosed)
                    };
                }
            }
        }
    }

    async fn handle_frame(
        &mut self,
        frame: McsFrame,
        handler: &dyn SessionHandler,
        cancel: &CancellationToken,
        heartbeat: &CancellationToken,
    ) -> Result<(), McsError> {
        let tag = match frame.tag() {
            Ok(tag) => tag,
            Err(raw) => {
                debug!(target: "Mcs", "<-- Unknown tag {raw} ({} bytes), ignoring", frame.payload.len());
                return Ok(());
            }
        };

        match tag {
            McsTag::LoginResponse => {
                let resp: LoginResponse = frame.decode().map_err(|source| McsError::Decode {
                    what: "LoginResponse",
                    source,
                })?;
                debug!(target: "Mcs", "<-- LoginResponse id={}", resp.id);
                if let Some(err) = &resp.error {
                    warn!(
                        target: "Mcs",
                        "LoginResponse carried error {}: {}",
                        err.code,
                        err.message.as_deref().unwrap_or_default()
                    );
                }
                self.persistent_ids.clear();

                if self.state == SessionState::Authenticated {
                    debug!(target: "Mcs", "Repeated LoginResponse, already authenticated");
                    return Ok(());
                }
                self.state = SessionState::Authenticated;
                info!(target: "Mcs", "Authenticated with MCS");

                tokio::spawn(heartbeat_loop(
                    self.writer.clone(),
                    self.heartbeat_interval,
                    heartbeat.clone(),
                ));
                handler.on_connected().await;
            }
            McsTag::HeartbeatPing => {
                if let Err(e) = frame.decode::<HeartbeatPing>() {
                    warn!(target: "Mcs", "Failed to unmarshal HeartbeatPing: {e}");
                    return Ok(());
                }
                debug!(target: "Mcs", "<-- HeartbeatPing");
                self.send_or_cancel(McsTag::HeartbeatAck, &HeartbeatAck::default(), cancel)
                    .await?;
            }
            McsTag::HeartbeatAck => {
                debug!(target: "Mcs", "<-- HeartbeatAck");
            }
            McsTag::DataMessageStanza => {
                let msg: DataMessageStanza = match frame.decode() {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(target: "Mcs", "Failed to unmarshal DataMessageStanza: {e}");
                        return Ok(());
                    }
                };
                let persistent_id = msg.persistent_id.as_deref().unwrap_or_default();
                debug!(
                    target: "Mcs",
                    "<-- DataMessage from={} category={} persistentId={persistent_id}",
                    msg.from,
                    msg.category
                );

                if msg.raw_data.as_ref().is_some_and(|raw| !raw.is_empty()) {
                    error!(target: "Mcs", "Received encrypted raw_data, which is not supported");
                    return Err(McsError::EncryptedPayload);
                }
                handler
                    .on_data_message(persistent_id, &[], &msg.app_data)
                    .await;
            }
            McsTag::Close => return Err(McsError::ServerClose),
            McsTag::IqStanza => match frame.decode::<IqStanza>() {
                Ok(iq) => info!(
                    target: "Mcs",
                    "<-- IqStanza type={:?} id={} from={} to={}",
                    iq.r#type(),
                    iq.id,
                    iq.from.as_deref().unwrap_or_default(),
                    iq.to.as_deref().unwrap_or_default()
                ),
                Err(e) => warn!(target: "Mcs", "Failed to unmarshal IqStanza: {e}"),
            },
            McsTag::StreamErrorStanza => {
                let stanza: StreamErrorStanza =
                    frame.decode().map_err(|source| McsError::Decode {
                        what: "StreamErrorStanza",
                        source,
                    })?;
                return Err(McsError::StreamError {
                    kind: stanza.r#type,
                    text: stanza.text.unwrap_or_default(),
                });
            }
            McsTag::LoginRequest => {
                debug!(target: "Mcs", "<-- Unexpected LoginRequest from server, ignoring");
            }
        }
        Ok(())
    }
}
