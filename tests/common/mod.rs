#![allow(dead_code)]

use async_trait::async_trait;
use fcm_rust::config::ClientConfig;
use fcm_rust::mcs::{McsDecoder, McsTag, encode_frame};
use fcm_rust::proto::checkin::AndroidCheckinResponse;
use fcm_rust::proto::mcs::{AppData, DataMessageStanza, LoginRequest, LoginResponse};
use fcm_rust::transport::{TokioTlsTransport, Transport, TransportEvent, TransportFactory};
use fcm_rust::{AppIdentity, Client};
use fcmcore::net::{HttpClient, HttpRequest, HttpResponse};
use prost::Message;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

/// Stands in for both GCM endpoints.
#[derive(Default)]
pub struct FakeGoogle {
    pub calls: AtomicUsize,
}

#[async_trait]
impl HttpClient for FakeGoogle {
    async fn execute(&self, request: HttpRequest) -> anyhow::Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = if request.url.ends_with("/checkin") {
            AndroidCheckinResponse {
                stats_ok: true,
                android_id: Some(4242),
                security_token: Some(9999),
                ..Default::default()
            }
            .encode_to_vec()
        } else {
            b"token=integration-token".to_vec()
        };
        Ok(HttpResponse {
            status_code: 200,
            body,
        })
    }
}

/// Hands out the client halves of in-memory streams, one per connection.
pub struct DuplexFactory {
    streams: Mutex<VecDeque<DuplexStream>>,
}

#[async_trait]
impl TransportFactory for DuplexFactory {
    async fn create_transport(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
        let stream = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no more connections"))?;
        Ok(TokioTlsTransport::from_stream(stream).await)
    }
}

/// Creates `connections` stream pairs; returns the factory and the server
/// halves in the same order.
pub fn duplex_factory(connections: usize) -> (DuplexFactory, Vec<FakeMcsServer>) {
    duplex_factory_with_capacity(connections, 256 * 1024)
}

/// Like [`duplex_factory`], with `capacity` bytes of buffering per direction.
pub fn duplex_factory_with_capacity(
    connections: usize,
    capacity: usize,
) -> (DuplexFactory, Vec<FakeMcsServer>) {
    let mut clients = VecDeque::new();
    let mut servers = Vec::new();
    for _ in 0..connections {
        let (client, server) = tokio::io::duplex(capacity);
        clients.push_back(client);
        servers.push(FakeMcsServer {
            io: server,
            decoder: McsDecoder::new(),
            version_sent: false,
        });
    }
    (
        DuplexFactory {
            streams: Mutex::new(clients),
        },
        servers,
    )
}

/// The mtalk side of one connection.
pub struct FakeMcsServer {
    io: DuplexStream,
    decoder: McsDecoder,
    version_sent: bool,
}

impl FakeMcsServer {
    /// Reads client frames until one with `tag` arrives, skipping others.
    pub async fn expect_frame<M: Message + Default>(&mut self, tag: McsTag) -> M {
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            while let Some(frame) = self.decoder.decode_frame().unwrap() {
                if frame.tag() == Ok(tag) {
                    return frame.decode().unwrap();
                }
            }
            let n = self.io.read(&mut buf).await.unwrap();
            assert!(n > 0, "client hung up while waiting for {tag:?}");
            self.decoder.feed(&buf[..n]);
        }
    }

    /// Reads the client's LoginRequest and answers with a LoginResponse.
    pub async fn accept_login(&mut self) -> LoginRequest {
        let login: LoginRequest = self.expect_frame(McsTag::LoginRequest).await;
        assert_eq!(self.decoder.version(), Some(41));

        self.send(
            McsTag::LoginResponse,
            &LoginResponse {
                id: login.id.clone(),
                ..Default::default()
            },
        )
        .await;
        login
    }

    pub async fn send<M: Message>(&mut self, tag: McsTag, msg: &M) {
        let frame = encode_frame(tag, msg, !self.version_sent).unwrap();
        self.version_sent = true;
        self.io.write_all(&frame).await.unwrap();
    }

    pub async fn push_data(&mut self, stanza: DataMessageStanza) {
        self.send(McsTag::DataMessageStanza, &stanza).await;
    }

    /// Parks the stream until the test is done so the client never sees EOF.
    pub fn hold(self) -> DuplexStream {
        self.io
    }
}

pub fn data_message(persistent_id: &str, key: &str, value: &str) -> DataMessageStanza {
    DataMessageStanza {
        from: "1234567890".to_string(),
        category: "com.example.app".to_string(),
        persistent_id: Some(persistent_id.to_string()),
        app_data: vec![AppData {
            key: key.to_string(),
            value: value.to_string(),
        }],
        ..Default::default()
    }
}

pub fn new_message(persistent_id: &str, body: &str) -> DataMessageStanza {
    let payload = serde_json::json!({
        "messageId": format!("msg-{persistent_id}"),
        "messageBody": body,
    });
    data_message(persistent_id, "newMessage", &payload.to_string())
}

pub fn test_config(dir: &TempDir) -> ClientConfig {
    ClientConfig {
        credentials_path: dir.path().join("fcm_credentials.json"),
        app: AppIdentity::new("com.example.app", "1234567890", "0123456789abcdef0123456789abcdef01234567"),
        ..Default::default()
    }
}

/// A registered client whose MCS connections are served in-memory.
pub async fn registered_client(
    dir: &TempDir,
    connections: usize,
) -> (Client, Vec<FakeMcsServer>, Arc<FakeGoogle>) {
    let (factory, servers) = duplex_factory(connections);
    let (client, http) = registered_with(test_config(dir), factory).await;
    (client, servers, http)
}

/// Registers a client built from `config` over the given connections.
pub async fn registered_with(
    config: ClientConfig,
    factory: DuplexFactory,
) -> (Client, Arc<FakeGoogle>) {
    let http = Arc::new(FakeGoogle::default());
    let client = Client::builder()
        .with_config(config)
        .with_shared_http_client(http.clone())
        .with_transport_factory(factory)
        .build()
        .await;
    client.register().await.unwrap();
    (client, http)
}
