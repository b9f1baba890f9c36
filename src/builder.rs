use crate::client::Client;
use crate::config::ClientConfig;
use crate::store::CredentialStore;
use crate::transport::TokioTlsTransportFactory;
use fcm_ureq_http_client::UreqHttpClient;
use fcmcore::net::{HttpClient, TransportFactory};
use fcmcore::types::events::CoreEventBus;
use log::info;
use std::sync::Arc;

/// Assembles a [`Client`]. Anything not supplied falls back to the ureq
/// HTTP client and a TLS transport dialing the configured MCS endpoint.
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    http_client: Option<Arc<dyn HttpClient>>,
    transport_factory: Option<Arc<dyn TransportFactory>>,
}

impl ClientBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_http_client<C>(self, client: C) -> Self
    where
        C: HttpClient + 'static,
    {
        self.with_shared_http_client(Arc::new(client))
    }

    pub fn with_shared_http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn with_transport_factory<F>(mut self, factory: F) -> Self
    where
        F: TransportFactory + 'static,
    {
        self.transport_factory = Some(Arc::new(factory));
        self
    }

    /// Loads any saved credentials from `config.credentials_path`. A missing
    /// or unreadable file yields an unregistered client.
    pub async fn build(self) -> Client {
        let config = self.config;

        let http_client = self
            .http_client
            .unwrap_or_else(|| Arc::new(UreqHttpClient::new()));
        let transport_factory = self.transport_factory.unwrap_or_else(|| {
            Arc::new(
                TokioTlsTransportFactory::new(config.mcs_host.clone(), config.mcs_port)
                    .with_connect_timeout(config.connect_timeout),
            )
        });

        info!(
            target: "Client",
            "Loading credentials from '{}'",
            config.credentials_path.display()
        );
        let store = CredentialStore::open(config.credentials_path.clone()).await;

        Client {
            config,
            http_client,
            transport_factory,
            store,
            event_bus: CoreEventBus::new(),
            register_lock: tokio::sync::Mutex::new(()),
        }
    }
}
