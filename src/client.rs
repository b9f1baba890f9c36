use crate::builder::ClientBuilder;
use crate::config::ClientConfig;
use crate::http::{LoggingHttpClient, truncate};
use crate::session::{McsError, McsSession, SessionHandler};
use crate::store::CredentialStore;
use async_trait::async_trait;
use fcmcore::classify::{
    ClassifyError, DeviceAccountUpdate, NonconversationalMessage, PushMessage,
    classify_data_message,
};
use fcmcore::gcm::{self, GcmCredentials, GcmError};
use fcmcore::net::{HttpClient, TransportFactory};
use fcmcore::proto::mcs::AppData;
use fcmcore::store::Credentials;
use fcmcore::types::events::{CoreEventBus, Disconnected, Event, EventHandler};
use log::{debug, error, info, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no FCM credentials: call register() first")]
    NotRegistered,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("FCM registration failed (checkin): {0}")]
    Checkin(#[source] GcmError),
    #[error("FCM registration failed (register): {0}")]
    Register(#[source] GcmError),
    #[error("MCS connect: {0:#}")]
    Connect(anyhow::Error),
    #[error("MCS session: {0}")]
    Session(#[from] McsError),
}

struct FnHandler<F>(F);

impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Event) + Send + Sync,
{
    fn handle_event(&self, event: &Event) {
        (self.0)(event)
    }
}

/// Receives FCM pushes for one app on one emulated Android device.
///
/// Call [`Client::register`] once, then [`Client::listen`]. Callbacks run on
/// the listening task, in the order stanzas arrive, and must be added before
/// listening starts.
pub struct Client {
    pub(crate) config: ClientConfig,
    pub(crate) http_client: Arc<dyn HttpClient>,
    pub(crate) transport_factory: Arc<dyn TransportFactory>,
    pub(crate) store: CredentialStore,
    pub(crate) event_bus: CoreEventBus,
    pub(crate) register_lock: tokio::sync::Mutex<()>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The delivery token, if registered.
    pub fn token(&self) -> Option<String> {
        self.store.token()
    }

    /// A detached copy of the stored credentials.
    pub fn credentials(&self) -> Option<Credentials> {
        self.store.snapshot()
    }

    /// Ids of processed pushes, oldest first.
    pub fn persistent_ids(&self) -> Vec<String> {
        self.store.persistent_ids()
    }

    pub fn add_event_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.event_bus.add_handler(handler);
    }

    fn add_fn(&mut self, f: impl Fn(&Event) + Send + Sync + 'static) {
        self.event_bus.add_handler(Arc::new(FnHandler(f)));
    }

    pub fn on_message(&mut self, f: impl Fn(&PushMessage) + Send + Sync + 'static) {
        self.add_fn(move |event| {
            if let Event::NewMessage(msg) = event {
                f(msg)
            }
        });
    }

    pub fn on_nonconversational_message(
        &mut self,
        f: impl Fn(&NonconversationalMessage) + Send + Sync + 'static,
    ) {
        self.add_fn(move |event| {
            if let Event::NonconversationalMessage(msg) = event {
                f(msg)
            }
        });
    }

    pub fn on_device_account_update(
        &mut self,
        f: impl Fn(&DeviceAccountUpdate) + Send + Sync + 'static,
    ) {
        self.add_fn(move |event| {
            if let Event::DeviceAccountUpdate(update) = event {
                f(update)
            }
        });
    }

    pub fn on_connected(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.add_fn(move |event| {
            if let Event::Connected = event {
                f()
            }
        });
    }

    /// Called once per `listen`, with the reason the session ended.
    pub fn on_disconnected(&mut self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.add_fn(move |event| {
            if let Event::Disconnected(d) = event {
                f(&d.reason)
            }
        });
    }

    /// Called for a push that could not be classified. The session continues.
    pub fn on_error(&mut self, f: impl Fn(&ClassifyError) + Send + Sync + 'static) {
        self.add_fn(move |event| {
            if let Event::Error(err) = event {
                f(err)
            }
        });
    }

    fn gcm_http(&self) -> LoggingHttpClient {
        LoggingHttpClient::new(self.http_client.clone())
    }

    /// Returns the delivery token, registering the device and app first if
    /// no usable credentials exist. With stored credentials this makes no
    /// network calls.
    pub async fn register(&self) -> Result<String, ClientError> {
        let _guard = self.register_lock.lock().await;

        if let Some(creds) = self.store.snapshot().filter(Credentials::is_registered) {
            debug!(target: "Client", "FCM credentials already exist, reusing token");
            return Ok(creds.token);
        }

        self.config
            .app
            .validate()
            .map_err(ClientError::InvalidConfig)?;
        info!(
            target: "Client",
            "Starting FCM registration for {} (sender {})",
            self.config.app.package,
            self.config.app.sender_id
        );

        let http = self.gcm_http();
        let request = gcm::build_checkin_request(
            GcmCredentials::default(),
            &self.config.device,
            &self.config.locale,
            &self.config.time_zone,
        );
        let gcm_creds = gcm::checkin(&http, &self.config.endpoints.checkin_url, &request)
            .await
            .map_err(ClientError::Checkin)?;

        let token = gcm::register(
            &http,
            &self.config.endpoints.register_url,
            gcm_creds,
            &self.config.app,
            &self.config.device,
        )
        .await
        .map_err(ClientError::Register)?;

        if let Err(e) = self
            .store
            .replace(Credentials::new(gcm_creds, token.clone()))
            .await
        {
            error!(target: "Client", "Failed to save FCM credentials: {e}");
        }

        info!(target: "Client", "FCM registration complete, token {}...", truncate(&token, 20));
        Ok(token)
    }

    /// Checks in again with the stored device pair and stores whatever pair
    /// the server answers with, even if it changed.
    pub async fn renew_checkin(&self) -> Result<GcmCredentials, ClientError> {
        let _guard = self.register_lock.lock().await;
        let current = self.store.snapshot().ok_or(ClientError::NotRegistered)?;

        let request = gcm::build_checkin_request(
            current.gcm,
            &self.config.device,
            &self.config.locale,
            &self.config.time_zone,
        );
        let renewed = gcm::checkin(&self.gcm_http(), &self.config.endpoints.checkin_url, &request)
            .await
            .map_err(ClientError::Checkin)?;

        if renewed != current.gcm {
            info!(target: "Client", "Checkin rotated device credentials (androidId {})", renewed.android_id);
        }
        if let Err(e) = self.store.update_gcm(renewed).await {
            error!(target: "Client", "Failed to save renewed credentials: {e}");
        }
        Ok(renewed)
    }

    /// Connects to MCS and delivers pushes until `cancel` fires or the
    /// connection fails. Makes a single attempt; reconnecting is up to the
    /// caller. Cancellation is reported as `Ok(())`.
    pub async fn listen(&self, cancel: &CancellationToken) -> Result<(), ClientError> {
        let creds = self
            .store
            .snapshot()
            .filter(Credentials::is_registered)
            .ok_or(ClientError::NotRegistered)?;

        let (transport, events) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            created = self.transport_factory.create_transport() => created.map_err(ClientError::Connect)?,
        };

        let mut session = McsSession::new(
            transport,
            events,
            creds.gcm,
            creds.persistent_ids.to_vec(),
            self.config.heartbeat_interval,
        );
        session.connect(self, cancel).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionHandler for Client {
    async fn on_connected(&self) {
        info!(target: "Client", "MCS connected");
        self.event_bus.dispatch(&Event::Connected);
    }

    async fn on_data_message(&self, persistent_id: &str, raw_payload: &[u8], app_data: &[AppData]) {
        debug!(target: "Client", "Push received, persistentId={persistent_id}");
        if !self.event_bus.has_handlers() {
            debug!(target: "Client", "No event handlers registered, skipping classification");
        } else {
            match classify_data_message(raw_payload, app_data) {
                Ok(event) => self.event_bus.dispatch(&event.into()),
                Err(e) => {
                    warn!(target: "Client", "Failed to parse FCM data message {persistent_id}: {e}");
                    self.event_bus.dispatch(&Event::Error(Arc::new(e)));
                }
            }
        }

        if let Err(e) = self.store.record_persistent_id(persistent_id).await {
            error!(target: "Client", "Failed to save persistent IDs: {e}");
        }
    }

    async fn on_disconnected(&self, reason: &str) {
        info!(target: "Client", "MCS disconnected: {reason}");
        self.event_bus.dispatch(&Event::Disconnected(Disconnected {
            reason: reason.to_string(),
        }));
    }
}
