// Runtime-agnostic pieces live in fcmcore; re-exported here so most users
// only need this crate.
pub use fcmcore::{classify, device, gcm, mcs, proto};

pub mod types {
    pub use fcmcore::types::events;
}

pub mod builder;
pub mod client;
pub mod config;
pub mod http;
pub mod keepalive;
pub mod session;
pub mod store;
pub mod transport;

pub use builder::ClientBuilder;
pub use client::{Client, ClientError};
pub use config::ClientConfig;
pub use fcmcore::classify::{
    ClassifyError, DeviceAccountUpdate, InboundEvent, NonconversationalMessage, PushMessage,
};
pub use fcmcore::device::{AppIdentity, DeviceIdentity};
pub use fcmcore::gcm::{GcmCredentials, GcmEndpoints};
pub use fcmcore::types::events::Event;
pub use tokio_util::sync::CancellationToken;
