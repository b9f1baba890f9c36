use fcmcore::device::{AppIdentity, DeviceIdentity};
use fcmcore::gcm::GcmEndpoints;
use fcmcore::mcs::{MCS_HOST, MCS_PORT};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CREDENTIALS_FILE: &str = "fcm_credentials.json";
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// JSON file holding the device pair, token and processed message ids.
    pub credentials_path: PathBuf,
    pub app: AppIdentity,
    pub device: DeviceIdentity,
    pub endpoints: GcmEndpoints,
    pub mcs_host: String,
    pub mcs_port: u16,
    /// Interval between client-initiated HeartbeatPings.
    pub heartbeat_interval: Duration,
    /// Bound on TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
    pub locale: String,
    pub time_zone: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            app: AppIdentity::default(),
            device: DeviceIdentity::pixel_7(),
            endpoints: GcmEndpoints::default(),
            mcs_host: MCS_HOST.to_string(),
            mcs_port: MCS_PORT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            locale: "en_US".to_string(),
            time_zone: "America/New_York".to_string(),
        }
    }
}
