//! GCM checkin and registration over the `c2dm` HTTP endpoints.
//!
//! Both calls are single-shot: no retry is attempted on failure, including
//! rate-limit responses from the checkin server.

use crate::device::{AppIdentity, DeviceIdentity};
use crate::net::{HttpClient, HttpRequest};
use crate::proto::checkin::{
    AndroidBuildProto, AndroidCheckinProto, AndroidCheckinRequest, AndroidCheckinResponse,
    DeviceType,
};
use log::debug;
use prost::Message;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CHECKIN_URL: &str = "https://android.clients.google.com/checkin";
pub const DEFAULT_REGISTER_URL: &str = "https://android.clients.google.com/c2dm/register3";

const CHECKIN_CLIENT_ID: &str = "android-google";
const CHECKIN_VERSION: i32 = 3;

/// The device pair issued by checkin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcmCredentials {
    pub android_id: u64,
    pub security_token: u64,
}

impl GcmCredentials {
    pub fn new(android_id: u64, security_token: u64) -> Self {
        Self {
            android_id,
            security_token,
        }
    }

    /// A zero pair has never been checked in.
    pub fn is_zero(&self) -> bool {
        self.android_id == 0 && self.security_token == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcmEndpoints {
    pub checkin_url: String,
    pub register_url: String,
}

impl Default for GcmEndpoints {
    fn default() -> Self {
        Self {
            checkin_url: DEFAULT_CHECKIN_URL.to_string(),
            register_url: DEFAULT_REGISTER_URL.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GcmError {
    #[error("{step}: http request failed: {error:#}")]
    Http {
        step: &'static str,
        error: anyhow::Error,
    },
    #[error("{step}: HTTP {status}: {body}")]
    Status {
        step: &'static str,
        status: u16,
        body: String,
    },
    #[error("checkin: invalid response: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("checkin: response carried no device credentials")]
    EmptyCredentials,
    #[error("register: unexpected response: {0}")]
    Rejected(String),
    #[error("register: empty token")]
    EmptyToken,
}

/// Builds the checkin request for `device`. A non-zero `previous` pair asks
/// the server to renew that identity rather than mint a new one.
pub fn build_checkin_request(
    previous: GcmCredentials,
    device: &DeviceIdentity,
    locale: &str,
    time_zone: &str,
) -> AndroidCheckinRequest {
    let build = AndroidBuildProto {
        fingerprint: Some(device.build_fingerprint.clone()),
        hardware: Some(device.hardware.clone()),
        brand: Some(device.brand.clone()),
        radio: Some(device.radio.clone()),
        bootloader: Some(device.bootloader.clone()),
        client_id: Some(CHECKIN_CLIENT_ID.to_string()),
        time: Some(device.build_time),
        package_version_code: Some(device.gms_version as i32),
        device: Some(device.device.clone()),
        sdk_version: Some(device.sdk_version as i32),
        model: Some(device.model.clone()),
        manufacturer: Some(device.manufacturer.clone()),
        product: Some(device.product.clone()),
        ota_installed: Some(false),
    };

    let mut request = AndroidCheckinRequest {
        checkin: AndroidCheckinProto {
            build: Some(build),
            r#type: Some(DeviceType::DeviceAndroidOs as i32),
            ..Default::default()
        },
        version: Some(CHECKIN_VERSION),
        fragment: Some(0),
        locale: Some(locale.to_string()),
        time_zone: Some(time_zone.to_string()),
        user_serial_number: Some(0),
        ..Default::default()
    };

    if previous.android_id != 0 {
        request.id = Some(previous.android_id as i64);
        request.security_token = Some(previous.security_token);
    }
    request
}

/// Posts a checkin request and returns the pair the server assigned.
pub async fn checkin(
    http: &dyn HttpClient,
    url: &str,
    request: &AndroidCheckinRequest,
) -> Result<GcmCredentials, GcmError> {
    let renewing = request.id.is_some();
    debug!(target: "Gcm", "Checking in (renewal: {renewing})");

    let http_request = HttpRequest::post(url)
        .with_header("Content-Type", "application/x-protobuf")
        .with_body(request.encode_to_vec());
    let response = http
        .execute(http_request)
        .await
        .map_err(|error| GcmError::Http {
            step: "checkin",
            error,
        })?;

    if response.status_code != 200 {
        return Err(GcmError::Status {
            step: "checkin",
            status: response.status_code,
            body: response.body_string(),
        });
    }

    let decoded = AndroidCheckinResponse::decode(response.body.as_slice())?;
    let credentials = GcmCredentials::new(
        decoded.android_id.unwrap_or_default(),
        decoded.security_token.unwrap_or_default(),
    );
    if credentials.android_id == 0 {
        return Err(GcmError::EmptyCredentials);
    }
    debug!(target: "Gcm", "Checkin complete, androidId={}", credentials.android_id);
    Ok(credentials)
}

/// A fresh instance id: 11 lowercase hex characters.
pub fn generate_instance_id() -> String {
    let mut bytes = [0u8; 6];
    rand::rng().fill_bytes(&mut bytes);
    let mut id = hex::encode(bytes);
    id.truncate(11);
    id
}

/// Form fields for `register3`, in the order GmsCore sends them.
pub fn build_register_form(
    credentials: GcmCredentials,
    app: &AppIdentity,
    device: &DeviceIdentity,
    instance_id: &str,
) -> Vec<(&'static str, String)> {
    vec![
        ("app", app.package.clone()),
        ("sender", app.sender_id.clone()),
        ("device", credentials.android_id.to_string()),
        ("cert", app.cert_sha1.clone()),
        ("app_ver", app.app_version.clone()),
        ("gcm_ver", device.gms_version.to_string()),
        ("X-scope", "GCM".to_string()),
        ("X-appid", instance_id.to_string()),
        ("X-osv", device.sdk_version.to_string()),
        ("X-gmsv", device.gms_version.to_string()),
        ("X-cliv", format!("iid-{}", device.chrome_version)),
    ]
}

fn encode_form(fields: &[(&str, String)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Extracts the token from a `register3` body. Anything other than
/// `token=...`, `Error=...` included, is a rejection carrying the raw body.
pub fn parse_register_response(body: &str) -> Result<String, GcmError> {
    match body.strip_prefix("token=") {
        Some(token) => {
            let token = token.trim();
            if token.is_empty() {
                Err(GcmError::EmptyToken)
            } else {
                Ok(token.to_string())
            }
        }
        None => Err(GcmError::Rejected(body.to_string())),
    }
}

/// Registers `app` for pushes on the checked-in device and returns the
/// delivery token.
pub async fn register(
    http: &dyn HttpClient,
    url: &str,
    credentials: GcmCredentials,
    app: &AppIdentity,
    device: &DeviceIdentity,
) -> Result<String, GcmError> {
    let instance_id = generate_instance_id();
    debug!(target: "Gcm", "Registering {} for sender {}", app.package, app.sender_id);

    let form = build_register_form(credentials, app, device, &instance_id);
    let request = HttpRequest::post(url)
        .with_header("Content-Type", "application/x-www-form-urlencoded")
        .with_header(
            "Authorization",
            format!(
                "AidLogin {}:{}",
                credentials.android_id, credentials.security_token
            ),
        )
        .with_header("User-Agent", device.gcm_user_agent())
        .with_header("app", app.package.clone())
        .with_body(encode_form(&form).into_bytes());

    let response = http
        .execute(request)
        .await
        .map_err(|error| GcmError::Http {
            step: "register",
            error,
        })?;

    if response.status_code != 200 {
        return Err(GcmError::Status {
            step: "register",
            status: response.status_code,
            body: response.body_string(),
        });
    }
    parse_register_response(&response.body_string())
}
