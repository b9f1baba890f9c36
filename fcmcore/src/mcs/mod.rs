//! MCS (Mobile Connection Server) protocol: stanza tags, wire framing and the
//! login request an Android device presents.

pub mod codec;

pub use codec::{CodecError, McsDecoder, McsFrame, encode_frame};

use crate::gcm::GcmCredentials;
use crate::proto::mcs::{LoginRequest, Setting, login_request::AuthService};

/// Protocol version byte sent once, ahead of the first client frame.
pub const MCS_VERSION: u8 = 41;

pub const MCS_DOMAIN: &str = "mcs.android.com";
pub const MCS_HOST: &str = "mtalk.google.com";
pub const MCS_PORT: u16 = 5228;

/// Size varints longer than this are treated as stream corruption.
pub const MAX_VARINT_LEN: usize = 10;
/// Upper bound on a single stanza. FCM payloads are capped at 4 KiB, so
/// anything near this is a desynchronised stream rather than a real message.
pub const MAX_FRAME_SIZE: usize = 4 << 20;

/// Identifies the protobuf message carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum McsTag {
    HeartbeatPing = 0,
    HeartbeatAck = 1,
    LoginRequest = 2,
    LoginResponse = 3,
    Close = 4,
    IqStanza = 7,
    DataMessageStanza = 8,
    StreamErrorStanza = 10,
}

impl TryFrom<u8> for McsTag {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => McsTag::HeartbeatPing,
            1 => McsTag::HeartbeatAck,
            2 => McsTag::LoginRequest,
            3 => McsTag::LoginResponse,
            4 => McsTag::Close,
            7 => McsTag::IqStanza,
            8 => McsTag::DataMessageStanza,
            10 => McsTag::StreamErrorStanza,
            other => return Err(other),
        })
    }
}

/// MCS login id for an Android-native device: `android-{hex(androidId)}`.
pub fn android_login_id(android_id: u64) -> String {
    format!("android-{android_id:x}")
}

/// Builds the LoginRequest GmsCore sends after checkin.
///
/// `received_persistent_ids` lists messages already processed, so the server
/// does not redeliver them on this connection.
pub fn build_login_request(
    credentials: &GcmCredentials,
    received_persistent_ids: &[String],
) -> LoginRequest {
    let dec_id = credentials.android_id.to_string();
    let login_id = android_login_id(credentials.android_id);

    LoginRequest {
        id: login_id.clone(),
        domain: MCS_DOMAIN.to_string(),
        user: dec_id.clone(),
        resource: dec_id,
        auth_token: credentials.security_token.to_string(),
        device_id: Some(login_id),
        last_rmq_id: Some(1),
        setting: vec![Setting {
            name: "new_vc".to_string(),
            value: "1".to_string(),
        }],
        received_persistent_id: received_persistent_ids.to_vec(),
        adaptive_heartbeat: Some(false),
        use_rmq2: Some(true),
        account_id: Some(1_000_000),
        auth_service: Some(AuthService::AndroidId as i32),
        network_type: Some(1),
        ..Default::default()
    }
}
