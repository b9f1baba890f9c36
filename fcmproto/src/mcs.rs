//! MCS (Mobile Connection Server) stanzas.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HeartbeatPing {
    #[prost(int32, optional, tag = "1")]
    pub stream_id: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "2")]
    pub last_stream_id_received: ::core::option::Option<i32>,
    #[prost(int64, optional, tag = "3")]
    pub status: ::core::option::Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HeartbeatAck {
    #[prost(int32, optional, tag = "1")]
    pub stream_id: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "2")]
    pub last_stream_id_received: ::core::option::Option<i32>,
    #[prost(int64, optional, tag = "3")]
    pub status: ::core::option::Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorInfo {
    #[prost(int32, required, tag = "1")]
    pub code: i32,
    #[prost(string, optional, tag = "2")]
    pub message: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "3")]
    pub r#type: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(message, optional, tag = "4")]
    pub extension: ::core::option::Option<Extension>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Setting {
    #[prost(string, required, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, required, tag = "2")]
    pub value: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HeartbeatStat {
    #[prost(string, required, tag = "1")]
    pub ip: ::prost::alloc::string::String,
    #[prost(bool, required, tag = "2")]
    pub timeout: bool,
    #[prost(int32, required, tag = "3")]
    pub interval_ms: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HeartbeatConfig {
    #[prost(bool, optional, tag = "1")]
    pub upload_stat: ::core::option::Option<bool>,
    #[prost(string, optional, tag = "2")]
    pub ip: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(int32, optional, tag = "3")]
    pub interval_ms: ::core::option::Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LoginRequest {
    #[prost(string, required, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, required, tag = "2")]
    pub domain: ::prost::alloc::string::String,
    #[prost(string, required, tag = "3")]
    pub user: ::prost::alloc::string::String,
    #[prost(string, required, tag = "4")]
    pub resource: ::prost::alloc::string::String,
    #[prost(string, required, tag = "5")]
    pub auth_token: ::prost::alloc::string::String,
    #[prost(string, optional, tag = "6")]
    pub device_id: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(int64, optional, tag = "7")]
    pub last_rmq_id: ::core::option::Option<i64>,
    #[prost(message, repeated, tag = "8")]
    pub setting: ::prost::alloc::vec::Vec<Setting>,
    #[prost(string, repeated, tag = "10")]
    pub received_persistent_id: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(bool, optional, tag = "12")]
    pub adaptive_heartbeat: ::core::option::Option<bool>,
    #[prost(message, optional, tag = "13")]
    pub heartbeat_stat: ::core::option::Option<HeartbeatStat>,
    #[prost(bool, optional, tag = "14")]
    pub use_rmq2: ::core::option::Option<bool>,
    #[prost(int64, optional, tag = "15")]
    pub account_id: ::core::option::Option<i64>,
    #[prost(enumeration = "login_request::AuthService", optional, tag = "16")]
    pub auth_service: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "17")]
    pub network_type: ::core::option::Option<i32>,
    #[prost(int64, optional, tag = "18")]
    pub status: ::core::option::Option<i64>,
}

pub mod login_request {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum AuthService {
        AndroidId = 2,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LoginResponse {
    #[prost(string, required, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, optional, tag = "2")]
    pub jid: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(message, optional, tag = "3")]
    pub error: ::core::option::Option<ErrorInfo>,
    #[prost(message, repeated, tag = "4")]
    pub setting: ::prost::alloc::vec::Vec<Setting>,
    #[prost(int32, optional, tag = "5")]
    pub stream_id: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "6")]
    pub last_stream_id_received: ::core::option::Option<i32>,
    #[prost(message, optional, tag = "7")]
    pub heartbeat_config: ::core::option::Option<HeartbeatConfig>,
    #[prost(int64, optional, tag = "8")]
    pub server_timestamp: ::core::option::Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamErrorStanza {
    #[prost(string, required, tag = "1")]
    pub r#type: ::prost::alloc::string::String,
    #[prost(string, optional, tag = "2")]
    pub text: ::core::option::Option<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Close {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Extension {
    #[prost(int32, required, tag = "1")]
    pub id: i32,
    #[prost(bytes = "vec", required, tag = "2")]
    pub data: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IqStanza {
    #[prost(int64, optional, tag = "1")]
    pub rmq_id: ::core::option::Option<i64>,
    #[prost(enumeration = "iq_stanza::IqType", required, tag = "2")]
    pub r#type: i32,
    #[prost(string, required, tag = "3")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, optional, tag = "4")]
    pub from: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "5")]
    pub to: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(message, optional, tag = "6")]
    pub error: ::core::option::Option<ErrorInfo>,
    #[prost(message, optional, tag = "7")]
    pub extension: ::core::option::Option<Extension>,
    #[prost(string, optional, tag = "8")]
    pub persistent_id: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(int32, optional, tag = "9")]
    pub stream_id: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "10")]
    pub last_stream_id_received: ::core::option::Option<i32>,
    #[prost(int64, optional, tag = "11")]
    pub account_id: ::core::option::Option<i64>,
    #[prost(int64, optional, tag = "12")]
    pub status: ::core::option::Option<i64>,
}

pub mod iq_stanza {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum IqType {
        Get = 0,
        Set = 1,
        Result = 2,
        IqError = 3,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppData {
    #[prost(string, required, tag = "1")]
    pub key: ::prost::alloc::string::String,
    #[prost(string, required, tag = "2")]
    pub value: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataMessageStanza {
    #[prost(string, optional, tag = "2")]
    pub id: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, required, tag = "3")]
    pub from: ::prost::alloc::string::String,
    #[prost(string, optional, tag = "4")]
    pub to: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, required, tag = "5")]
    pub category: ::prost::alloc::string::String,
    #[prost(string, optional, tag = "6")]
    pub token: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(message, repeated, tag = "7")]
    pub app_data: ::prost::alloc::vec::Vec<AppData>,
    #[prost(bool, optional, tag = "8")]
    pub from_trusted_server: ::core::option::Option<bool>,
    #[prost(string, optional, tag = "9")]
    pub persistent_id: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(int32, optional, tag = "10")]
    pub stream_id: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "11")]
    pub last_stream_id_received: ::core::option::Option<i32>,
    #[prost(string, optional, tag = "13")]
    pub reg_id: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(int64, optional, tag = "16")]
    pub device_user_id: ::core::option::Option<i64>,
    #[prost(int32, optional, tag = "17")]
    pub ttl: ::core::option::Option<i32>,
    #[prost(int64, optional, tag = "18")]
    pub sent: ::core::option::Option<i64>,
    #[prost(int32, optional, tag = "19")]
    pub queued: ::core::option::Option<i32>,
    #[prost(int64, optional, tag = "20")]
    pub status: ::core::option::Option<i64>,
    #[prost(bytes = "vec", optional, tag = "21")]
    pub raw_data: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    #[prost(bool, optional, tag = "24")]
    pub immediate_ack: ::core::option::Option<bool>,
}
