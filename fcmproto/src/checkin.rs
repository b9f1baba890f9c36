//! Android checkin request/response.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum DeviceType {
    DeviceAndroidOs = 1,
    DeviceIosOs = 2,
    DeviceChromeBrowser = 3,
    DeviceChromeOs = 4,
}

/// `Build.*` properties of the device performing the checkin.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AndroidBuildProto {
    #[prost(string, optional, tag = "1")]
    pub fingerprint: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "2")]
    pub hardware: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "3")]
    pub brand: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "4")]
    pub radio: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "5")]
    pub bootloader: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "6")]
    pub client_id: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(int64, optional, tag = "7")]
    pub time: ::core::option::Option<i64>,
    #[prost(int32, optional, tag = "8")]
    pub package_version_code: ::core::option::Option<i32>,
    #[prost(string, optional, tag = "9")]
    pub device: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(int32, optional, tag = "10")]
    pub sdk_version: ::core::option::Option<i32>,
    #[prost(string, optional, tag = "11")]
    pub model: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "12")]
    pub manufacturer: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "13")]
    pub product: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(bool, optional, tag = "14")]
    pub ota_installed: ::core::option::Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChromeBuildProto {
    #[prost(int32, optional, tag = "1")]
    pub platform: ::core::option::Option<i32>,
    #[prost(string, optional, tag = "2")]
    pub chrome_version: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(int32, optional, tag = "3")]
    pub channel: ::core::option::Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AndroidCheckinProto {
    #[prost(message, optional, tag = "1")]
    pub build: ::core::option::Option<AndroidBuildProto>,
    #[prost(int64, optional, tag = "2")]
    pub last_checkin_msec: ::core::option::Option<i64>,
    #[prost(string, optional, tag = "6")]
    pub cell_operator: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "7")]
    pub sim_operator: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "8")]
    pub roaming: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(int32, optional, tag = "9")]
    pub user_number: ::core::option::Option<i32>,
    #[prost(enumeration = "DeviceType", optional, tag = "12")]
    pub r#type: ::core::option::Option<i32>,
    #[prost(message, optional, tag = "13")]
    pub chrome_build: ::core::option::Option<ChromeBuildProto>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AndroidCheckinRequest {
    #[prost(string, optional, tag = "1")]
    pub imei: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(int64, optional, tag = "2")]
    pub id: ::core::option::Option<i64>,
    #[prost(string, optional, tag = "3")]
    pub digest: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(message, required, tag = "4")]
    pub checkin: AndroidCheckinProto,
    #[prost(string, optional, tag = "5")]
    pub desired_build: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "6")]
    pub locale: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(int64, optional, tag = "7")]
    pub logging_id: ::core::option::Option<i64>,
    #[prost(string, optional, tag = "8")]
    pub market_checkin: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "9")]
    pub mac_addr: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "10")]
    pub meid: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "11")]
    pub account_cookie: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "12")]
    pub time_zone: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(fixed64, optional, tag = "13")]
    pub security_token: ::core::option::Option<u64>,
    #[prost(int32, optional, tag = "14")]
    pub version: ::core::option::Option<i32>,
    #[prost(string, repeated, tag = "15")]
    pub ota_cert: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "16")]
    pub serial_number: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "17")]
    pub esn: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "19")]
    pub mac_addr_type: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(int32, optional, tag = "20")]
    pub fragment: ::core::option::Option<i32>,
    #[prost(string, optional, tag = "21")]
    pub user_name: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(int32, optional, tag = "22")]
    pub user_serial_number: ::core::option::Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GservicesSetting {
    #[prost(bytes = "vec", required, tag = "1")]
    pub name: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", required, tag = "2")]
    pub value: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AndroidCheckinResponse {
    #[prost(bool, required, tag = "1")]
    pub stats_ok: bool,
    #[prost(int64, optional, tag = "3")]
    pub time_msec: ::core::option::Option<i64>,
    #[prost(string, optional, tag = "4")]
    pub digest: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(message, repeated, tag = "5")]
    pub setting: ::prost::alloc::vec::Vec<GservicesSetting>,
    #[prost(bool, optional, tag = "6")]
    pub market_ok: ::core::option::Option<bool>,
    #[prost(fixed64, optional, tag = "7")]
    pub android_id: ::core::option::Option<u64>,
    #[prost(fixed64, optional, tag = "8")]
    pub security_token: ::core::option::Option<u64>,
    #[prost(bool, optional, tag = "9")]
    pub settings_diff: ::core::option::Option<bool>,
    #[prost(string, repeated, tag = "10")]
    pub delete_setting: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "11")]
    pub version_info: ::core::option::Option<::prost::alloc::string::String>,
}
